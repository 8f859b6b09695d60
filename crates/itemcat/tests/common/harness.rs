//! Isolated environment for driving uploads end to end.

#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use itemcat::config::Config;
use itemcat::db::item_repo::{self, Item};
use itemcat::db::upload_repo::{self, UploadRecord, UploadRow};
use itemcat::db::{category_repo, seed, Database};
use itemcat::service::Services;
use itemcat::{DedupeMode, IngestWorker, PassSummary};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub services: Services,
    pub worker: IngestWorker,
    pub upload_dir: PathBuf,
    pub incoming_dir: PathBuf,
    /// Id of the registered uploader.
    pub user_id: String,
}

impl TestHarness {
    /// File-backed database with the default categories seeded, no items,
    /// and one registered user.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let config = Config {
            database_path: base.join("data").join("itemcat.db").to_string_lossy().into_owned(),
            upload_directory: base.join("uploads").to_string_lossy().into_owned(),
            ..Config::default()
        };
        let incoming_dir = base.join("incoming");
        std::fs::create_dir_all(&incoming_dir).expect("Failed to create incoming dir");

        let db = Database::open(std::path::Path::new(&config.database_path))
            .expect("Failed to open database");
        seed::ensure_default_categories(&db).expect("Failed to seed categories");

        let services = Services::new(db.clone(), &config);
        let user = services
            .accounts
            .register("uploader@example.com", "password", Some("Uploader"))
            .expect("Failed to register user");

        Self {
            worker: IngestWorker::new(db.clone()),
            upload_dir: PathBuf::from(&config.upload_directory),
            incoming_dir,
            user_id: user.id,
            db,
            services,
            temp_dir,
        }
    }

    /// Writes a browser-side file and queues it as the harness user.
    pub fn queue(&self, filename: &str, content: &[u8], mode: DedupeMode) -> UploadRecord {
        let source = self.incoming_dir.join(filename);
        std::fs::write(&source, content).expect("Failed to write source file");
        self.services
            .uploads
            .queue_upload(&self.user_id, filename, &source, Some(mode.as_str()))
            .expect("Failed to queue upload")
    }

    pub fn run_pass(&self) -> PassSummary {
        self.worker
            .run_pass()
            .expect("Ingestion pass failed")
            .expect("Ingestion pass already running")
    }

    pub fn record(&self, id: &str) -> UploadRecord {
        upload_repo::find_by_id(&self.db, id)
            .expect("Failed to load upload")
            .expect("Upload not found")
    }

    pub fn rows(&self, id: &str) -> Vec<UploadRow> {
        upload_repo::list_rows(&self.db, id).expect("Failed to list rows")
    }

    pub fn item(&self, sku: &str) -> Option<Item> {
        item_repo::find_by_sku(&self.db, sku).expect("Failed to find item")
    }

    pub fn item_count(&self) -> u64 {
        item_repo::count(&self.db).expect("Failed to count items")
    }

    pub fn category_count(&self) -> usize {
        category_repo::list_all(&self.db)
            .expect("Failed to list categories")
            .len()
    }
}
