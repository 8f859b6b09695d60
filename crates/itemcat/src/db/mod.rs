//! Catalog store.
//!
//! One SQLite connection behind a mutex, shared by the service API and the
//! ingestion poller. Repositories are free functions over [`Database`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod category_repo;
pub mod error;
pub mod item_repo;
pub mod migrations;
pub mod reset_repo;
pub mod seed;
pub mod upload_repo;
pub mod user_repo;

pub use error::DatabaseError;

/// Cloneable handle to the catalog store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the store at `path`, creating parent directories,
    /// and migrates it. File stores run in WAL mode.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::prepare(conn)?;
        log::info!("Catalog store opened at {}", path.display());
        Ok(db)
    }

    /// Migrated in-memory store, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(mut conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run_all(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Current time as a fixed-width RFC 3339 UTC string, the storage format for
/// all timestamps. Fixed width keeps lexical and chronological order equal.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
