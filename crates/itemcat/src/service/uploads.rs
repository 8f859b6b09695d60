//! Queueing uploads for the ingestion pipeline and reporting on them.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::ServiceError;
use crate::db::upload_repo::{self, NewUpload, UploadRecord, UploadRow, UploadSummary};
use crate::db::user_repo;
use crate::db::Database;
use crate::sanitize;
use crate::upload::{DedupeMode, RowStatus};

/// Which uploads to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFilter {
    All,
    UserId(String),
    /// Resolved to a user id; an unknown address matches nothing.
    Email(String),
}

impl UploadFilter {
    /// Interprets a free-form filter value: anything containing `@` is an
    /// e-mail address, anything else a user id, blank means all.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => UploadFilter::All,
            Some(value) if value.contains('@') => UploadFilter::Email(value.to_string()),
            Some(value) => UploadFilter::UserId(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub upload: UploadRecord,
    pub rows: Vec<UploadRow>,
}

#[derive(Clone)]
pub struct Uploads {
    db: Database,
    upload_dir: PathBuf,
}

impl Uploads {
    pub fn new(db: Database, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            upload_dir: upload_dir.into(),
        }
    }

    /// Copies `source` into the upload directory and queues it as `pending`.
    ///
    /// `dedupe_mode` is the raw form value; absent or blank means skip.
    pub fn queue_upload(
        &self,
        user_id: &str,
        original_filename: &str,
        source: &Path,
        dedupe_mode: Option<&str>,
    ) -> Result<UploadRecord, ServiceError> {
        if original_filename.trim().is_empty() {
            return Err(ServiceError::InvalidInput("No file uploaded".to_string()));
        }
        let dedupe_mode = match dedupe_mode.map(str::trim).filter(|m| !m.is_empty()) {
            None => DedupeMode::default(),
            Some(mode) => mode
                .parse::<DedupeMode>()
                .map_err(|e| ServiceError::InvalidInput(e.to_string()))?,
        };
        if user_repo::find_by_id(&self.db, user_id)?.is_none() {
            return Err(ServiceError::NotFound("User"));
        }

        std::fs::create_dir_all(&self.upload_dir).map_err(|e| ServiceError::StoreFile {
            path: self.upload_dir.clone(),
            source: e,
        })?;
        let id = Uuid::new_v4().to_string();
        let stored = self.upload_dir.join(&id);
        let file_size = std::fs::copy(source, &stored).map_err(|e| ServiceError::StoreFile {
            path: stored.clone(),
            source: e,
        })?;

        let new_upload = NewUpload {
            id,
            user_id: user_id.to_string(),
            filename: original_filename.to_string(),
            file_size: i64::try_from(file_size).unwrap_or(i64::MAX),
            file_path: stored.to_string_lossy().into_owned(),
            dedupe_mode,
        };
        match upload_repo::insert(&self.db, &new_upload) {
            Ok(record) => {
                info!(
                    "Upload {} queued ({}, {} bytes, {})",
                    record.id,
                    sanitize::redact_path(Path::new(original_filename)),
                    record.file_size,
                    record.dedupe_mode
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&stored) {
                    warn!(
                        "Failed to remove {} after queue error: {}",
                        sanitize::redact_path(&stored),
                        rm
                    );
                }
                Err(e.into())
            }
        }
    }

    pub fn list_uploads(&self, filter: &UploadFilter) -> Result<Vec<UploadSummary>, ServiceError> {
        let uploads = match filter {
            UploadFilter::All => upload_repo::list(&self.db, None)?,
            UploadFilter::UserId(user_id) => upload_repo::list(&self.db, Some(user_id))?,
            UploadFilter::Email(email) => match user_repo::find_by_email(&self.db, email)? {
                Some(user) => upload_repo::list(&self.db, Some(&user.id))?,
                None => Vec::new(),
            },
        };
        Ok(uploads)
    }

    pub fn upload_report(&self, id: &str) -> Result<UploadReport, ServiceError> {
        let upload = upload_repo::find_by_id(&self.db, id)?.ok_or(ServiceError::NotFound("Upload"))?;
        let rows = upload_repo::list_rows(&self.db, id)?;
        Ok(UploadReport { upload, rows })
    }

    /// CSV export of the rows that failed: `row_number,message,raw_data`.
    pub fn failed_rows_csv(&self, id: &str) -> Result<String, ServiceError> {
        let report = self.upload_report(id)?;
        Ok(failed_rows_to_csv(&report.rows))
    }

    /// Suggested download name for [`Uploads::failed_rows_csv`].
    pub fn failed_rows_filename(id: &str) -> String {
        format!("upload_{}_failed.csv", id)
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn failed_rows_to_csv(rows: &[UploadRow]) -> String {
    let mut out = String::from("row_number,message,raw_data\n");
    for row in rows.iter().filter(|r| r.status == RowStatus::Error) {
        let _ = writeln!(
            out,
            "{},{},{}",
            row.row_number,
            quote(&row.message),
            quote(&row.raw_data)
        );
    }
    out
}
