use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::db::category_repo::{self, Category};
use crate::db::item_repo::{self, Item, ItemFields};
use crate::db::upload_repo::{self, UploadRecord, UploadRow};
use crate::db::{Database, DatabaseError};
use crate::sanitize;
use crate::upload::{lifecycle, DedupeMode, LifecycleError, RowStatus, UploadStatus};

use super::row::{RowFields, SourceRow};

const MSG_SKIPPED: &str = "SKU exists, skipped";
const MSG_UPDATED: &str = "Updated existing item";
const MSG_CREATED: &str = "Item created";

/// Counts for one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Uploads that reached `done`.
    pub processed: usize,
    /// Uploads that ended `failed`, or whose processing hit a storage error.
    pub failed: usize,
    /// Uploads another pass claimed first.
    pub skipped: usize,
}

/// How processing one upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Done { rows: usize, items_created: i64 },
    Failed { reason: String },
    NotClaimed,
}

/// Resets the single-flight flag even if a pass unwinds.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Applies queued uploads to the catalog.
pub struct IngestWorker {
    db: Database,
    running: AtomicBool,
}

impl IngestWorker {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a pass is currently in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one pass over all pending uploads, oldest first.
    ///
    /// Returns `Ok(None)` without doing anything when another pass is still
    /// running. A failure on one upload is logged and counted; the pass moves
    /// on to the next one. Only failing to list pending uploads is an error.
    pub fn run_pass(&self) -> Result<Option<PassSummary>, DatabaseError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Ingestion pass already running, skipping");
            return Ok(None);
        }
        let _guard = PassGuard(&self.running);

        let pending = upload_repo::list_by_status(&self.db, UploadStatus::Pending)?;
        let _span = info_span!("ingest_pass", pending = pending.len()).entered();

        let mut summary = PassSummary::default();
        for record in &pending {
            match self.process_upload(record) {
                Ok(UploadOutcome::Done { .. }) => summary.processed += 1,
                Ok(UploadOutcome::Failed { .. }) => summary.failed += 1,
                Ok(UploadOutcome::NotClaimed) => summary.skipped += 1,
                Err(e) => {
                    error!("Upload {} could not be processed: {}", record.id, e);
                    summary.failed += 1;
                }
            }
        }

        if !pending.is_empty() {
            info!(
                "Ingestion pass: {} done, {} failed, {} skipped",
                summary.processed, summary.failed, summary.skipped
            );
        }
        Ok(Some(summary))
    }

    /// Claims and processes a single upload record.
    pub fn process_upload(&self, record: &UploadRecord) -> Result<UploadOutcome, LifecycleError> {
        let _span = info_span!("upload",
            upload_id = %record.id,
            filename = %sanitize::redact_path(Path::new(&record.filename)),
            dedupe_mode = %record.dedupe_mode,
        )
        .entered();

        if !lifecycle::claim(&self.db, &record.id)? {
            debug!("Upload {} already claimed", record.id);
            return Ok(UploadOutcome::NotClaimed);
        }

        let path = match record.file_path.as_deref().map(PathBuf::from) {
            Some(path) if path.exists() => path,
            _ => {
                let reason = "Upload file is missing".to_string();
                warn!("Upload {}: {}", record.id, reason);
                lifecycle::fail(&self.db, &record.id)?;
                if let Err(e) = upload_repo::clear_file_path(&self.db, &record.id) {
                    warn!("Failed to clear file path of upload {}: {}", record.id, e);
                }
                return Ok(UploadOutcome::Failed { reason });
            }
        };

        let outcome = self.ingest_file(record, &path);
        self.discard_file(record, &path);

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Whatever stopped the run, the record must not stay claimed.
                if let Err(fail_err) = lifecycle::fail(&self.db, &record.id) {
                    warn!("Upload {} could not be marked failed: {}", record.id, fail_err);
                }
                Err(e)
            }
        }
    }

    fn ingest_file(&self, record: &UploadRecord, path: &Path) -> Result<UploadOutcome, LifecycleError> {
        let rows = {
            let _step = info_span!("parse").entered();
            match super::parse_file(path, &record.filename) {
                Ok(rows) => rows,
                Err(e) => {
                    let reason = e.to_string();
                    warn!("Upload {} failed: {}", record.id, reason);
                    lifecycle::fail(&self.db, &record.id)?;
                    return Ok(UploadOutcome::Failed { reason });
                }
            }
        };

        let items_created = {
            let _step = info_span!("apply_rows", rows = rows.len()).entered();
            self.apply_rows(record, &rows)?
        };

        lifecycle::complete(&self.db, &record.id, items_created)?;
        info!(
            "Upload {} processed: {} rows, {} items created or updated",
            record.id,
            rows.len(),
            items_created
        );
        Ok(UploadOutcome::Done {
            rows: rows.len(),
            items_created,
        })
    }

    /// Applies every row and records its outcome. Returns the number of rows
    /// that created or updated an item.
    fn apply_rows(&self, record: &UploadRecord, rows: &[SourceRow]) -> Result<i64, DatabaseError> {
        let mut items_created = 0;

        for (index, source) in rows.iter().enumerate() {
            let row_number = index as i64 + 1;
            let (raw_data, result) = match source {
                SourceRow::Record(raw) => (
                    raw.to_json(),
                    self.apply_row(record, &RowFields::from_raw(raw))
                        .map_err(|e| e.to_string()),
                ),
                SourceRow::Malformed { raw, reason } => (raw.clone(), Err(reason.clone())),
            };

            let (status, message) = match result {
                Ok((status, message)) => (status, message.to_string()),
                Err(message) => {
                    debug!("Upload {} row {}: {}", record.id, row_number, message);
                    (RowStatus::Error, message)
                }
            };
            if status.counts_toward_items_created() {
                items_created += 1;
            }

            upload_repo::insert_row(
                &self.db,
                &UploadRow {
                    id: Uuid::new_v4().to_string(),
                    upload_id: record.id.clone(),
                    row_number,
                    raw_data,
                    status,
                    message,
                },
            )?;
        }

        Ok(items_created)
    }

    fn apply_row(
        &self,
        record: &UploadRecord,
        fields: &RowFields,
    ) -> Result<(RowStatus, &'static str), DatabaseError> {
        let existing = if fields.sku.is_empty() {
            None
        } else {
            item_repo::find_by_sku(&self.db, &fields.sku)?
        };

        if let Some(existing) = existing {
            match record.dedupe_mode {
                DedupeMode::Skip => return Ok((RowStatus::Skipped, MSG_SKIPPED)),
                DedupeMode::Update => {
                    self.merge_into(&existing, fields, &record.user_id)?;
                    return Ok((RowStatus::Updated, MSG_UPDATED));
                }
                DedupeMode::Duplicate => {}
            }
        }

        let category_id = self.resolve_or_create_category(&fields.category)?;
        item_repo::insert(
            &self.db,
            &Uuid::new_v4().to_string(),
            &ItemFields {
                sku: fields.sku.clone(),
                name: fields.name.clone(),
                primary_detail: non_empty(&fields.primary_detail),
                category_id,
            },
            Some(&record.user_id),
        )?;
        Ok((RowStatus::Created, MSG_CREATED))
    }

    /// Overwrites the existing item with the row's non-empty values. The
    /// category is only changed when the row names an existing one.
    fn merge_into(&self, existing: &Item, fields: &RowFields, user_id: &str) -> Result<(), DatabaseError> {
        let category_id = if fields.category.is_empty() {
            None
        } else {
            category_repo::find_by_name_ci(&self.db, &fields.category)?.map(|c| c.id)
        };

        let merged = ItemFields {
            sku: existing.sku.clone(),
            name: if fields.name.is_empty() {
                existing.name.clone()
            } else {
                fields.name.clone()
            },
            primary_detail: non_empty(&fields.primary_detail).or_else(|| existing.primary_detail.clone()),
            category_id: category_id.or_else(|| existing.category_id.clone()),
        };
        item_repo::update(&self.db, &existing.id, &merged, Some(user_id))?;
        Ok(())
    }

    fn resolve_or_create_category(&self, name: &str) -> Result<Option<String>, DatabaseError> {
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(category) = category_repo::find_by_name_ci(&self.db, name)? {
            return Ok(Some(category.id));
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        category_repo::insert(&self.db, &category)?;
        info!("Created category '{}' from upload", category.name);
        Ok(Some(category.id))
    }

    fn discard_file(&self, record: &UploadRecord, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(
                "Failed to delete upload file {}: {}",
                sanitize::redact_path(path),
                e
            );
        }
        if let Err(e) = upload_repo::clear_file_path(&self.db, &record.id) {
            warn!("Failed to clear file path of upload {}: {}", record.id, e);
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
