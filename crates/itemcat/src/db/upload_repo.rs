//! Upload repository: `upload_records` and their append-only `upload_rows`.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{now_rfc3339, Database, DatabaseError};
use crate::upload::{DedupeMode, RowStatus, UploadStatus};

/// A stored upload record.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub id: String,
    pub user_id: String,
    /// Original filename as uploaded; decides the parser.
    pub filename: String,
    pub file_size: i64,
    /// Temporary location of the uploaded bytes. Cleared once processed.
    pub file_path: Option<String>,
    pub items_created: i64,
    pub status: UploadStatus,
    pub dedupe_mode: DedupeMode,
    pub created_at: String,
}

impl UploadRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            filename: row.get("filename")?,
            file_size: row.get("file_size")?,
            file_path: row.get("file_path")?,
            items_created: row.get("items_created")?,
            status: row.get("status")?,
            dedupe_mode: row.get("dedupe_mode")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Upload record joined with the owner's display name, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    #[serde(flatten)]
    pub record: UploadRecord,
    pub user_name: String,
}

/// Fields needed to queue a new upload.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub file_size: i64,
    pub file_path: String,
    pub dedupe_mode: DedupeMode,
}

/// Outcome of processing one source row.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRow {
    pub id: String,
    pub upload_id: String,
    /// 1-based position of the row within the parsed source.
    pub row_number: i64,
    /// JSON object of the original row.
    pub raw_data: String,
    pub status: RowStatus,
    pub message: String,
}

impl UploadRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            upload_id: row.get("upload_id")?,
            row_number: row.get("row_number")?,
            raw_data: row.get::<_, Option<String>>("raw_data")?.unwrap_or_default(),
            status: row.get("status")?,
            message: row.get::<_, Option<String>>("message")?.unwrap_or_default(),
        })
    }
}

/// Inserts a new upload record in `pending` state and returns it.
pub fn insert(db: &Database, upload: &NewUpload) -> Result<UploadRecord, DatabaseError> {
    let record = UploadRecord {
        id: upload.id.clone(),
        user_id: upload.user_id.clone(),
        filename: upload.filename.clone(),
        file_size: upload.file_size,
        file_path: Some(upload.file_path.clone()),
        items_created: 0,
        status: UploadStatus::Pending,
        dedupe_mode: upload.dedupe_mode,
        created_at: now_rfc3339(),
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO upload_records (id, user_id, filename, file_size, file_path,
             items_created, status, dedupe_mode, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.user_id,
                record.filename,
                record.file_size,
                record.file_path,
                record.items_created,
                record.status,
                record.dedupe_mode,
                record.created_at,
            ],
        )?;
        Ok(())
    })?;

    Ok(record)
}

/// Finds an upload record by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<UploadRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM upload_records WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], UploadRecord::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists upload records newest first, optionally restricted to one user.
pub fn list(db: &Database, user_id: Option<&str>) -> Result<Vec<UploadSummary>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT upload_records.*, COALESCE(users.name, users.email) AS user_name
             FROM upload_records JOIN users ON upload_records.user_id = users.id
             {}
             ORDER BY upload_records.created_at DESC, upload_records.rowid DESC",
            if user_id.is_some() {
                "WHERE upload_records.user_id = ?1"
            } else {
                ""
            }
        );
        let map = |row: &Row<'_>| -> Result<UploadSummary, rusqlite::Error> {
            Ok(UploadSummary {
                record: UploadRecord::from_row(row)?,
                user_name: row.get("user_name")?,
            })
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = match user_id {
            Some(user_id) => stmt
                .query_map(params![user_id], map)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    })
}

/// Lists upload records in the given status in insertion order.
pub fn list_by_status(
    db: &Database,
    status: UploadStatus,
) -> Result<Vec<UploadRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM upload_records WHERE status = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![status], UploadRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a record from `from` to `to` only if it is still in `from`.
///
/// Returns `false` when the record was not in the expected state (already
/// claimed by another pass, or missing). This conditional update is the
/// claim primitive for the ingestion pipeline.
pub fn transition(
    db: &Database,
    id: &str,
    from: UploadStatus,
    to: UploadStatus,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE upload_records SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id, from, to],
        )?;
        Ok(changed == 1)
    })
}

/// Moves a `processing` record to `done` together with its final count.
pub fn mark_done(db: &Database, id: &str, items_created: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE upload_records SET status = ?2, items_created = ?3
             WHERE id = ?1 AND status = ?4",
            params![id, UploadStatus::Done, items_created, UploadStatus::Processing],
        )?;
        Ok(changed == 1)
    })
}

/// Forgets the temporary file location after processing.
pub fn clear_file_path(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE upload_records SET file_path = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    })
}

/// Appends one row outcome.
pub fn insert_row(db: &Database, row: &UploadRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO upload_rows (id, upload_id, row_number, raw_data, status, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.id,
                row.upload_id,
                row.row_number,
                row.raw_data,
                row.status,
                row.message,
            ],
        )?;
        Ok(())
    })
}

/// Lists the row outcomes of an upload ordered by row number.
pub fn list_rows(db: &Database, upload_id: &str) -> Result<Vec<UploadRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM upload_rows WHERE upload_id = ?1 ORDER BY row_number")?;
        let rows = stmt
            .query_map(params![upload_id], UploadRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
