//! Upload ingestion: turn queued files into catalog changes.
//!
//! A pass lists `pending` uploads oldest first, claims each one, parses the
//! stored file and applies every row to the catalog according to the
//! upload's dedupe mode. See [`runner::IngestWorker`].

pub mod csv_source;
pub mod grid;
pub mod poller;
pub mod row;
pub mod runner;
pub mod xls;
pub mod xlsx;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub use poller::UploadPoller;
pub use row::{RawRow, RowFields, SourceRow};
pub use runner::{IngestWorker, PassSummary, UploadOutcome};

use crate::error::IngestError;

/// Parser selected from the original filename of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// `.xlsx` and `.xls` (any case) are spreadsheets; anything else is CSV.
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") | Some("xls") => SourceFormat::Spreadsheet,
            _ => SourceFormat::Csv,
        }
    }
}

/// Parses a stored upload file into source rows.
///
/// Returns an error only for container-level problems; a single bad record
/// comes back as [`SourceRow::Malformed`].
pub fn parse_file(path: &Path, original_filename: &str) -> Result<Vec<SourceRow>, IngestError> {
    if !path.exists() {
        return Err(IngestError::MissingFile(path.to_path_buf()));
    }
    match SourceFormat::from_filename(original_filename) {
        SourceFormat::Csv => csv_source::read_path(path),
        SourceFormat::Spreadsheet => Ok(read_spreadsheet(path)?
            .into_iter()
            .map(SourceRow::Record)
            .collect()),
    }
}

/// Reads the first sheet of a workbook. A compound-file signature selects
/// the binary `.xls` reader; anything else is treated as `.xlsx`.
pub fn read_spreadsheet(path: &Path) -> Result<Vec<RawRow>, IngestError> {
    let read_error = |e: std::io::Error| IngestError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::open(path).map_err(read_error)?;

    let mut signature = Vec::with_capacity(xls::OLE_SIGNATURE.len());
    (&mut file)
        .take(xls::OLE_SIGNATURE.len() as u64)
        .read_to_end(&mut signature)
        .map_err(read_error)?;
    file.seek(SeekFrom::Start(0)).map_err(read_error)?;

    if signature == xls::OLE_SIGNATURE {
        xls::read(file)
    } else {
        xlsx::read(file)
    }
}
