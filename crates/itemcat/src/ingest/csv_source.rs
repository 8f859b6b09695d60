//! CSV uploads: first line is the header row, blank lines are skipped.

use std::io::Read;
use std::path::Path;

use crate::error::IngestError;
use crate::ingest::row::{RawRow, SourceRow};

const BOM: char = '\u{feff}';

/// Reads every data record of a CSV file.
///
/// Missing trailing cells become empty strings and extra cells beyond the
/// header are ignored. A record that is not valid UTF-8 becomes
/// [`SourceRow::Malformed`] instead of failing the whole file.
pub fn read_path(path: &Path) -> Result<Vec<SourceRow>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    read(file)
}

pub fn read<R: Read>(input: R) -> Result<Vec<SourceRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| IngestError::Csv(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let header = String::from_utf8_lossy(h).into_owned();
            if i == 0 {
                header.trim_start_matches(BOM).to_string()
            } else {
                header
            }
        })
        .collect();

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result.map_err(|e| IngestError::Csv(e.to_string()))?;
        rows.push(decode_record(&headers, &record));
    }
    Ok(rows)
}

fn decode_record(headers: &[String], record: &csv::ByteRecord) -> SourceRow {
    let mut row = RawRow::new();
    for (i, header) in headers.iter().enumerate() {
        let bytes = record.get(i).unwrap_or_default();
        match std::str::from_utf8(bytes) {
            Ok(value) => row.insert(header.as_str(), value),
            Err(e) => {
                return SourceRow::Malformed {
                    raw: lossy_row(headers, record).to_json(),
                    reason: format!("Column '{}' is not valid UTF-8: {}", header, e),
                };
            }
        }
    }
    SourceRow::Record(row)
}

/// The record keyed by header, with undecodable bytes replaced.
fn lossy_row(headers: &[String], record: &csv::ByteRecord) -> RawRow {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let bytes = record.get(i).unwrap_or_default();
            (header.as_str(), String::from_utf8_lossy(bytes).into_owned())
        })
        .collect()
}
