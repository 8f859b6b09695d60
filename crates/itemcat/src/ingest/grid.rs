//! Cell grids shared by the workbook readers.
//!
//! A reader collects its first sheet as one map of column index to cell
//! text per sheet row; [`rows_from_grid`] turns that into header-keyed rows.

use std::collections::{BTreeMap, HashSet};

use crate::error::IngestError;
use crate::ingest::row::RawRow;

/// Header used for an empty header cell; later ones get `_1`, `_2`, ...
const EMPTY_HEADER: &str = "__EMPTY";

/// Zero-based index of column `XFD`, the last column a worksheet can have.
pub const MAX_COLUMN: usize = 16_383;

pub type Grid = Vec<BTreeMap<usize, String>>;

/// Zero-based column index of a cell reference such as `B7` or `AA12`.
///
/// `Ok(None)` when the reference has no column letters.
pub fn column_index(cell_ref: &str) -> Result<Option<usize>, IngestError> {
    let letters = cell_ref.bytes().take_while(|b| b.is_ascii_alphabetic());
    let mut index = 0usize;
    let mut any = false;
    for b in letters {
        any = true;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize))
            .filter(|i| *i <= MAX_COLUMN + 1)
            .ok_or_else(|| out_of_range(cell_ref))?;
    }
    Ok(any.then(|| index - 1))
}

/// Rejects a column position past `XFD`.
pub fn check_column(column: usize, cell_ref: &str) -> Result<usize, IngestError> {
    if column > MAX_COLUMN {
        return Err(out_of_range(cell_ref));
    }
    Ok(column)
}

fn out_of_range(cell_ref: &str) -> IngestError {
    IngestError::Spreadsheet(format!("Cell reference '{}' is out of range", cell_ref))
}

fn is_blank(row: &BTreeMap<usize, String>) -> bool {
    row.values().all(|v| v.is_empty())
}

/// Header names for the header row, up to its last non-empty cell. Empty
/// cells become `__EMPTY` and repeats get the first free `_n` suffix.
fn header_names(cells: &BTreeMap<usize, String>) -> Vec<String> {
    let width = cells
        .iter()
        .rev()
        .find(|(_, v)| !v.is_empty())
        .map(|(last, _)| last + 1)
        .unwrap_or(0);
    let mut used: HashSet<String> = HashSet::new();
    let mut counters: BTreeMap<String, usize> = BTreeMap::new();
    let mut headers = Vec::with_capacity(width);

    for i in 0..width {
        let base = match cells.get(&i).map(String::as_str) {
            Some(text) if !text.is_empty() => text,
            _ => EMPTY_HEADER,
        };
        let mut name = base.to_string();
        if used.contains(&name) {
            let counter = counters.entry(base.to_string()).or_insert(1);
            loop {
                name = format!("{}_{}", base, counter);
                *counter += 1;
                if !used.contains(&name) {
                    break;
                }
            }
        }
        used.insert(name.clone());
        headers.push(name);
    }
    headers
}

/// The first non-blank row is the header row; every later row with a value
/// under some header becomes a record. Missing cells read as "".
pub fn rows_from_grid(grid: Grid) -> Vec<RawRow> {
    let mut rows = grid.into_iter().filter(|r| !is_blank(r));
    let Some(header_cells) = rows.next() else {
        return Vec::new();
    };
    let headers = header_names(&header_cells);

    rows.map(|mut cells| {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), cells.remove(&i).unwrap_or_default()))
            .collect();
        RawRow::from_columns(columns)
    })
    .filter(RawRow::has_value)
    .collect()
}
