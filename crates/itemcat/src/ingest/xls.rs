//! Legacy binary workbooks (`.xls`): BIFF records inside an OLE compound
//! file, read with calamine.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use calamine::{Data, Reader, Xls};

use crate::error::IngestError;
use crate::ingest::grid::{self, Grid};
use crate::ingest::row::RawRow;

/// First bytes of every OLE compound file.
pub const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Reads the first worksheet, with the same header and blank-row rules as
/// the `.xlsx` reader.
pub fn read<R: Read + Seek>(input: R) -> Result<Vec<RawRow>, IngestError> {
    let mut workbook: Xls<R> = Xls::new(input)
        .map_err(|e| IngestError::Spreadsheet(format!("Failed to open workbook: {}", e)))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range
            .map_err(|e| IngestError::Spreadsheet(format!("Failed to read first sheet: {}", e)))?,
        None => return Ok(Vec::new()),
    };
    let Some((_, first_column)) = range.start() else {
        return Ok(Vec::new());
    };

    let cells: Grid = range
        .rows()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !matches!(cell, Data::Empty))
                .map(|(i, cell)| (first_column as usize + i, cell_text(cell)))
                .collect::<BTreeMap<_, _>>()
        })
        .collect();
    Ok(grid::rows_from_grid(cells))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ITEMS_XLS: &[u8] = include_bytes!("../../tests/fixtures/items.xls");

    #[test]
    fn test_reads_first_sheet() {
        let rows = read(Cursor::new(ITEMS_XLS)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("sku"), Some("X1"));
        assert_eq!(rows[0].get("name"), Some("Desk Lamp"));
        assert_eq!(rows[0].get("primary_detail"), Some("brass"));
        assert_eq!(rows[0].get("category"), Some("Home & Kitchen"));
        assert_eq!(rows[0].get("qty"), Some("3"));
        assert!(rows.iter().all(|r| r.get("sku") != Some("wrong")));
    }

    #[test]
    fn test_missing_cells_read_as_empty() {
        let rows = read(Cursor::new(ITEMS_XLS)).unwrap();
        assert_eq!(rows[1].get("sku"), Some("X2"));
        assert_eq!(rows[1].get("primary_detail"), Some(""));
        assert_eq!(rows[1].get("qty"), Some("12"));
        assert_eq!(rows[1].len(), 5);
    }

    #[test]
    fn test_signature_matches_fixture() {
        assert!(ITEMS_XLS.starts_with(&OLE_SIGNATURE));
    }

    #[test]
    fn test_not_a_compound_file_is_container_error() {
        let err = read(Cursor::new(b"sku,name\nA,B\n".to_vec())).unwrap_err();
        assert!(matches!(err, IngestError::Spreadsheet(_)));
    }
}
