//! Office Open XML workbooks (`.xlsx`): the first worksheet.
//!
//! The workbook is a zip container. `xl/workbook.xml` names the sheets in
//! tab order, `xl/_rels/workbook.xml.rels` maps each sheet to its part, and
//! `xl/sharedStrings.xml` holds the text referenced by string cells. Only
//! cell values are read; formulas contribute their cached result.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::IngestError;
use crate::ingest::grid::{self, Grid};
use crate::ingest::row::RawRow;

const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET: &str = "xl/worksheets/sheet1.xml";

/// Reads the first worksheet. See [`grid::rows_from_grid`] for how cells
/// become rows.
pub fn read<R: Read + Seek>(input: R) -> Result<Vec<RawRow>, IngestError> {
    let mut archive = zip::ZipArchive::new(input)
        .map_err(|e| IngestError::Spreadsheet(format!("Failed to open workbook: {}", e)))?;

    let sheet_part = first_sheet_part(&mut archive)?;
    let shared = match read_entry(&mut archive, SHARED_STRINGS)? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_xml = read_entry(&mut archive, &sheet_part)?.ok_or_else(|| {
        IngestError::Spreadsheet(format!("Workbook has no worksheet at {}", sheet_part))
    })?;

    let cells = parse_sheet(&sheet_xml, &shared)?;
    Ok(grid::rows_from_grid(cells))
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, IngestError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(IngestError::Spreadsheet(format!(
                "Failed to open {}: {}",
                name, e
            )))
        }
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| IngestError::Spreadsheet(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

/// Resolves the zip path of the first sheet in tab order, falling back to
/// the conventional `sheet1.xml` when the workbook parts are missing.
fn first_sheet_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, IngestError> {
    let Some(workbook) = read_entry(archive, WORKBOOK)? else {
        return Ok(FALLBACK_SHEET.to_string());
    };
    let Some(rel_id) = first_sheet_rel_id(&workbook)? else {
        return Ok(FALLBACK_SHEET.to_string());
    };
    let Some(rels) = read_entry(archive, WORKBOOK_RELS)? else {
        return Ok(FALLBACK_SHEET.to_string());
    };

    Ok(relationship_target(&rels, &rel_id)?
        .map(|target| resolve_target(&target))
        .unwrap_or_else(|| FALLBACK_SHEET.to_string()))
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn xml_error(part: &str, e: impl std::fmt::Display) -> IngestError {
    IngestError::Spreadsheet(format!("XML parsing error in {}: {}", part, e))
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn first_sheet_rel_id(xml: &str) -> Result<Option<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                return Ok(attribute(e, b"id"));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(WORKBOOK, e)),
            _ => {}
        }
    }
}

fn relationship_target(xml: &str, rel_id: &str) -> Result<Option<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attribute(e, b"Id").as_deref() == Some(rel_id) {
                    return Ok(attribute(e, b"Target"));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(xml_error(WORKBOOK_RELS, e)),
            _ => {}
        }
    }
}

/// Text of a predefined or numeric character reference.
fn resolve_reference(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        _ => None,
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs repeat the reading of the text and are not part of it.
    let mut in_phonetic = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let decoded = e.decode().map_err(|e| xml_error(SHARED_STRINGS, e))?;
                current.push_str(&decoded);
            }
            Ok(Event::GeneralRef(r)) if in_text => {
                if let Some(c) = r.resolve_char_ref().ok().flatten() {
                    current.push(c);
                } else if let Some(c) = resolve_reference(&r) {
                    current.push(c);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(SHARED_STRINGS, e)),
            _ => {}
        }
    }
    Ok(strings)
}

/// Column of a `c` element: its `r` reference, else the one after the
/// previous cell.
fn cell_column(e: &BytesStart<'_>, next_column: usize) -> Result<usize, IngestError> {
    let reference = attribute(e, b"r").unwrap_or_default();
    match grid::column_index(&reference)? {
        Some(column) => Ok(column),
        None => grid::check_column(next_column, &reference),
    }
}

#[derive(Default)]
struct CellState {
    column: usize,
    kind: Option<String>,
    value: String,
}

impl CellState {
    fn resolve(self, shared: &[String]) -> String {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i).cloned())
                .unwrap_or_default(),
            Some("b") => {
                if self.value.trim() == "1" {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
            _ => self.value,
        }
    }
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Grid, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut rows = Vec::new();
    let mut row: BTreeMap<usize, String> = BTreeMap::new();
    let mut next_column = 0usize;
    let mut cell: Option<CellState> = None;
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = BTreeMap::new();
                    next_column = 0;
                }
                b"c" => {
                    let column = cell_column(e, next_column)?;
                    next_column = column + 1;
                    cell = Some(CellState {
                        column,
                        kind: attribute(e, b"t"),
                        value: String::new(),
                    });
                }
                // `v` holds the value, `t` the text of an inline string.
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"c" => next_column = cell_column(e, next_column)? + 1,
                b"row" => rows.push(BTreeMap::new()),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(state) = cell.take() {
                        let column = state.column;
                        row.insert(column, state.resolve(shared));
                    }
                }
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Ok(Event::Text(e)) if in_value => {
                let decoded = e.decode().map_err(|e| xml_error("worksheet", e))?;
                if let Some(state) = cell.as_mut() {
                    state.value.push_str(&decoded);
                }
            }
            Ok(Event::GeneralRef(r)) if in_value => {
                let c = r
                    .resolve_char_ref()
                    .ok()
                    .flatten()
                    .or_else(|| resolve_reference(&r));
                if let (Some(c), Some(state)) = (c, cell.as_mut()) {
                    state.value.push(c);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("worksheet", e)),
            _ => {}
        }
    }
    Ok(rows)
}
