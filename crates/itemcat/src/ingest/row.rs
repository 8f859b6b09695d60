//! Parsed source rows and their projection onto item fields.

use serde::ser::{Serialize, SerializeMap, Serializer};

const SKU_COLUMNS: &[&str] = &["sku", "SKU"];
const NAME_COLUMNS: &[&str] = &["name", "Name"];
const DETAIL_COLUMNS: &[&str] = &["primary_detail", "Primary"];
const CATEGORY_COLUMNS: &[&str] = &["category"];

/// One parsed row: column name → cell text, in source column order.
///
/// Headers are whatever the uploaded file says; nothing is validated until
/// [`RowFields::from_raw`] projects the row onto the known item fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    columns: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row over columns whose names are already unique, in order.
    pub fn from_columns(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    /// Sets a column. A repeated header keeps its first position and the
    /// last value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first alias that has a non-empty value, else "".
    fn first_of(&self, aliases: &[&str]) -> &str {
        aliases
            .iter()
            .filter_map(|alias| self.get(alias))
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether any column has a non-empty value.
    pub fn has_value(&self) -> bool {
        self.columns.iter().any(|(_, v)| !v.is_empty())
    }

    /// Serialized form stored as an upload row's `raw_data`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// A row as produced by a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRow {
    Record(RawRow),
    /// The record could not be decoded. Recorded as a row error; the rest of
    /// the file is still processed.
    Malformed { raw: String, reason: String },
}

/// The item fields ingestion reads from a row, trimmed, defaulting to "".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFields {
    pub sku: String,
    pub name: String,
    pub primary_detail: String,
    /// Free-text category name, resolved case-insensitively.
    pub category: String,
}

impl RowFields {
    pub fn from_raw(row: &RawRow) -> Self {
        Self {
            sku: row.first_of(SKU_COLUMNS).trim().to_string(),
            name: row.first_of(NAME_COLUMNS).trim().to_string(),
            primary_detail: row.first_of(DETAIL_COLUMNS).trim().to_string(),
            category: row.first_of(CATEGORY_COLUMNS).trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_uses_aliases_and_trims() {
        let row: RawRow = [
            ("SKU", " U1 "),
            ("Name", "Lamp"),
            ("Primary", "  brass "),
            ("category", "Home & Kitchen"),
            ("colour", "red"),
        ]
        .into_iter()
        .collect();

        let fields = RowFields::from_raw(&row);
        assert_eq!(fields.sku, "U1");
        assert_eq!(fields.name, "Lamp");
        assert_eq!(fields.primary_detail, "brass");
        assert_eq!(fields.category, "Home & Kitchen");
    }

    #[test]
    fn test_projection_prefers_first_non_empty_alias() {
        let row: RawRow = [("sku", ""), ("SKU", "X9")].into_iter().collect();
        assert_eq!(RowFields::from_raw(&row).sku, "X9");
    }

    #[test]
    fn test_column_lookup_is_case_sensitive() {
        let row: RawRow = [("Sku", "A"), ("CATEGORY", "Books")].into_iter().collect();
        let fields = RowFields::from_raw(&row);
        assert_eq!(fields, RowFields::default());
    }

    #[test]
    fn test_json_keeps_column_order() {
        let row: RawRow = [("sku", "U1"), ("name", "Say \"hi\""), ("a", "")]
            .into_iter()
            .collect();
        assert_eq!(row.to_json(), r#"{"sku":"U1","name":"Say \"hi\"","a":""}"#);
    }

    #[test]
    fn test_from_columns_keeps_order_and_values() {
        let row = RawRow::from_columns(vec![
            ("name".to_string(), String::new()),
            ("sku".to_string(), "K1".to_string()),
        ]);
        assert_eq!(row.to_json(), r#"{"name":"","sku":"K1"}"#);
        assert!(row.has_value());
        assert!(!RawRow::from_columns(vec![("a".to_string(), String::new())]).has_value());
    }

    #[test]
    fn test_repeated_header_keeps_last_value() {
        let mut row = RawRow::new();
        row.insert("sku", "first");
        row.insert("name", "n");
        row.insert("sku", "second");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("sku"), Some("second"));
        assert_eq!(row.to_json(), r#"{"sku":"second","name":"n"}"#);
    }
}
