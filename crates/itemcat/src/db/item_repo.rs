//! Item repository: catalog rows and paged listing.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{now_rfc3339, Database, DatabaseError};

/// A stored catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    /// Dedupe key for ingestion; not unique by constraint.
    pub sku: String,
    pub name: String,
    pub primary_detail: Option<String>,
    pub category_id: Option<String>,
    pub updated_by: Option<String>,
    pub updated_at: Option<String>,
}

impl Item {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            sku: row.get("sku")?,
            name: row.get("name")?,
            primary_detail: row.get("primary_detail")?,
            category_id: row.get("category_id")?,
            updated_by: row.get("updated_by")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Item joined with its category name and the editor's display name.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub category_name: Option<String>,
    pub updated_by_name: Option<String>,
}

/// Editable item fields.
#[derive(Debug, Clone, Default)]
pub struct ItemFields {
    pub sku: String,
    pub name: String,
    pub primary_detail: Option<String>,
    pub category_id: Option<String>,
}

/// Category restriction for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    /// Items with no category.
    Uncategorized,
    /// Items in the given category.
    Id(String),
}

/// Query filter parameters for item listing.
#[derive(Debug, Default, Clone)]
pub struct ItemFilter {
    /// Case-insensitive substring of sku or name.
    pub search: Option<String>,
    pub category: Option<CategoryFilter>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new item stamped with `updated_by` and the current time.
pub fn insert(
    db: &Database,
    id: &str,
    fields: &ItemFields,
    updated_by: Option<&str>,
) -> Result<Item, DatabaseError> {
    let item = Item {
        id: id.to_string(),
        sku: fields.sku.clone(),
        name: fields.name.clone(),
        primary_detail: fields.primary_detail.clone(),
        category_id: fields.category_id.clone(),
        updated_by: updated_by.map(str::to_string),
        updated_at: Some(now_rfc3339()),
    };

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO items (id, sku, name, primary_detail, category_id, updated_by, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                item.id,
                item.sku,
                item.name,
                item.primary_detail,
                item.category_id,
                item.updated_by,
                item.updated_at,
            ],
        )?;
        Ok(())
    })?;

    Ok(item)
}

fn find_one(db: &Database, sql: &str, key: &str) -> Result<Option<Item>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![key], Item::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Item>, DatabaseError> {
    find_one(db, "SELECT * FROM items WHERE id = ?1", id)
}

/// Finds the earliest inserted item with exactly this sku.
pub fn find_by_sku(db: &Database, sku: &str) -> Result<Option<Item>, DatabaseError> {
    find_one(
        db,
        "SELECT * FROM items WHERE sku = ?1 ORDER BY rowid LIMIT 1",
        sku,
    )
}

/// Overwrites all editable fields. Returns whether the item existed.
pub fn update(
    db: &Database,
    id: &str,
    fields: &ItemFields,
    updated_by: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE items SET sku = ?2, name = ?3, primary_detail = ?4, category_id = ?5,
             updated_by = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                id,
                fields.sku,
                fields.name,
                fields.primary_detail,
                fields.category_id,
                updated_by,
                now_rfc3339(),
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Reassigns (or clears) an item's category. Returns whether the item existed.
pub fn set_category(
    db: &Database,
    id: &str,
    category_id: Option<&str>,
    updated_by: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE items SET category_id = ?2, updated_by = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, category_id, updated_by, now_rfc3339()],
        )?;
        Ok(changed == 1)
    })
}

/// Counts all items.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM items", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Queries items with filters ordered by name, returning (rows, total_count).
pub fn query(db: &Database, filter: &ItemFilter) -> Result<(Vec<ItemView>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let n = param_values.len() + 1;
            conditions.push(format!(
                "(items.sku LIKE ?{n} ESCAPE '\\' OR items.name LIKE ?{n} ESCAPE '\\')"
            ));
            param_values.push(Box::new(like_pattern(search)));
        }
        match &filter.category {
            Some(CategoryFilter::Uncategorized) => {
                conditions.push("items.category_id IS NULL".to_string());
            }
            Some(CategoryFilter::Id(id)) => {
                conditions.push(format!("items.category_id = ?{}", param_values.len() + 1));
                param_values.push(Box::new(id.clone()));
            }
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM items {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(20) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT items.*, categories.name AS category_name,
             COALESCE(users.name, users.email) AS updated_by_name
             FROM items
             LEFT JOIN categories ON items.category_id = categories.id
             LEFT JOIN users ON items.updated_by = users.id
             {} ORDER BY items.name, items.rowid LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<ItemView> = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(ItemView {
                    item: Item::from_row(row)?,
                    category_name: row.get("category_name")?,
                    updated_by_name: row.get("updated_by_name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}
