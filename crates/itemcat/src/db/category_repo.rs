//! Category repository.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

pub fn insert(db: &Database, category: &Category) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO categories (id, name) VALUES (?1, ?2)",
            params![category.id, category.name],
        )?;
        Ok(())
    })
}

/// Lists all categories ordered by name.
pub fn list_all(db: &Database) -> Result<Vec<Category>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM categories ORDER BY name")?;
        let rows = stmt
            .query_map([], Category::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Category>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM categories WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], Category::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds a category whose name equals `name` ignoring case.
///
/// Compared in Rust rather than with SQL `LOWER()`, which only folds ASCII.
pub fn find_by_name_ci(db: &Database, name: &str) -> Result<Option<Category>, DatabaseError> {
    let wanted = name.to_lowercase();
    Ok(list_all(db)?
        .into_iter()
        .find(|c| c.name.to_lowercase() == wanted))
}
