//! Schema migrations for the catalog store.
//!
//! Applied versions are recorded in `schema_migrations`. Each pending step
//! runs in its own transaction together with its ledger entry. Column
//! additions check `PRAGMA table_info` first, so a store whose table already
//! carries the column only gets the ledger entry.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

enum Step {
    Sql(&'static str),
    AddColumn {
        table: &'static str,
        column: &'static str,
        sql: &'static str,
    },
}

struct Migration {
    version: u32,
    name: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users",
        step: Step::Sql(include_str!("sql/001_create_users.sql")),
    },
    Migration {
        version: 2,
        name: "categories_and_items",
        step: Step::Sql(include_str!("sql/002_create_catalog.sql")),
    },
    Migration {
        version: 3,
        name: "password_resets",
        step: Step::Sql(include_str!("sql/003_create_password_resets.sql")),
    },
    Migration {
        version: 4,
        name: "upload_records_and_rows",
        step: Step::Sql(include_str!("sql/004_create_uploads.sql")),
    },
    Migration {
        version: 5,
        name: "users_role",
        step: Step::AddColumn {
            table: "users",
            column: "role",
            sql: include_str!("sql/005_add_user_role.sql"),
        },
    },
    Migration {
        version: 6,
        name: "upload_records_dedupe_mode",
        step: Step::AddColumn {
            table: "upload_records",
            column: "dedupe_mode",
            sql: include_str!("sql/006_add_dedupe_mode.sql"),
        },
    },
];

/// Brings the schema up to the latest version.
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration)?;
    }
    Ok(())
}

fn apply(conn: &mut Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let failed = |e: rusqlite::Error| DatabaseError::Migration {
        version: migration.version,
        reason: e.to_string(),
    };

    let tx = conn.transaction().map_err(failed)?;
    match &migration.step {
        Step::Sql(sql) => {
            log::info!("Applying migration {} ({})", migration.version, migration.name);
            tx.execute_batch(sql).map_err(failed)?;
        }
        Step::AddColumn { table, column, sql } => {
            if has_column(&tx, table, column)? {
                log::debug!(
                    "Migration {}: {}.{} already present",
                    migration.version,
                    table,
                    column
                );
            } else {
                log::info!("Applying migration {} ({})", migration.version, migration.name);
                tx.execute_batch(sql).map_err(failed)?;
            }
        }
    }
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.version, migration.name, super::now_rfc3339()],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let mut stmt = conn.prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?;
    Ok(stmt.exists(params![table, column])?)
}
