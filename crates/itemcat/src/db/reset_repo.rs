//! Password reset token repository.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub token: String,
    pub user_id: String,
    /// RFC 3339 expiry; the token is invalid from this instant on.
    pub expires_at: String,
}

impl PasswordReset {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            token: row.get("token")?,
            user_id: row.get("user_id")?,
            expires_at: row.get("expires_at")?,
        })
    }
}

pub fn insert(db: &Database, reset: &PasswordReset) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO password_resets (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![reset.token, reset.user_id, reset.expires_at],
        )?;
        Ok(())
    })
}

pub fn find(db: &Database, token: &str) -> Result<Option<PasswordReset>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM password_resets WHERE token = ?1")?;
        let mut rows = stmt.query_map(params![token], PasswordReset::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn delete(db: &Database, token: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM password_resets WHERE token = ?1", params![token])?;
        Ok(())
    })
}
