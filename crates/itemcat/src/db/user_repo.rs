//! User repository: accounts and roles.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};
use crate::upload::ParseEnumError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Annotator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annotator => "annotator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotator" => Ok(Self::Annotator),
            "admin" => Ok(Self::Admin),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
    }
}

/// A stored user. The password hash never leaves the crate in serialized form.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

impl User {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            name: row.get("name")?,
            role: row.get("role")?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// Inserts a new user with the default `annotator` role.
pub fn insert(db: &Database, user: &NewUser) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (id, email, password_hash, name, role) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.name,
                Role::Annotator
            ],
        )?;
        Ok(())
    })
}

fn find_one(db: &Database, sql: &str, key: &str) -> Result<Option<User>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![key], User::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<User>, DatabaseError> {
    find_one(db, "SELECT * FROM users WHERE id = ?1", id)
}

pub fn find_by_email(db: &Database, email: &str) -> Result<Option<User>, DatabaseError> {
    find_one(db, "SELECT * FROM users WHERE email = ?1", email)
}

/// Lists all users ordered by email.
pub fn list_all(db: &Database) -> Result<Vec<User>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY email")?;
        let rows = stmt
            .query_map([], User::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Sets a user's role. Returns whether the user existed.
pub fn set_role(db: &Database, id: &str, role: Role) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE users SET role = ?2 WHERE id = ?1",
            params![id, role],
        )?;
        Ok(changed == 1)
    })
}

pub fn set_password_hash(db: &Database, id: &str, password_hash: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE users SET password_hash = ?2 WHERE id = ?1",
            params![id, password_hash],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(id: &str, email: &str) -> NewUser {
        NewUser {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: id.to_uppercase(),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_user("u1", "one@example.com")).unwrap();

        let by_id = find_by_id(&db, "u1").unwrap().unwrap();
        assert_eq!(by_id.email, "one@example.com");
        assert_eq!(by_id.role, Role::Annotator);

        let by_email = find_by_email(&db, "one@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert!(find_by_email(&db, "two@example.com").unwrap().is_none());
    }

    #[test]
    fn test_email_is_unique() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_user("u1", "same@example.com")).unwrap();
        assert!(insert(&db, &sample_user("u2", "same@example.com")).is_err());
    }

    #[test]
    fn test_set_role_and_list() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_user("u2", "b@example.com")).unwrap();
        insert(&db, &sample_user("u1", "a@example.com")).unwrap();

        assert!(set_role(&db, "u2", Role::Admin).unwrap());
        assert!(!set_role(&db, "missing", Role::Admin).unwrap());

        let users = list_all(&db).unwrap();
        assert_eq!(users[0].email, "a@example.com");
        assert!(users[1].is_admin());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &sample_user("u1", "a@example.com")).unwrap();
        set_password_hash(&db, "u1", "secret-hash").unwrap();

        let user = find_by_id(&db, "u1").unwrap().unwrap();
        assert_eq!(user.password_hash, "secret-hash");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
