//! Operations a web front end invokes: accounts, catalog editing and upload
//! queueing/reporting. Transport concerns (routing, sessions, rendering)
//! live outside this crate; callers pass the authenticated user id in.

pub mod accounts;
pub mod catalog;
pub mod uploads;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Config;
use crate::db::{Database, DatabaseError};

pub use accounts::Accounts;
pub use catalog::{Catalog, ItemPage, ItemQuery};
pub use uploads::{UploadFilter, UploadReport, Uploads};

const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token invalid or expired")]
    InvalidToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Failed to store upload file '{path}': {source}")]
    StoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    /// Message safe to show an end user. Storage and IO details are logged
    /// by the caller, never displayed.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::PasswordHash(_) | Self::StoreFile { .. } => {
                INTERNAL_ERROR.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// All service areas over one database handle.
#[derive(Clone)]
pub struct Services {
    pub accounts: Accounts,
    pub catalog: Catalog,
    pub uploads: Uploads,
}

impl Services {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            accounts: Accounts::new(db.clone(), config.password_reset_ttl()),
            catalog: Catalog::new(db.clone(), config.default_page_size),
            uploads: Uploads::new(db, &config.upload_directory),
        }
    }
}
