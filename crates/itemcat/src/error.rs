use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ItemcatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Upload lifecycle error: {0}")]
    Lifecycle(#[from] crate::upload::LifecycleError),

    #[error("Service error: {0}")]
    Service(#[from] crate::service::ServiceError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Container-level failures: any of these marks the whole upload `failed`.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Upload file is missing: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read upload file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV: {0}")]
    Csv(String),

    #[error("Failed to parse spreadsheet: {0}")]
    Spreadsheet(String),
}

pub type Result<T> = std::result::Result<T, ItemcatError>;
