pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod sanitize;
pub mod service;
pub mod upload;

pub use config::{load_config, Config, LogFormat, LoggingConfig};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, IngestError, ItemcatError, Result};
pub use ingest::{IngestWorker, PassSummary, UploadPoller};
pub use service::ServiceError;
pub use upload::{DedupeMode, LifecycleError, RowStatus, UploadStatus};
