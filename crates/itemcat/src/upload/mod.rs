//! Upload record lifecycle: status state machine, dedupe policy and
//! per-row outcome kinds.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod lifecycle;

pub use lifecycle::LifecycleError;

/// Returned when a stored or user-supplied string names no known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Status of an upload record. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// pending → processing → {done | failed}. Nothing is ever reopened.
    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Done)
                | (Self::Processing, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl FromStr for UploadStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError {
                kind: "upload status",
                value: other.to_string(),
            }),
        }
    }
}

/// How ingestion treats a row whose sku already exists in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeMode {
    /// Leave the existing item alone and record the row as skipped.
    #[default]
    Skip,
    /// Merge non-empty values into the existing item.
    Update,
    /// Create another item with the same sku.
    Duplicate,
}

impl DedupeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Update => "update",
            Self::Duplicate => "duplicate",
        }
    }
}

impl FromStr for DedupeMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "update" => Ok(Self::Update),
            "duplicate" => Ok(Self::Duplicate),
            other => Err(ParseEnumError {
                kind: "dedupe mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome recorded for one source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Created,
    Updated,
    Skipped,
    Error,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }

    /// Rows that count toward an upload's `items_created` total.
    pub fn counts_toward_items_created(&self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }
}

impl FromStr for RowStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            other => Err(ParseEnumError {
                kind: "row status",
                value: other.to_string(),
            }),
        }
    }
}

/// Stores the enum as its lowercase text form.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_text_enum!(UploadStatus, DedupeMode, RowStatus);
