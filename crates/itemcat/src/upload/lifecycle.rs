//! Status transitions of an upload record.
//!
//! Every transition is a conditional update in [`upload_repo`], so a record
//! is only ever advanced from the state the caller believes it is in.

use log::debug;
use thiserror::Error;

use super::UploadStatus;
use crate::db::{upload_repo, Database, DatabaseError};

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Illegal upload transition {from} -> {to}")]
    IllegalTransition {
        from: UploadStatus,
        to: UploadStatus,
    },

    #[error("Upload '{id}' is not {expected}")]
    NotInState { id: String, expected: UploadStatus },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

fn advance(
    db: &Database,
    id: &str,
    from: UploadStatus,
    to: UploadStatus,
) -> Result<bool, LifecycleError> {
    if !from.can_transition_to(to) {
        return Err(LifecycleError::IllegalTransition { from, to });
    }
    let applied = upload_repo::transition(db, id, from, to)?;
    debug!("Upload {} {} -> {}: applied={}", id, from, to, applied);
    Ok(applied)
}

/// Claims a pending upload for processing.
///
/// Returns `false` if the record is no longer pending, i.e. another pass
/// already claimed it.
pub fn claim(db: &Database, id: &str) -> Result<bool, LifecycleError> {
    advance(db, id, UploadStatus::Pending, UploadStatus::Processing)
}

/// Records the final item count and marks the upload done in one update,
/// so a reader never sees `done` with a stale count.
pub fn complete(db: &Database, id: &str, items_created: i64) -> Result<(), LifecycleError> {
    let applied = upload_repo::mark_done(db, id, items_created)?;
    debug!("Upload {} processing -> done: applied={}", id, applied);
    if !applied {
        return Err(LifecycleError::NotInState {
            id: id.to_string(),
            expected: UploadStatus::Processing,
        });
    }
    Ok(())
}

/// Marks a claimed upload failed.
pub fn fail(db: &Database, id: &str) -> Result<(), LifecycleError> {
    if !advance(db, id, UploadStatus::Processing, UploadStatus::Failed)? {
        return Err(LifecycleError::NotInState {
            id: id.to_string(),
            expected: UploadStatus::Processing,
        });
    }
    Ok(())
}
