//! Facade-level error type: a thin wrapper over the store and sync errors
//! it composes, so callers see one error type regardless of which layer a
//! failure originated in.

use thiserror::Error;

pub type FacadeResult<T> = Result<T, FacadeError>;

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error(transparent)]
    Database(#[from] inkwell_db::DbError),

    #[error(transparent)]
    Sync(#[from] inkwell_sync::SyncError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("memo not found")]
    MemoNotFound,

    #[error("shelf entry not found")]
    ShelfEntryNotFound,
}
