//! Error types for the store module.

use thiserror::Error;

use crate::traits::Precondition;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event or record (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A changeset was planned against state that changed before it landed.
    #[error("precondition failed: {0:?}")]
    PreconditionFailed(Precondition),

    /// A blocking task could not be joined.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<certreg_core::CoreError> for StoreError {
    fn from(e: certreg_core::CoreError) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
