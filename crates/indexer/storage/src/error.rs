//! Storage error types.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that may occur while interacting with the ledger.
///
/// This enum is used across all implementations of the ledger traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// DatabaseError
    #[error("Database error")]
    Database(#[source] rusqlite::Error),

    /// An insert collided with an existing unique entry.
    #[error("Conflict error: {0}")]
    ConflictError(String),

    /// The connection lock was poisoned by a panicking writer.
    #[error("Ledger connection lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Returns `true` if retrying the same operation may succeed.
    ///
    /// Only lock contention on the database file is transient. Everything else, including a
    /// stored value that no longer decodes, needs operator attention.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}
