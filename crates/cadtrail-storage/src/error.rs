//! Storage error types.

use cadtrail_snapshot::SnapshotError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Index database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Blob could not be encoded or decoded
    #[error("Snapshot blob error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Snapshot not found in the index
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// An index row or blob does not hold what it claims to
    #[error("Corrupt history data: {0}")]
    Corrupt(String),

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    /// Create a not found error for a snapshot ID.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a corrupt data error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}
