//! Snapshot error types.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while encoding or decoding snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error from the compression stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob was written by a newer format.
    #[error("Unsupported snapshot format version: {0}")]
    UnsupportedFormat(u32),

    /// Snapshot blob is corrupted.
    #[error("Snapshot blob corrupted: {0}")]
    Corrupted(String),
}

impl SnapshotError {
    /// Create a corrupted blob error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
