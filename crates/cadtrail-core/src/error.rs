//! Error types for the core crate.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] cadtrail_storage::StorageError),

    /// Host document error.
    #[error("host error: {0}")]
    Host(#[from] cadtrail_host::HostError),

    /// Snapshot codec error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] cadtrail_snapshot::SnapshotError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No document is being tracked.
    #[error("no active tracking session")]
    NoActiveSession,

    /// The host document has never been saved.
    #[error("document has no path; save it before tracking")]
    MissingDocumentPath,

    /// Snapshot is neither in the chain nor in the store.
    #[error("snapshot not found: {id}")]
    SnapshotNotFound { id: String },

    /// Redo past a dirty document would discard unsaved edits.
    #[error("document has changes since the current snapshot; commit or undo them first")]
    DirtyDocument,

    /// Session lock was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CoreError {
    pub fn snapshot_not_found(id: impl Into<String>) -> Self {
        Self::SnapshotNotFound { id: id.into() }
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// Invalid path (e.g., could not determine data directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
