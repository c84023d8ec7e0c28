//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during preference operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A value could not be written. The in-memory value is unaffected.
    #[error("failed to write preference {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    /// `get`/`put`/`remove` was called outside `begin`/`end`.
    #[error("no preference namespace open")]
    NoNamespace,

    /// Namespaces are short identifiers.
    #[error("invalid namespace: [{0}]")]
    InvalidNamespace(String),

    /// A lock guarding the backend was poisoned.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
