//! Error types for the endpoint.

use omsync_core::CoreError;
use omsync_store::StoreError;
use omsync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during endpoint operations.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Tree, path or command error.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Preference store error.
    #[error("preference error: {0}")]
    Store(#[from] StoreError),

    /// Link or file transfer error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The configuration could not be decoded.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration decoded but its settings do not fit together.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for endpoint operations.
pub type Result<T> = std::result::Result<T, EndpointError>;
