//! Error types for the tracker.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt entry '{key}': {message}")]
    Deserialization { key: String, message: String },

    #[error("Invalid import file: {0}")]
    InvalidImport(String),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Invalid {field}: {value} is not a finite number")]
    InvalidValue { field: &'static str, value: f64 },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage is locked by another process")]
    Locked,

    #[error("Storage not initialized")]
    NotInitialized,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the sync client.
///
/// Every variant leaves local collections untouched; the `Display` text is
/// meant to be shown to the user as-is.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cloud sync is not set up: no access token stored")]
    NotConfigured,

    #[error("Another sync operation is already in progress")]
    Busy,

    #[error("The access token was rejected by the sync service")]
    InvalidCredential,

    #[error("The backup was not found on the sync service")]
    NotFound,

    #[error("No backup found on the sync service")]
    NoRemoteData,

    #[error("Rate limited by the sync service, try again later")]
    RateLimited,

    #[error("The sync service did not respond in time")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Sync service error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Backup data is invalid: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else if e.is_decode() {
            SyncError::InvalidPayload(e.to_string())
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
