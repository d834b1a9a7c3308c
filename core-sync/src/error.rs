use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote store error: {0}")]
    Remote(#[source] BridgeError),

    #[error("Remote call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Remote row rejected: {0}")]
    InvalidRow(String),

    #[error("Cache storage error: {0}")]
    Cache(#[source] BridgeError),

    #[error("Cache snapshot is corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Failures that mean the remote store could not be used.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Remote(_)
                | SyncError::Timeout(_)
                | SyncError::InvalidRow(_)
                | SyncError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
