use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Remote store error: {0}")]
    RemoteError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure came from the remote side (network, HTTP status,
    /// malformed response) rather than from a local capability.
    pub fn is_remote(&self) -> bool {
        matches!(self, BridgeError::RemoteError(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
