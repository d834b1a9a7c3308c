use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Invalid media record: {0}")]
    InvalidRecord(String),

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Session storage error: {0}")]
    Session(#[source] BridgeError),

    #[error("Rendering surface error: {0}")]
    Surface(#[source] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GalleryError>;
