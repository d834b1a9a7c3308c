use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported media type: {0}")]
    UnsupportedType(String),

    #[error("Failed to read {file_name}: {source}")]
    Read {
        file_name: String,
        #[source]
        source: BridgeError,
    },

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Failed to probe dimensions: {0}")]
    Probe(String),

    #[error("Image header error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoding task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
