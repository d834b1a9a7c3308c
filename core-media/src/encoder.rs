//! File blob to data URI encoding.

use bridge_traits::storage::FileBlob;
use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, instrument};

use crate::data_uri::DataUri;
use crate::error::{MediaError, Result};
use crate::kind::MediaKind;
use crate::probe;

/// Output of a single encode pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMedia {
    pub file_name: String,
    pub mime_type: String,
    pub kind: MediaKind,
    pub data_uri: DataUri,
    /// Height / width; 1.0 when the probe could not determine it.
    pub aspect_ratio: f64,
    pub size_bytes: usize,
}

/// Turns user-supplied blobs into self-contained records.
///
/// Base64 encoding and dimension probing are CPU bound and run on the blocking
/// pool. Each call owns its bytes, so files in a batch never share state.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaEncoder;

impl MediaEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Whether a blob would be accepted, judged by its declared MIME type.
    pub fn accepts(&self, file: &dyn FileBlob) -> bool {
        MediaKind::from_mime(file.mime_type()).is_some()
    }

    /// Encode one file.
    ///
    /// Fails with [`MediaError::UnsupportedType`] for anything that is not an
    /// image or video, and with [`MediaError::Read`] when the content cannot
    /// be read. Probe failures never fail the encode.
    #[instrument(skip(self, file), fields(file = %file.name()))]
    pub async fn encode(&self, file: &dyn FileBlob) -> Result<EncodedMedia> {
        let mime_type = file.mime_type().to_string();
        let kind = MediaKind::from_mime(&mime_type)
            .ok_or_else(|| MediaError::UnsupportedType(mime_type.clone()))?;

        let bytes = file.read_all().await.map_err(|source| MediaError::Read {
            file_name: file.name().to_string(),
            source,
        })?;
        let size_bytes = bytes.len();

        let (data_uri, aspect_ratio) = encode_blocking(kind, mime_type.clone(), bytes).await?;
        debug!(kind = %kind, size_bytes, aspect_ratio, "Encoded file");

        Ok(EncodedMedia {
            file_name: file.name().to_string(),
            mime_type,
            kind,
            data_uri,
            aspect_ratio,
            size_bytes,
        })
    }

    /// Encode a batch concurrently, one result per input in input order.
    pub async fn encode_all(&self, files: &[&dyn FileBlob]) -> Vec<Result<EncodedMedia>> {
        join_all(files.iter().map(|file| self.encode(*file))).await
    }
}

async fn encode_blocking(kind: MediaKind, mime_type: String, bytes: Bytes) -> Result<(DataUri, f64)> {
    tokio::task::spawn_blocking(move || {
        let ratio = probe::aspect_ratio_or_default(kind, &bytes);
        (DataUri::encode(&mime_type, &bytes), ratio)
    })
    .await
    .map_err(|e| MediaError::Task(e.to_string()))
}
