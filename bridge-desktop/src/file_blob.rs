//! Filesystem-backed file blobs using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileBlob,
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A file on local disk offered for ingestion.
///
/// The MIME type is guessed from the extension unless the host already knows
/// it (e.g. from a drag-and-drop payload).
#[derive(Debug, Clone)]
pub struct LocalFileBlob {
    path: PathBuf,
    name: String,
    mime_type: String,
}

impl LocalFileBlob {
    /// Describe the file at `path`, failing if it is missing or not a regular file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = fs::metadata(&path).await.map_err(BridgeError::Io)?;
        if !metadata.is_file() {
            return Err(BridgeError::OperationFailed(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        debug!(name = %name, mime_type = %mime_type, size = metadata.len(), "Opened file blob");
        Ok(Self {
            path,
            name,
            mime_type,
        })
    }

    /// Override the guessed MIME type
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileBlob for LocalFileBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read_all(&self) -> Result<Bytes> {
        let data = fs::read(&self.path).await.map_err(BridgeError::Io)?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guesses_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.mp4");
        fs::write(&path, b"....").await.unwrap();

        let blob = LocalFileBlob::open(&path).await.unwrap();
        assert_eq!(blob.name(), "holiday.mp4");
        assert_eq!(blob.mime_type(), "video/mp4");
        assert_eq!(blob.read_all().await.unwrap(), Bytes::from_static(b"...."));
    }

    #[tokio::test]
    async fn test_unknown_extension_is_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.zzz");
        fs::write(&path, b"x").await.unwrap();

        let blob = LocalFileBlob::open(&path).await.unwrap();
        assert_eq!(blob.mime_type(), "application/octet-stream");

        let blob = blob.with_mime_type("image/png");
        assert_eq!(blob.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalFileBlob::open(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_read_after_removal_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.png");
        fs::write(&path, b"x").await.unwrap();

        let blob = LocalFileBlob::open(&path).await.unwrap();
        fs::remove_file(&path).await.unwrap();
        assert!(blob.read_all().await.is_err());
    }
}
