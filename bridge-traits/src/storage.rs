//! Storage Abstractions
//!
//! Local persistence (a string key-value store, the desktop analogue of browser
//! `localStorage`) and the opaque file handles the host hands to the core when
//! the user picks or drops files.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Key-value storage trait
///
/// Abstracts platform-specific string storage:
/// - Desktop: SQLite-backed table
/// - Web: localStorage
/// - Mobile: UserDefaults / SharedPreferences
///
/// Values are opaque strings; callers own the encoding (the gallery cache
/// stores a JSON array under a single key).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn remember_user(store: &dyn KeyValueStore, id: &str) -> Result<()> {
///     store.set_string("nutcracker-user-id", id).await
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}

/// A file supplied by the host for ingestion.
///
/// The core never sees paths or handles directly; it only needs the display
/// name, the declared MIME type and the content.
#[async_trait]
pub trait FileBlob: Send + Sync {
    /// Display name of the file
    fn name(&self) -> &str;

    /// Declared MIME type (e.g. `image/png`, `video/mp4`)
    fn mime_type(&self) -> &str;

    /// Read the entire content into memory
    async fn read_all(&self) -> Result<Bytes>;
}

/// In-memory blob, handy for hosts that already hold the bytes.
#[derive(Debug, Clone)]
pub struct MemoryBlob {
    name: String,
    mime_type: String,
    data: Bytes,
}

impl MemoryBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl FileBlob for MemoryBlob {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn read_all(&self) -> Result<Bytes> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_blob_returns_content() {
        let blob = MemoryBlob::new("a.png", "image/png", vec![1u8, 2, 3]);

        assert_eq!(blob.name(), "a.png");
        assert_eq!(blob.mime_type(), "image/png");
        assert_eq!(blob.read_all().await.unwrap(), Bytes::from_static(&[1, 2, 3]));
    }
}
