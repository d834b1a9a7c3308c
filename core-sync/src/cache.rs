//! Local snapshot cache.
//!
//! The whole collection is stored as one JSON array under a single key.
//! Writes always replace the full snapshot; reads are all-or-nothing, so a
//! single malformed element marks the snapshot corrupt.

use bridge_traits::storage::KeyValueStore;
use core_gallery::MediaRecord;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Result, SyncError};

#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the snapshot. `Ok(None)` when nothing was ever saved.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn load(&self) -> Result<Option<Vec<MediaRecord>>> {
        let Some(raw) = self.store.get_string(&self.key).await.map_err(SyncError::Cache)? else {
            debug!("No cache snapshot");
            return Ok(None);
        };

        let records: Vec<MediaRecord> =
            serde_json::from_str(&raw).map_err(|e| SyncError::CacheCorrupt(e.to_string()))?;
        for record in &records {
            record
                .validate()
                .map_err(|e| SyncError::CacheCorrupt(e.to_string()))?;
        }

        debug!(count = records.len(), "Loaded cache snapshot");
        Ok(Some(records))
    }

    /// Overwrite the snapshot with the given collection.
    #[instrument(skip(self, records), fields(key = %self.key, count = records.len()))]
    pub async fn save(&self, records: &[MediaRecord]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.store
            .set_string(&self.key, &raw)
            .await
            .map_err(SyncError::Cache)?;
        debug!(bytes = raw.len(), "Saved cache snapshot");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.delete(&self.key).await.map_err(SyncError::Cache)
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache").field("key", &self.key).finish()
    }
}
