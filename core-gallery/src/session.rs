//! Session identity.
//!
//! Each installation gets a `user-<millis>-<suffix>` identity on first use,
//! persisted in the local key-value store and reused afterwards. There is no
//! authentication behind it.

use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::Clock;
use tracing::{debug, info};

use crate::error::{GalleryError, Result};
use crate::models::UploaderId;

/// Read the stored identity, creating and persisting one if absent.
pub async fn load_or_create_identity(
    store: &dyn KeyValueStore,
    key: &str,
    clock: &dyn Clock,
) -> Result<UploaderId> {
    let stored = store.get_string(key).await.map_err(GalleryError::Session)?;

    if let Some(existing) = stored.filter(|s| !s.trim().is_empty()) {
        debug!(identity = %existing, "Reusing session identity");
        return Ok(UploaderId::new(existing));
    }

    let identity = UploaderId::generate(clock);
    store
        .set_string(key, identity.as_str())
        .await
        .map_err(GalleryError::Session)?;
    info!(identity = %identity, "Created session identity");
    Ok(identity)
}
