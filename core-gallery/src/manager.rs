//! Owner of the live [`GalleryState`].
//!
//! The sync controller replaces and edits the collection through
//! [`GalleryManager::write`]; UI intents (selection and video playback) go
//! through the methods here. Every change is announced on the event bus.

use bridge_traits::error::BridgeError;
use bridge_traits::media::MediaSurface;
use core_runtime::events::{CoreEvent, EventBus, GalleryEvent};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument};

use crate::error::{GalleryError, Result};
use crate::models::{MediaId, MediaRecord, UploaderId};
use crate::playback::PlaybackDescriptor;
use crate::state::GalleryState;

pub struct GalleryManager {
    state: RwLock<GalleryState>,
    surface: Arc<dyn MediaSurface>,
    event_bus: Arc<EventBus>,
    admin_identity: String,
    /// Serializes toggles per record without holding the gallery lock.
    toggle_locks: Mutex<HashMap<MediaId, Arc<AsyncMutex<()>>>>,
}

impl GalleryManager {
    pub fn new(surface: Arc<dyn MediaSurface>, event_bus: Arc<EventBus>, admin_identity: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(GalleryState::default()),
            surface,
            event_bus,
            admin_identity: admin_identity.into(),
            toggle_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> GalleryState {
        self.state.read().await.clone()
    }

    pub async fn records(&self) -> Vec<MediaRecord> {
        self.state.read().await.records().to_vec()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GalleryState> {
        self.state.read().await
    }

    /// Exclusive access for read-modify-write sequences.
    ///
    /// Holders may await (e.g. a cache write) before assigning the next
    /// state, which makes the whole sequence atomic against other writers.
    pub async fn write(&self) -> RwLockWriteGuard<'_, GalleryState> {
        self.state.write().await
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn admin_identity(&self) -> &str {
        &self.admin_identity
    }

    pub async fn can_delete(&self, id: &MediaId, caller: &UploaderId) -> bool {
        self.state
            .read()
            .await
            .get(id)
            .is_some_and(|r| r.can_be_deleted_by(caller, &self.admin_identity))
    }

    /// Select a record for full-screen viewing, or clear with `None`.
    #[instrument(skip(self))]
    pub async fn select(&self, id: Option<MediaId>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(id) = &id {
            if !state.contains(id) {
                return Err(GalleryError::NotFound(id.to_string()));
            }
        }
        if state.selection() == id.as_ref() {
            return Ok(());
        }

        *state = state.with_selection(id.clone());
        drop(state);

        self.event_bus
            .emit(CoreEvent::Gallery(GalleryEvent::SelectionChanged {
                media_id: id.map(|id| id.to_string()),
            }))
            .ok();
        Ok(())
    }

    /// Play or pause a video.
    ///
    /// Returns `None` without touching anything when the record is unknown,
    /// is not a video, or has no mounted element on the surface.
    #[instrument(skip(self))]
    pub async fn toggle_play(&self, id: &MediaId) -> Result<Option<PlaybackDescriptor>> {
        self.toggle(id, |surface, current| async move {
            if current.playing {
                surface.pause(id.as_str()).await?;
            } else {
                surface.play(id.as_str()).await?;
            }
            Ok::<_, BridgeError>(current.toggled_play())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn toggle_mute(&self, id: &MediaId) -> Result<Option<PlaybackDescriptor>> {
        self.toggle(id, |surface, current| async move {
            surface.set_muted(id.as_str(), !current.muted).await?;
            Ok::<_, BridgeError>(current.toggled_mute())
        })
        .await
    }

    async fn toggle<'a, F, Fut>(&'a self, id: &'a MediaId, command: F) -> Result<Option<PlaybackDescriptor>>
    where
        F: FnOnce(&'a dyn MediaSurface, PlaybackDescriptor) -> Fut,
        Fut: Future<Output = std::result::Result<PlaybackDescriptor, BridgeError>>,
    {
        let toggle_lock = self.toggle_lock(id);
        let _serialized = toggle_lock.lock().await;

        let current = {
            let state = self.state.read().await;
            if !state.get(id).is_some_and(|r| r.is_video()) {
                debug!(media_id = %id, "Toggle ignored: not a video in the gallery");
                return Ok(None);
            }
            state.playback(id)
        };
        if !self.surface.is_attached(id.as_str()).await {
            debug!(media_id = %id, "Toggle ignored: no element attached");
            return Ok(None);
        }

        // The gallery lock is not held while the surface command runs.
        let next = command(self.surface.as_ref(), current)
            .await
            .map_err(GalleryError::Surface)?;

        {
            let mut state = self.state.write().await;
            if !state.contains(id) {
                debug!(media_id = %id, "Record removed during toggle, descriptor dropped");
                return Ok(None);
            }
            *state = state.with_playback(id, next);
        }

        self.event_bus
            .emit(CoreEvent::Gallery(GalleryEvent::PlaybackChanged {
                media_id: id.to_string(),
                playing: next.playing,
                muted: next.muted,
            }))
            .ok();
        Ok(Some(next))
    }

    fn toggle_lock(&self, id: &MediaId) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .toggle_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(id.clone()).or_default().clone()
    }
}
