//! # Sync Controller
//!
//! Single authority for moving records between upload input, the remote
//! table, the local snapshot cache and the in-memory gallery.
//!
//! ## Workflow
//!
//! ### Load
//! 1. Status becomes `connecting`
//! 2. Select every row, newest first
//! 3. Success: status `connected`, gallery replaced by the remote rows
//! 4. Failure: status `offline`, gallery replaced by the cache snapshot
//!    (left untouched when there is none, emptied when it is corrupt)
//!
//! ### Upload
//! 1. Encode every file; unsupported or unreadable files are skipped
//! 2. Connected: one batched insert; the change feed brings the rows back
//! 3. Otherwise, or when the insert fails: append locally and rewrite the
//!    snapshot under the gallery write lock
//!
//! ### Delete
//! Owner or admin only. Connected: remote delete (failures logged). Then
//! always: remove locally and rewrite the snapshot.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let controller = Arc::new(SyncController::new(config, remote, cache, gallery, clock));
//! let handle = controller.start().await;
//!
//! let outcome = controller.upload(&identity, &[&blob]).await;
//! println!("stored {} file(s) ({:?})", outcome.stored.len(), outcome.destination);
//!
//! handle.shutdown().await;
//! ```

use bridge_traits::error::BridgeError;
use bridge_traits::remote::{ChangeCallback, ChangeEvent, RemoteStore, SelectQuery, SortOrder};
use bridge_traits::storage::FileBlob;
use bridge_traits::time::Clock;
use core_gallery::{GalleryManager, MediaId, MediaRecord, UploaderId};
use core_media::{MediaEncoder, MediaError};
use core_runtime::config::{ReconnectConfig, SyncSettings, DEFAULT_TABLE};
use core_runtime::events::{
    CollectionSource, ConnectionEvent, CoreEvent, EventBus, GalleryEvent, UploadDestination,
    UploadEvent,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::LocalCache;
use crate::error::{Result, SyncError};
use crate::status::{ConnectionStatus, StatusCell};

const ORDER_COLUMN: &str = "created_at";

/// Controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Remote table holding the records
    pub table: String,

    /// Upper bound on each remote call; `None` waits indefinitely
    pub remote_timeout: Option<Duration>,

    /// Automatic reload with backoff while offline; `None` disables it
    pub reconnect: Option<ReconnectConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            remote_timeout: None,
            reconnect: None,
        }
    }
}

impl SyncConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn from_settings(table: impl Into<String>, settings: &SyncSettings) -> Self {
        Self {
            table: table.into(),
            remote_timeout: settings.remote_timeout,
            reconnect: settings.reconnect.map(ReconnectConfig::clamped),
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = Some(reconnect.clamped());
        self
    }
}

/// Result of a load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Gallery replaced by the remote result set
    Remote { count: usize },
    /// Remote failed; gallery replaced by the cache snapshot
    Cache { count: usize },
    /// Remote failed and the snapshot was unreadable; gallery emptied
    CacheCorrupt,
    /// Remote failed and no snapshot was available; gallery left as it was
    Unchanged,
}

impl LoadOutcome {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            LoadOutcome::Remote { .. } => ConnectionStatus::Connected,
            _ => ConnectionStatus::Offline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Ids of the records written, in input order
    pub stored: Vec<MediaId>,
    /// Files dropped by the encoder
    pub skipped: usize,
    pub destination: UploadDestination,
}

impl UploadOutcome {
    fn nothing(skipped: usize) -> Self {
        Self {
            stored: Vec::new(),
            skipped,
            destination: UploadDestination::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    NotFound,
    Denied,
    Deleted {
        /// Whether the remote row was removed as well
        remote_synced: bool,
    },
}

pub struct SyncController {
    config: SyncConfig,
    remote: Arc<dyn RemoteStore>,
    cache: LocalCache,
    gallery: Arc<GalleryManager>,
    encoder: MediaEncoder,
    clock: Arc<dyn Clock>,
    status: StatusCell,
    event_bus: Arc<EventBus>,
}

impl SyncController {
    pub fn new(
        config: SyncConfig,
        remote: Arc<dyn RemoteStore>,
        cache: LocalCache,
        gallery: Arc<GalleryManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let event_bus = gallery.event_bus().clone();
        Self {
            config,
            remote,
            cache,
            gallery,
            encoder: MediaEncoder::new(),
            clock,
            status: StatusCell::new(),
            event_bus,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn gallery(&self) -> &Arc<GalleryManager> {
        &self.gallery
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    // ------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------

    /// Full reload from the remote store, falling back to the cache.
    #[instrument(skip(self), fields(table = %self.config.table))]
    pub async fn load(&self) -> LoadOutcome {
        self.set_status(ConnectionStatus::Connecting);

        match self.fetch_remote().await {
            Ok(records) => {
                let count = records.len();
                {
                    let mut state = self.gallery.write().await;
                    *state = state.replaced(records);
                }
                self.set_status(ConnectionStatus::Connected);
                info!(count, "Loaded gallery from remote store");

                self.emit(CoreEvent::Gallery(GalleryEvent::CollectionReplaced {
                    count,
                    source: CollectionSource::Remote,
                }));
                LoadOutcome::Remote { count }
            }
            Err(e) => {
                warn!(error = %e, "Remote load failed, falling back to local cache");
                self.set_status(ConnectionStatus::Offline);

                let outcome = self.restore_from_cache().await;
                self.emit(CoreEvent::Connection(ConnectionEvent::LoadFailed {
                    message: e.to_string(),
                    used_cache: !matches!(outcome, LoadOutcome::Unchanged),
                }));
                outcome
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<MediaRecord>> {
        let query = SelectQuery::table(&self.config.table).order_by(ORDER_COLUMN, SortOrder::Descending);
        let rows = self.remote_call(self.remote.select(&query)).await?;

        let records = rows
            .into_iter()
            .map(serde_json::from_value::<MediaRecord>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        // Rows pass the same check as cache snapshots.
        for record in &records {
            record
                .validate()
                .map_err(|e| SyncError::InvalidRow(e.to_string()))?;
        }
        Ok(records)
    }

    async fn restore_from_cache(&self) -> LoadOutcome {
        let mut state = self.gallery.write().await;

        let outcome = match self.cache.load().await {
            Ok(Some(records)) => {
                let count = records.len();
                *state = state.replaced(records);
                info!(count, "Restored gallery from cache snapshot");
                LoadOutcome::Cache { count }
            }
            Ok(None) => {
                debug!("No cache snapshot, keeping current gallery");
                LoadOutcome::Unchanged
            }
            Err(SyncError::CacheCorrupt(reason)) => {
                error!(reason = %reason, "Cache snapshot is corrupt, showing an empty gallery");
                *state = state.replaced(Vec::new());
                LoadOutcome::CacheCorrupt
            }
            Err(e) => {
                error!(error = %e, "Failed to read cache snapshot");
                LoadOutcome::Unchanged
            }
        };
        drop(state);

        match outcome {
            LoadOutcome::Cache { count } => self.emit_replaced_from_cache(count),
            LoadOutcome::CacheCorrupt => self.emit_replaced_from_cache(0),
            _ => {}
        }
        outcome
    }

    fn emit_replaced_from_cache(&self, count: usize) {
        self.emit(CoreEvent::Gallery(GalleryEvent::CollectionReplaced {
            count,
            source: CollectionSource::Cache,
        }));
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Encode and store a batch of files.
    ///
    /// Never fails: skipped files are counted and a remote failure falls
    /// back to local storage for the whole batch.
    #[instrument(skip(self, files), fields(uploader = %uploader, file_count = files.len()))]
    pub async fn upload(&self, uploader: &UploaderId, files: &[&dyn FileBlob]) -> UploadOutcome {
        if files.is_empty() {
            debug!("Empty upload, nothing to do");
            return UploadOutcome::nothing(0);
        }

        self.emit(CoreEvent::Upload(UploadEvent::Started {
            file_count: files.len(),
        }));

        let (records, skipped) = self.encode_batch(uploader, files).await;
        if records.is_empty() {
            info!(skipped, "No valid files in upload");
            self.emit_upload_completed(0, skipped, UploadDestination::None);
            return UploadOutcome::nothing(skipped);
        }

        let stored: Vec<MediaId> = records.iter().map(|r| r.id.clone()).collect();

        if self.status().is_connected() {
            match self.insert_remote(&records).await {
                Ok(()) => {
                    info!(count = stored.len(), "Uploaded batch to remote store");
                    self.emit_upload_completed(stored.len(), skipped, UploadDestination::Remote);
                    return UploadOutcome {
                        stored,
                        skipped,
                        destination: UploadDestination::Remote,
                    };
                }
                Err(e) => {
                    warn!(error = %e, "Remote insert failed, keeping batch locally");
                    self.emit(CoreEvent::Upload(UploadEvent::RemoteRejected {
                        message: e.to_string(),
                    }));
                }
            }
        }

        self.commit_local(records).await;
        info!(count = stored.len(), "Stored batch locally");

        self.emit(CoreEvent::Gallery(GalleryEvent::ItemsAppended {
            media_ids: stored.iter().map(ToString::to_string).collect(),
        }));
        self.emit_upload_completed(stored.len(), skipped, UploadDestination::Local);

        UploadOutcome {
            stored,
            skipped,
            destination: UploadDestination::Local,
        }
    }

    async fn encode_batch(&self, uploader: &UploaderId, files: &[&dyn FileBlob]) -> (Vec<MediaRecord>, usize) {
        let results = self.encoder.encode_all(files).await;

        let mut records = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(encoded) => {
                    records.push(MediaRecord::from_encoded(encoded, uploader.clone(), self.clock.as_ref()));
                }
                Err(e) => {
                    skipped += 1;
                    match &e {
                        MediaError::UnsupportedType(_) => {
                            debug!(file = %file.name(), error = %e, "Skipping unsupported file")
                        }
                        _ => warn!(file = %file.name(), error = %e, "Skipping unreadable file"),
                    }
                    self.emit(CoreEvent::Upload(UploadEvent::FileSkipped {
                        file_name: file.name().to_string(),
                        reason: e.to_string(),
                    }));
                }
            }
        }
        (records, skipped)
    }

    async fn insert_remote(&self, records: &[MediaRecord]) -> Result<()> {
        let rows = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.remote_call(self.remote.insert(&self.config.table, rows)).await
    }

    /// Append and snapshot as one unit under the gallery write lock.
    async fn commit_local(&self, records: Vec<MediaRecord>) {
        let mut state = self.gallery.write().await;
        let next = state.appended(records);
        if let Err(e) = self.cache.save(next.records()).await {
            error!(error = %e, "Failed to save cache snapshot");
        }
        *state = next;
    }

    fn emit_upload_completed(&self, stored: usize, skipped: usize, destination: UploadDestination) {
        self.emit(CoreEvent::Upload(UploadEvent::Completed {
            stored,
            skipped,
            destination,
        }));
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(caller = %caller, media_id = %id))]
    pub async fn delete(&self, caller: &UploaderId, id: &MediaId) -> DeleteOutcome {
        let authorized = {
            let state = self.gallery.read().await;
            match state.get(id) {
                Some(record) => record.can_be_deleted_by(caller, self.gallery.admin_identity()),
                None => {
                    debug!("Delete ignored: record not in gallery");
                    return DeleteOutcome::NotFound;
                }
            }
        };

        if !authorized {
            debug!("Delete denied: caller is neither uploader nor admin");
            self.emit(CoreEvent::Gallery(GalleryEvent::DeleteDenied {
                media_id: id.to_string(),
                caller: caller.to_string(),
            }));
            return DeleteOutcome::Denied;
        }

        let remote_synced = if self.status().is_connected() {
            match self.remote_call(self.remote.delete(&self.config.table, id.as_str())).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Remote delete failed, removing locally only");
                    false
                }
            }
        } else {
            false
        };

        let selection_cleared = {
            let mut state = self.gallery.write().await;
            let was_selected = state.selection() == Some(id);
            let next = state.without(id);
            if let Err(e) = self.cache.save(next.records()).await {
                error!(error = %e, "Failed to save cache snapshot");
            }
            *state = next;
            was_selected
        };

        info!(remote_synced, "Deleted media");
        self.emit(CoreEvent::Gallery(GalleryEvent::ItemDeleted {
            media_id: id.to_string(),
            remote_synced,
        }));
        if selection_cleared {
            self.emit(CoreEvent::Gallery(GalleryEvent::SelectionChanged { media_id: None }));
        }

        DeleteOutcome::Deleted { remote_synced }
    }

    // ------------------------------------------------------------------
    // Change feed
    // ------------------------------------------------------------------

    /// Subscribe to remote changes, run the initial load and spawn the
    /// background task that reloads on every change.
    #[instrument(skip(self), fields(table = %self.config.table))]
    pub async fn start(self: &Arc<Self>) -> SyncHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: ChangeCallback = Arc::new(move |event: ChangeEvent| {
            // Receiver gone means the task stopped.
            let _ = tx.send(event);
        });

        let subscription = match self
            .remote_call(self.remote.subscribe(&self.config.table, callback))
            .await
        {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(error = %e, "Change subscription failed; gallery will not live-update");
                None
            }
        };

        self.load().await;

        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run(rx, token.clone()));

        SyncHandle {
            token,
            subscription,
            task: Some(task),
        }
    }

    async fn run(self: Arc<Self>, mut changes: mpsc::UnboundedReceiver<ChangeEvent>, token: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            let retry = match self.config.reconnect {
                Some(policy) if self.status() == ConnectionStatus::Offline => Some(policy.delay_for(attempt)),
                _ => None,
            };

            tokio::select! {
                _ = token.cancelled() => break,
                Some(event) = changes.recv() => {
                    let mut coalesced = 0usize;
                    while changes.try_recv().is_ok() {
                        coalesced += 1;
                    }
                    debug!(table = %event.table, kind = ?event.kind, coalesced, "Remote change, reloading");
                    self.load().await;
                }
                _ = sleep_or_pending(retry) => {
                    attempt = attempt.saturating_add(1);
                    info!(attempt, "Reconnecting to remote store");
                    self.load().await;
                }
            }

            if self.status().is_connected() {
                attempt = 0;
            }
        }

        debug!("Sync task stopped");
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn remote_call<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, BridgeError>>,
    {
        match self.config.remote_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SyncError::Timeout(limit))?
                .map_err(SyncError::Remote),
            None => call.await.map_err(SyncError::Remote),
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        if let Some(previous) = self.status.set(status) {
            debug!(%previous, current = %status, "Connection status changed");
            self.emit(CoreEvent::Connection(ConnectionEvent::StatusChanged {
                previous: previous.to_string(),
                current: status.to_string(),
            }));
        }
    }

    fn emit(&self, event: CoreEvent) {
        self.event_bus.emit(event).ok();
    }
}

async fn sleep_or_pending(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

/// Running change-feed task. Dropping the handle stops it.
pub struct SyncHandle {
    token: CancellationToken,
    subscription: Option<bridge_traits::remote::Subscription>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Whether the remote change subscription was established
    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| s.is_active())
    }

    /// Unsubscribe and wait for the background task to finish.
    pub async fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sync task ended abnormally");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("subscribed", &self.is_subscribed())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_preserve_plain_behavior() {
        let config = SyncConfig::default();
        assert_eq!(config.table, "media_items");
        assert_eq!(config.remote_timeout, None);
        assert_eq!(config.reconnect, None);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = SyncSettings {
            remote_timeout: Some(Duration::from_secs(3)),
            reconnect: Some(ReconnectConfig::default()),
            ..SyncSettings::default()
        };
        let config = SyncConfig::from_settings("photos", &settings);

        assert_eq!(config.table, "photos");
        assert_eq!(config.remote_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.reconnect, Some(ReconnectConfig::default()));
    }

    #[test]
    fn test_zero_reconnect_delay_is_clamped() {
        let config = SyncConfig::new("media_items").with_reconnect(ReconnectConfig {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 2.0,
        });

        let reconnect = config.reconnect.unwrap();
        assert!(!reconnect.delay_for(0).is_zero());
        assert!(!reconnect.delay_for(5).is_zero());
    }

    #[test]
    fn test_load_outcome_status() {
        assert_eq!(LoadOutcome::Remote { count: 0 }.status(), ConnectionStatus::Connected);
        assert_eq!(LoadOutcome::Cache { count: 2 }.status(), ConnectionStatus::Offline);
        assert_eq!(LoadOutcome::CacheCorrupt.status(), ConnectionStatus::Offline);
        assert_eq!(LoadOutcome::Unchanged.status(), ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn test_sleep_or_pending() {
        tokio::time::timeout(Duration::from_secs(1), sleep_or_pending(Some(Duration::from_millis(1))))
            .await
            .unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(20), sleep_or_pending(None))
                .await
                .is_err()
        );
    }
}
