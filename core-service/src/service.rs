//! Gallery service façade.

use bridge_traits::media::{DetachedSurface, MediaSurface};
use bridge_traits::remote::RemoteStore;
use bridge_traits::storage::FileBlob;
use core_gallery::{load_or_create_identity, GalleryManager, MediaId, PlaybackDescriptor, UploaderId};
use core_media::MediaEncoder;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::{
    ConnectionStatus, DeleteOutcome, LoadOutcome, LocalCache, SyncConfig, SyncController,
    SyncHandle, UploadOutcome,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::view::GalleryView;

/// Primary façade exposed to host applications.
///
/// Owns the sync controller and its change-feed task and tracks the small
/// amount of interaction state (drag-over, uploads in flight) that belongs
/// to no other component.
pub struct GalleryService {
    controller: Arc<SyncController>,
    gallery: Arc<GalleryManager>,
    event_bus: Arc<EventBus>,
    identity: UploaderId,
    encoder: MediaEncoder,
    uploads_in_flight: AtomicUsize,
    drag_over: AtomicBool,
    handle: Mutex<Option<SyncHandle>>,
}

impl GalleryService {
    /// Wire the configured bridges together, run the initial load and start
    /// listening for remote changes.
    ///
    /// ```ignore
    /// let config = CoreConfig::builder()
    ///     .remote(RemoteConfig::from_env()?)
    ///     .build()?;
    /// let service = GalleryService::bootstrap(config).await?;
    /// println!("{} item(s), {}", service.view().await.counts.total, service.status());
    /// ```
    #[instrument(skip(config), fields(table = %config.remote.table))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let remote = resolve_remote_store(&config)?;

        let identity = load_or_create_identity(
            config.key_value_store.as_ref(),
            &config.storage_keys.user_id,
            config.clock.as_ref(),
        )
        .await?;

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let surface: Arc<dyn MediaSurface> = config
            .media_surface
            .clone()
            .unwrap_or_else(|| Arc::new(DetachedSurface));
        let gallery = Arc::new(GalleryManager::new(
            surface,
            event_bus.clone(),
            config.admin_identity.clone(),
        ));

        let cache = LocalCache::new(config.key_value_store.clone(), config.storage_keys.backup.clone());
        let controller = Arc::new(SyncController::new(
            SyncConfig::from_settings(config.remote.table.clone(), &config.sync),
            remote,
            cache,
            gallery.clone(),
            config.clock.clone(),
        ));

        let handle = controller.start().await;
        info!(
            identity = %identity,
            status = %controller.status(),
            subscribed = handle.is_subscribed(),
            "Gallery service started"
        );

        Ok(Self {
            controller,
            gallery,
            event_bus,
            identity,
            encoder: MediaEncoder::new(),
            uploads_in_flight: AtomicUsize::new(0),
            drag_over: AtomicBool::new(false),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Identity attached to uploads from this installation
    pub fn identity(&self) -> &UploaderId {
        &self.identity
    }

    pub fn status(&self) -> ConnectionStatus {
        self.controller.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.controller.subscribe_status()
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Snapshot of everything the rendering layer displays
    pub async fn view(&self) -> GalleryView {
        GalleryView::new(
            self.gallery.snapshot().await,
            self.status(),
            self.is_uploading(),
            self.is_drag_over(),
            self.identity.clone(),
            self.gallery.admin_identity(),
        )
    }

    /// Re-fetch the collection (falls back to the cache when unreachable)
    pub async fn reload(&self) -> LoadOutcome {
        self.controller.load().await
    }

    /// Whether the encoder would take this file; hosts use it to filter pickers.
    pub fn accepts(&self, file: &dyn FileBlob) -> bool {
        self.encoder.accepts(file)
    }

    // ------------------------------------------------------------------
    // Upload & drag-and-drop
    // ------------------------------------------------------------------

    pub async fn upload_files(&self, files: &[&dyn FileBlob]) -> UploadOutcome {
        let _guard = UploadGuard::enter(&self.uploads_in_flight);
        self.controller.upload(&self.identity, files).await
    }

    pub fn is_uploading(&self) -> bool {
        self.uploads_in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn drag_over(&self) {
        self.drag_over.store(true, Ordering::SeqCst);
    }

    pub fn drag_leave(&self) {
        self.drag_over.store(false, Ordering::SeqCst);
    }

    pub fn is_drag_over(&self) -> bool {
        self.drag_over.load(Ordering::SeqCst)
    }

    /// End a drag gesture and upload whatever was dropped.
    pub async fn drop_files(&self, files: &[&dyn FileBlob]) -> UploadOutcome {
        self.drag_leave();
        self.upload_files(files).await
    }

    // ------------------------------------------------------------------
    // Record interactions
    // ------------------------------------------------------------------

    pub async fn select(&self, id: Option<MediaId>) -> Result<()> {
        Ok(self.gallery.select(id).await?)
    }

    pub async fn delete(&self, id: &MediaId) -> DeleteOutcome {
        self.controller.delete(&self.identity, id).await
    }

    pub async fn can_delete(&self, id: &MediaId) -> bool {
        self.gallery.can_delete(id, &self.identity).await
    }

    pub async fn toggle_play(&self, id: &MediaId) -> Result<Option<PlaybackDescriptor>> {
        Ok(self.gallery.toggle_play(id).await?)
    }

    pub async fn toggle_mute(&self, id: &MediaId) -> Result<Option<PlaybackDescriptor>> {
        Ok(self.gallery.toggle_mute(id).await?)
    }

    /// Stop the change feed. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.shutdown().await;
            info!("Gallery service stopped");
        }
    }
}

struct UploadGuard<'a>(&'a AtomicUsize);

impl<'a> UploadGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn resolve_remote_store(config: &CoreConfig) -> Result<Arc<dyn RemoteStore>> {
    if let Some(store) = &config.remote_store {
        debug!("Using injected remote store");
        return Ok(store.clone());
    }
    build_connector(config)
}

#[cfg(feature = "supabase")]
fn build_connector(config: &CoreConfig) -> Result<Arc<dyn RemoteStore>> {
    use provider_supabase::SupabaseConnector;

    let http_client = match &config.http_client {
        Some(client) => client.clone(),
        None => default_http_client()?,
    };
    if config.remote.is_placeholder() {
        info!("Remote endpoint not configured; the gallery will run offline");
    }

    let connector = SupabaseConnector::new(http_client, &config.remote)
        .with_poll_interval(config.sync.poll_interval);
    Ok(Arc::new(connector))
}

#[cfg(not(feature = "supabase"))]
fn build_connector(_config: &CoreConfig) -> Result<Arc<dyn RemoteStore>> {
    Err(crate::CoreError::CapabilityMissing {
        capability: "RemoteStore".to_string(),
        message: "No remote store injected. Enable the 'supabase' feature or call \
                  CoreConfigBuilder::remote_store."
            .to_string(),
    })
}

#[cfg(all(feature = "supabase", feature = "desktop-shims", not(target_arch = "wasm32")))]
fn default_http_client() -> Result<Arc<dyn bridge_traits::http::HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(all(feature = "supabase", not(all(feature = "desktop-shims", not(target_arch = "wasm32")))))]
fn default_http_client() -> Result<Arc<dyn bridge_traits::http::HttpClient>> {
    Err(crate::CoreError::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "The REST connector needs an HttpClient. Desktop: enable the 'desktop-shims' \
                  feature. Other hosts: call CoreConfigBuilder::http_client."
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use async_trait::async_trait;
    use bridge_desktop::SqliteKeyValueStore;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::remote::{ChangeCallback, Row, SelectQuery, Subscription};
    use bridge_traits::storage::{KeyValueStore, MemoryBlob};
    use core_runtime::events::UploadDestination;
    use mockall::mock;

    mock! {
        Remote {}

        #[async_trait]
        impl RemoteStore for Remote {
            async fn select(&self, query: &SelectQuery) -> BridgeResult<Vec<Row>>;
            async fn insert(&self, table: &str, rows: Vec<Row>) -> BridgeResult<()>;
            async fn delete(&self, table: &str, id: &str) -> BridgeResult<()>;
            async fn subscribe(&self, table: &str, callback: ChangeCallback) -> BridgeResult<Subscription>;
        }
    }

    fn png() -> Vec<u8> {
        let img = image::RgbImage::new(4, 2);
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn offline_remote() -> MockRemote {
        let mut remote = MockRemote::new();
        remote
            .expect_subscribe()
            .returning(|_, _| Ok(Subscription::noop()));
        remote
            .expect_select()
            .returning(|_| Err(BridgeError::RemoteError("unreachable".to_string())));
        remote
    }

    async fn service_with(remote: MockRemote) -> (GalleryService, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::in_memory().await.unwrap());
        let config = CoreConfig::builder()
            .key_value_store(store.clone())
            .remote_store(Arc::new(remote))
            .build()
            .unwrap();
        (GalleryService::bootstrap(config).await.unwrap(), store)
    }

    #[tokio::test]
    async fn test_bootstrap_connects_and_persists_identity() {
        let mut remote = MockRemote::new();
        remote
            .expect_subscribe()
            .times(1)
            .returning(|_, _| Ok(Subscription::noop()));
        remote.expect_select().times(1).returning(|_| Ok(vec![]));

        let (service, store) = service_with(remote).await;

        assert_eq!(service.status(), ConnectionStatus::Connected);
        assert!(service.identity().as_str().starts_with("user-"));
        assert_eq!(
            store.get_string("nutcracker-user-id").await.unwrap().as_deref(),
            Some(service.identity().as_str())
        );

        let view = service.view().await;
        assert!(view.records.is_empty());
        assert_eq!(view.counts.total, 0);
        assert!(!view.uploading);

        service.shutdown().await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_bootstrap_reuses_stored_identity() {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::in_memory().await.unwrap());
        store
            .set_string("nutcracker-user-id", "user-1700000000000-abcdefghi")
            .await
            .unwrap();

        let config = CoreConfig::builder()
            .key_value_store(store)
            .remote_store(Arc::new(offline_remote()))
            .build()
            .unwrap();
        let service = GalleryService::bootstrap(config).await.unwrap();

        assert_eq!(service.identity().as_str(), "user-1700000000000-abcdefghi");
        assert_eq!(service.status(), ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn test_connected_upload_inserts_remotely() {
        let mut remote = MockRemote::new();
        remote
            .expect_subscribe()
            .returning(|_, _| Ok(Subscription::noop()));
        remote.expect_select().returning(|_| Ok(vec![]));
        remote
            .expect_insert()
            .times(1)
            .withf(|table, rows| table == "media_items" && rows.len() == 1)
            .returning(|_, _| Ok(()));

        let (service, _) = service_with(remote).await;
        let blob = MemoryBlob::new("cat.png", "image/png", png());

        let outcome = service.upload_files(&[&blob]).await;

        assert_eq!(outcome.destination, UploadDestination::Remote);
        assert_eq!(outcome.stored.len(), 1);
        assert!(!service.is_uploading());
    }

    #[tokio::test]
    async fn test_drop_files_offline_lands_locally() {
        let (service, store) = service_with(offline_remote()).await;
        let blob = MemoryBlob::new("cat.png", "image/png", png());
        let notes = MemoryBlob::new("notes.txt", "text/plain", b"hi".to_vec());

        service.drag_over();
        assert!(service.view().await.drag_over);

        let outcome = service.drop_files(&[&blob, &notes]).await;

        assert_eq!(outcome.destination, UploadDestination::Local);
        assert_eq!(outcome.skipped, 1);

        let view = service.view().await;
        assert!(!view.drag_over);
        assert_eq!(view.records.len(), 1);
        assert_eq!(view.records[0].aspect_ratio, 0.5);
        assert!(view.can_delete(&view.records[0]));
        assert!(store.get_string("nutcracker-media-backup").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_select_and_delete_own_record() {
        let (service, _) = service_with(offline_remote()).await;
        let blob = MemoryBlob::new("cat.png", "image/png", png());
        let outcome = service.upload_files(&[&blob]).await;
        let id = outcome.stored[0].clone();

        service.select(Some(id.clone())).await.unwrap();
        assert_eq!(service.view().await.selected_record().map(|r| &r.id), Some(&id));
        assert!(service.can_delete(&id).await);

        let deleted = service.delete(&id).await;

        assert_eq!(deleted, DeleteOutcome::Deleted { remote_synced: false });
        let view = service.view().await;
        assert!(view.records.is_empty());
        assert!(view.selection.is_none());
    }

    #[tokio::test]
    async fn test_select_unknown_record_fails() {
        let (service, _) = service_with(offline_remote()).await;

        let err = service
            .select(Some(MediaId::from("media-0-missing")))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Gallery(_)));
    }

    #[tokio::test]
    async fn test_toggle_on_image_is_noop() {
        let (service, _) = service_with(offline_remote()).await;
        let blob = MemoryBlob::new("cat.png", "image/png", png());
        let id = service.upload_files(&[&blob]).await.stored[0].clone();

        assert_eq!(service.toggle_play(&id).await.unwrap(), None);
        assert_eq!(service.toggle_mute(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let (service, _) = service_with(offline_remote()).await;
        let mut events = service.subscribe_events();

        service.reload().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, CoreEvent::Connection(_)));
    }

    #[tokio::test]
    async fn test_accepts_only_images_and_videos() {
        let (service, _) = service_with(offline_remote()).await;

        assert!(service.accepts(&MemoryBlob::new("a.mp4", "video/mp4", vec![])));
        assert!(!service.accepts(&MemoryBlob::new("a.pdf", "application/pdf", vec![])));
    }
}
