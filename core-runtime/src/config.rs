//! # Core Configuration Module
//!
//! Provides configuration management for the media gallery core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings. It enforces
//! fail-fast validation so a misconfigured gallery never starts.
//!
//! ## Required Dependencies
//!
//! - `KeyValueStore` - Required for the cache snapshot and the session identity
//!
//! ## Optional Dependencies
//!
//! - `RemoteStore` - Remote table store. When absent, the service builds the
//!   REST connector from [`RemoteConfig`] and the `HttpClient`.
//! - `HttpClient` - HTTP operations for the REST connector (desktop default: reqwest)
//! - `MediaSurface` - Rendering surface for play/pause/mute commands
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, an SQLite-backed
//! `KeyValueStore` is injected automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, RemoteConfig};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .remote(RemoteConfig::from_env()?)
//!     .remote_timeout(Duration::from_secs(15))
//!     .key_value_store(Arc::new(MyKeyValueStore))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Without the `desktop-shims` feature there is no default key-value store:
//!
//! ```ignore
//! let err = CoreConfig::builder().build().unwrap_err();
//! assert!(matches!(err, core_runtime::Error::CapabilityMissing { .. }));
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, KeyValueStore, MediaSurface, RemoteStore, SystemClock};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Remote table that holds media rows.
pub const DEFAULT_TABLE: &str = "media_items";
/// Key under which the session identity is persisted.
pub const DEFAULT_USER_ID_KEY: &str = "nutcracker-user-id";
/// Key under which the full collection snapshot is persisted.
pub const DEFAULT_BACKUP_KEY: &str = "nutcracker-media-backup";
/// Identity allowed to delete any record.
pub const DEFAULT_ADMIN_IDENTITY: &str = "admin";

pub const PLACEHOLDER_REMOTE_URL: &str = "https://your-project.supabase.co";
pub const PLACEHOLDER_ANON_KEY: &str = "your-anon-key";

pub const ENV_REMOTE_URL: &str = "GALLERY_REMOTE_URL";
pub const ENV_REMOTE_ANON_KEY: &str = "GALLERY_REMOTE_ANON_KEY";
pub const ENV_REMOTE_TABLE: &str = "GALLERY_REMOTE_TABLE";
pub const ENV_REMOTE_TIMEOUT_MS: &str = "GALLERY_REMOTE_TIMEOUT_MS";

/// Default interval between change-feed polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest accepted subscription poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);
/// Shortest reconnect delay used when a policy is clamped.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);

// ============================================================================
// Remote endpoint
// ============================================================================

/// Where the remote table store lives.
///
/// The anon key is a publishable client key, but it is still kept out of
/// `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project base URL (e.g. `https://abc.supabase.co`)
    pub url: String,
    /// Anonymous client key sent as `apikey` and bearer token
    pub anon_key: String,
    /// Table holding media rows
    pub table: String,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Placeholder endpoint used when nothing is configured.
    ///
    /// Requests against it fail, which sends the gallery straight into
    /// offline mode with the local cache.
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_REMOTE_URL, PLACEHOLDER_ANON_KEY)
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Read the endpoint from `GALLERY_REMOTE_URL`, `GALLERY_REMOTE_ANON_KEY`
    /// and `GALLERY_REMOTE_TABLE`, falling back to placeholders.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            url: non_empty(ENV_REMOTE_URL).unwrap_or_else(|| PLACEHOLDER_REMOTE_URL.to_string()),
            anon_key: non_empty(ENV_REMOTE_ANON_KEY)
                .unwrap_or_else(|| PLACEHOLDER_ANON_KEY.to_string()),
            table: non_empty(ENV_REMOTE_TABLE).unwrap_or_else(|| DEFAULT_TABLE.to_string()),
        };

        config.validate().map_err(|e| Error::Environment {
            key: ENV_REMOTE_URL.to_string(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    pub fn is_placeholder(&self) -> bool {
        self.url == PLACEHOLDER_REMOTE_URL || self.anon_key == PLACEHOLDER_ANON_KEY
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Remote URL must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(Error::Config("Remote anon key cannot be empty".to_string()));
        }
        if self.table.trim().is_empty() {
            return Err(Error::Config("Remote table cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .finish()
    }
}

/// Read `GALLERY_REMOTE_TIMEOUT_MS` if set.
pub fn remote_timeout_from_env() -> Result<Option<Duration>> {
    parse_timeout(std::env::var(ENV_REMOTE_TIMEOUT_MS).ok())
}

fn parse_timeout(raw: Option<String>) -> Result<Option<Duration>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| Error::Environment {
                key: ENV_REMOTE_TIMEOUT_MS.to_string(),
                message: e.to_string(),
            }),
    }
}

// ============================================================================
// Local storage keys
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub user_id: String,
    pub backup: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID_KEY.to_string(),
            backup: DEFAULT_BACKUP_KEY.to_string(),
        }
    }
}

// ============================================================================
// Sync behaviour
// ============================================================================

/// Exponential backoff for automatic reconnection after a failed load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Bring every field into its accepted range instead of rejecting it.
    pub fn clamped(self) -> Self {
        let initial_delay = self.initial_delay.max(MIN_RECONNECT_DELAY);
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        Self {
            initial_delay,
            max_delay: self.max_delay.max(initial_delay),
            multiplier,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(Error::Config(
                "Reconnect initial delay must be greater than 0".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::Config(
                "Reconnect max delay must not be shorter than the initial delay".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(
                "Reconnect multiplier must be a finite value >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Upper bound on each remote call. `None` waits indefinitely.
    pub remote_timeout: Option<Duration>,
    /// Automatic reconnection while offline. `None` stays offline until the
    /// next change notification or restart.
    pub reconnect: Option<ReconnectConfig>,
    /// Interval for polling change feeds
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            remote_timeout: None,
            reconnect: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.remote_timeout {
            if timeout.is_zero() {
                return Err(Error::Config(
                    "Remote timeout must be greater than 0 when set".to_string(),
                ));
            }
        }
        if let Some(reconnect) = &self.reconnect {
            reconnect.validate()?;
        }
        if self.poll_interval < MIN_POLL_INTERVAL || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(Error::Config(format!(
                "Poll interval must be between {}ms and {}s",
                MIN_POLL_INTERVAL.as_millis(),
                MAX_POLL_INTERVAL.as_secs()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Core configuration
// ============================================================================

/// Core configuration for the media gallery.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub remote: RemoteConfig,
    pub storage_keys: StorageKeys,
    pub admin_identity: String,
    pub sync: SyncSettings,
    pub event_buffer_size: usize,

    /// Local string storage (required)
    pub key_value_store: Arc<dyn KeyValueStore>,
    pub remote_store: Option<Arc<dyn RemoteStore>>,
    pub http_client: Option<Arc<dyn HttpClient>>,
    pub media_surface: Option<Arc<dyn MediaSurface>>,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("remote", &self.remote)
            .field("storage_keys", &self.storage_keys)
            .field("admin_identity", &self.admin_identity)
            .field("sync", &self.sync)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("key_value_store", &"KeyValueStore { ... }")
            .field(
                "remote_store",
                &self.remote_store.as_ref().map(|_| "RemoteStore { ... }"),
            )
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "media_surface",
                &self.media_surface.as_ref().map(|_| "MediaSurface { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;

        if self.storage_keys.user_id.is_empty() || self.storage_keys.backup.is_empty() {
            return Err(Error::Config("Storage keys cannot be empty".to_string()));
        }
        if self.storage_keys.user_id == self.storage_keys.backup {
            return Err(Error::Config(
                "Session identity and cache snapshot must use different storage keys"
                    .to_string(),
            ));
        }

        if self.admin_identity.trim().is_empty() {
            return Err(Error::Config("Admin identity cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.sync.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn key_value_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "KeyValueStore".to_string(),
        message: "KeyValueStore implementation is required for the gallery cache and session identity. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteKeyValueStore. \
                 Web: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_key_value_store(path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::SqliteKeyValueStore;

    let path = path.unwrap_or_else(SqliteKeyValueStore::default_path);
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::lazy(path));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_key_value_store(_path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    Err(key_value_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    remote: Option<RemoteConfig>,
    storage_keys: Option<StorageKeys>,
    admin_identity: Option<String>,
    sync: SyncSettings,
    event_buffer_size: Option<usize>,
    key_value_store: Option<Arc<dyn KeyValueStore>>,
    key_value_path: Option<PathBuf>,
    remote_store: Option<Arc<dyn RemoteStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    media_surface: Option<Arc<dyn MediaSurface>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the remote endpoint.
    ///
    /// Default: [`RemoteConfig::placeholder`], which always fails and keeps
    /// the gallery in offline mode.
    pub fn remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn storage_keys(mut self, keys: StorageKeys) -> Self {
        self.storage_keys = Some(keys);
        self
    }

    /// Sets the identity allowed to delete any record.
    ///
    /// Default: `"admin"`
    pub fn admin_identity(mut self, identity: impl Into<String>) -> Self {
        self.admin_identity = Some(identity.into());
        self
    }

    /// Bounds every remote call. Default: no timeout.
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.sync.remote_timeout = Some(timeout);
        self
    }

    /// Enables automatic reconnection while offline. Default: disabled.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.sync.reconnect = Some(reconnect);
        self
    }

    /// Default: 5 seconds
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.sync.poll_interval = interval;
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = settings;
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`](crate::events::DEFAULT_EVENT_BUFFER_SIZE)
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the key-value store implementation (required unless the
    /// `desktop-shims` default is available).
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    /// Database location for the desktop default key-value store.
    pub fn key_value_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.key_value_path = Some(path.into());
        self
    }

    /// Injects a remote store directly, bypassing the REST connector.
    pub fn remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = Some(store);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn media_surface(mut self, surface: Arc<dyn MediaSurface>) -> Self {
        self.media_surface = Some(surface);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the key-value store is missing (and no desktop
    /// default exists) or any setting fails validation.
    pub fn build(self) -> Result<CoreConfig> {
        let key_value_store = match self.key_value_store {
            Some(store) => store,
            None => provide_default_key_value_store(self.key_value_path)?,
        };

        let config = CoreConfig {
            remote: self.remote.unwrap_or_default(),
            storage_keys: self.storage_keys.unwrap_or_default(),
            admin_identity: self
                .admin_identity
                .unwrap_or_else(|| DEFAULT_ADMIN_IDENTITY.to_string()),
            sync: self.sync,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            key_value_store,
            remote_store: self.remote_store,
            http_client: self.http_client,
            media_surface: self.media_surface,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
