//! # Host Bridge Traits
//!
//! Capabilities the gallery core needs from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and the environment it
//! runs in. Each trait represents a collaborator the core requires but does
//! not own: the remote table store, the local key-value store, the rendering
//! surface that holds video elements, and the files the user hands over.
//!
//! ## Traits
//!
//! ### Persistence
//! - [`RemoteStore`](remote::RemoteStore) - select/insert/delete/subscribe on a remote table
//! - [`KeyValueStore`](storage::KeyValueStore) - local string storage (cache snapshot, session identity)
//!
//! ### Ingestion & Rendering
//! - [`FileBlob`](storage::FileBlob) - user-supplied file (name, MIME type, content)
//! - [`MediaSurface`](media::MediaSurface) - play/pause/mute commands for mounted video elements
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`, `provider-supabase` | ✅ In Progress |
//! | Web      | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! use core_runtime::Error;
//!
//! let store = config.key_value_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "KeyValueStore".to_string(),
//!         message: "No key-value store provided. \
//!                  Desktop: enable the desktop-shims feature. \
//!                  Other hosts: inject a platform adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Remote
//! failures are reported as [`BridgeError::RemoteError`] so the sync layer can
//! tell them apart from local storage failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod error;
pub mod http;
pub mod media;
pub mod remote;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use media::{DetachedSurface, MediaSurface};
pub use remote::{
    ChangeCallback, ChangeEvent, ChangeKind, RemoteStore, Row, SelectQuery, SortOrder,
    Subscription,
};
pub use storage::{FileBlob, KeyValueStore, MemoryBlob};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
