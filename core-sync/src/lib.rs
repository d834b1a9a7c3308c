//! # Gallery Synchronization
//!
//! Keeps the in-memory gallery, the remote table and the local snapshot
//! cache consistent.
//!
//! ## Components
//!
//! - [`SyncController`]: load / upload / delete paths and the change feed
//! - [`LocalCache`]: full-snapshot persistence in the host key-value store
//! - [`ConnectionStatus`]: `connecting`, `connected` or `offline`, observable
//!   through a `watch` receiver
//!
//! Controller operations never return errors: remote failures degrade to the
//! local cache and are reported through logs, events and outcome values.

pub mod cache;
pub mod controller;
pub mod error;
pub mod status;

pub use cache::LocalCache;
pub use controller::{DeleteOutcome, LoadOutcome, SyncConfig, SyncController, SyncHandle, UploadOutcome};
pub use error::{Result, SyncError};
pub use status::ConnectionStatus;
