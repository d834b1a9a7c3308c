//! # Gallery State
//!
//! Domain records and the in-memory gallery held by the application.
//!
//! - [`MediaRecord`] is the persisted shape shared by the remote table and
//!   the local cache snapshot.
//! - [`GalleryState`] is an immutable snapshot (records, selection, video
//!   playback descriptors); operations return a new snapshot.
//! - [`GalleryManager`] owns the live snapshot and handles UI intents.
//! - [`load_or_create_identity`] resolves the per-installation uploader id.

pub mod error;
pub mod manager;
pub mod models;
pub mod playback;
pub mod session;
pub mod state;

pub use error::{GalleryError, Result};
pub use manager::GalleryManager;
pub use models::{MediaId, MediaRecord, UploaderId, BASE_CELL_HEIGHT};
pub use playback::PlaybackDescriptor;
pub use session::load_or_create_identity;
pub use state::{GalleryCounts, GalleryState};
