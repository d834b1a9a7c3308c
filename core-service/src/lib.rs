//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (key-value store,
//! remote store or HTTP client, rendering surface, clock) into the gallery
//! core and exposes the intents of the rendering layer: upload, drag and
//! drop, select, delete, play/pause and mute.
//!
//! Desktop apps typically enable the `desktop-shims` feature (SQLite
//! key-value store and reqwest HTTP client from `bridge-desktop`) together
//! with `supabase`, which builds the REST connector when no remote store is
//! injected.

pub mod error;
pub mod service;
pub mod view;

pub use error::{CoreError, Result};
pub use service::GalleryService;
pub use view::GalleryView;
