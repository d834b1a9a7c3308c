//! Rendering Surface Abstraction
//!
//! The rendering layer owns the actual video elements. The core only issues
//! play/pause/mute commands and asks whether an element exists for a record.

use async_trait::async_trait;

use crate::error::Result;

/// Host-side media element registry.
///
/// Implementations map record ids to mounted video elements. A record that
/// has not been rendered (or was unmounted) reports `is_attached == false`
/// and the core skips the command.
#[async_trait]
pub trait MediaSurface: Send + Sync {
    /// Whether a video element is currently mounted for the record
    async fn is_attached(&self, media_id: &str) -> bool;

    async fn play(&self, media_id: &str) -> Result<()>;

    async fn pause(&self, media_id: &str) -> Result<()>;

    async fn set_muted(&self, media_id: &str, muted: bool) -> Result<()>;
}

/// Surface with no mounted elements; every toggle becomes a no-op.
#[derive(Debug, Default, Clone)]
pub struct DetachedSurface;

#[async_trait]
impl MediaSurface for DetachedSurface {
    async fn is_attached(&self, _media_id: &str) -> bool {
        false
    }

    async fn play(&self, _media_id: &str) -> Result<()> {
        Ok(())
    }

    async fn pause(&self, _media_id: &str) -> Result<()> {
        Ok(())
    }

    async fn set_muted(&self, _media_id: &str, _muted: bool) -> Result<()> {
        Ok(())
    }
}
