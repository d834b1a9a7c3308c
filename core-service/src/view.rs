//! Read model handed to the rendering layer.

use core_gallery::{GalleryCounts, GalleryState, MediaId, MediaRecord, PlaybackDescriptor, UploaderId};
use core_sync::ConnectionStatus;
use serde::Serialize;
use std::collections::HashMap;

/// Everything the grid and the viewer need to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryView {
    /// Records in display order (newest first after a load)
    pub records: Vec<MediaRecord>,
    pub status: ConnectionStatus,
    pub selection: Option<MediaId>,
    /// Playback state for every video record
    pub playback: HashMap<MediaId, PlaybackDescriptor>,
    pub counts: GalleryCounts,
    pub uploading: bool,
    pub drag_over: bool,
    pub identity: UploaderId,
    #[serde(skip)]
    admin_identity: String,
}

impl GalleryView {
    pub(crate) fn new(
        state: GalleryState,
        status: ConnectionStatus,
        uploading: bool,
        drag_over: bool,
        identity: UploaderId,
        admin_identity: &str,
    ) -> Self {
        let selection = state.selection().cloned();
        let playback = state.playback_descriptors();
        let counts = state.counts();

        Self {
            records: state.into_records(),
            status,
            selection,
            playback,
            counts,
            uploading,
            drag_over,
            identity,
            admin_identity: admin_identity.to_string(),
        }
    }

    pub fn selected_record(&self) -> Option<&MediaRecord> {
        let id = self.selection.as_ref()?;
        self.records.iter().find(|r| &r.id == id)
    }

    /// Whether the delete affordance should be shown for `record`
    pub fn can_delete(&self, record: &MediaRecord) -> bool {
        record.can_be_deleted_by(&self.identity, &self.admin_identity)
    }

    pub fn playback(&self, id: &MediaId) -> PlaybackDescriptor {
        self.playback.get(id).copied().unwrap_or_default()
    }
}
