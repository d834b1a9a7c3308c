//! Immutable gallery snapshot.
//!
//! Every mutation produces a new [`GalleryState`]; the manager swaps the
//! current value under its lock. Record order is whatever the last load
//! returned (newest first), with local appends kept at the end.

use serde::Serialize;
use std::collections::HashMap;

use core_media::MediaKind;

use crate::models::{MediaId, MediaRecord};
use crate::playback::PlaybackDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GalleryCounts {
    pub total: usize,
    pub images: usize,
    pub videos: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryState {
    records: Vec<MediaRecord>,
    selection: Option<MediaId>,
    playback: HashMap<MediaId, PlaybackDescriptor>,
}

impl GalleryState {
    pub fn new(records: Vec<MediaRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MediaRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &MediaId) -> Option<&MediaRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.get(id).is_some()
    }

    pub fn selection(&self) -> Option<&MediaId> {
        self.selection.as_ref()
    }

    pub fn selected_record(&self) -> Option<&MediaRecord> {
        self.selection.as_ref().and_then(|id| self.get(id))
    }

    /// Playback state of a video; untouched videos report the default.
    pub fn playback(&self, id: &MediaId) -> PlaybackDescriptor {
        self.playback.get(id).copied().unwrap_or_default()
    }

    /// Descriptors for every video record, defaults included.
    pub fn playback_descriptors(&self) -> HashMap<MediaId, PlaybackDescriptor> {
        self.records
            .iter()
            .filter(|r| r.is_video())
            .map(|r| (r.id.clone(), self.playback(&r.id)))
            .collect()
    }

    pub fn counts(&self) -> GalleryCounts {
        let of_kind = |kind| self.records.iter().filter(|r| r.kind() == Some(kind)).count();
        GalleryCounts {
            total: self.records.len(),
            images: of_kind(MediaKind::Image),
            videos: of_kind(MediaKind::Video),
        }
    }

    /// Replace the whole collection, keeping selection and playback for
    /// records that survive.
    pub fn replaced(&self, records: Vec<MediaRecord>) -> Self {
        let mut next = Self {
            records,
            selection: None,
            playback: HashMap::new(),
        };
        next.selection = self.selection.clone().filter(|id| next.contains(id));
        next.playback = self
            .playback
            .iter()
            .filter(|(id, _)| next.contains(id))
            .map(|(id, desc)| (id.clone(), *desc))
            .collect();
        next
    }

    pub fn appended(&self, records: impl IntoIterator<Item = MediaRecord>) -> Self {
        let mut next = self.clone();
        next.records.extend(records);
        next
    }

    pub fn without(&self, id: &MediaId) -> Self {
        let mut next = self.clone();
        next.records.retain(|r| &r.id != id);
        if next.selection.as_ref() == Some(id) {
            next.selection = None;
        }
        next.playback.remove(id);
        next
    }

    /// Select a record; ids not in the collection clear the selection.
    pub fn with_selection(&self, id: Option<MediaId>) -> Self {
        let mut next = self.clone();
        next.selection = id.filter(|id| self.contains(id));
        next
    }

    pub fn with_playback(&self, id: &MediaId, descriptor: PlaybackDescriptor) -> Self {
        let mut next = self.clone();
        if next.contains(id) {
            next.playback.insert(id.clone(), descriptor);
        }
        next
    }
}
