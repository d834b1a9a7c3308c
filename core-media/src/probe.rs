//! Intrinsic dimension probing.
//!
//! Images are probed through the `image` crate's header readers, so no pixel
//! data is decoded. Videos are probed by walking container metadata only:
//! the `tkhd` box for ISO-BMFF (MP4/MOV) and the `Video` element of a
//! Matroska/WebM `TrackEntry`.

use std::io::Cursor;

use image::ImageReader;
use tracing::debug;

use crate::error::{MediaError, Result};
use crate::kind::MediaKind;

/// Ratio used whenever probing fails.
pub const DEFAULT_ASPECT_RATIO: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Height divided by width, or `None` for degenerate sizes.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(f64::from(self.height) / f64::from(self.width))
    }
}

pub fn probe(kind: MediaKind, data: &[u8]) -> Result<Dimensions> {
    match kind {
        MediaKind::Image => probe_image(data),
        MediaKind::Video => probe_video(data),
    }
}

/// Probe, falling back to [`DEFAULT_ASPECT_RATIO`] on any failure.
pub fn aspect_ratio_or_default(kind: MediaKind, data: &[u8]) -> f64 {
    match probe(kind, data) {
        Ok(dims) => match dims.aspect_ratio() {
            Some(ratio) => ratio,
            None => {
                debug!(width = dims.width, height = dims.height, "Degenerate dimensions, using default ratio");
                DEFAULT_ASPECT_RATIO
            }
        },
        Err(e) => {
            debug!(kind = %kind, error = %e, "Dimension probe failed, using default ratio");
            DEFAULT_ASPECT_RATIO
        }
    }
}

pub fn probe_image(data: &[u8]) -> Result<Dimensions> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| MediaError::Probe(e.to_string()))?
        .into_dimensions()?;
    Ok(Dimensions::new(width, height))
}

pub fn probe_video(data: &[u8]) -> Result<Dimensions> {
    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        mp4::dimensions(data).ok_or_else(|| MediaError::Probe("no visual track in MP4".to_string()))
    } else if data.starts_with(&ebml::HEADER_MAGIC) {
        ebml::dimensions(data).ok_or_else(|| MediaError::Probe("no video track in WebM".to_string()))
    } else {
        Err(MediaError::Probe("unrecognized video container".to_string()))
    }
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    let bytes = data.get(at..at + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}

mod mp4 {
    use super::{be_u32, be_u64, Dimensions};

    struct BoxRef<'a> {
        kind: [u8; 4],
        body: &'a [u8],
    }

    /// Iterate the boxes laid out back to back in `data`.
    fn boxes(data: &[u8]) -> impl Iterator<Item = BoxRef<'_>> {
        let mut pos = 0usize;
        std::iter::from_fn(move || {
            let size = be_u32(data, pos)? as u64;
            let kind: [u8; 4] = data.get(pos + 4..pos + 8)?.try_into().ok()?;
            let (header, total) = match size {
                0 => (8usize, (data.len() - pos) as u64),
                1 => (16usize, be_u64(data, pos + 8)?),
                n => (8usize, n),
            };
            if total < header as u64 {
                return None;
            }
            let end = pos.checked_add(usize::try_from(total).ok()?)?.min(data.len());
            let body = data.get(pos + header..end)?;
            pos = end;
            Some(BoxRef { kind, body })
        })
    }

    fn child<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
        boxes(data).find(|b| &b.kind == kind).map(|b| b.body)
    }

    pub(super) fn dimensions(data: &[u8]) -> Option<Dimensions> {
        let moov = child(data, b"moov")?;
        boxes(moov)
            .filter(|b| &b.kind == b"trak")
            .filter_map(|trak| child(trak.body, b"tkhd"))
            .filter_map(track_header_dimensions)
            .find(|d| d.width > 0 && d.height > 0)
    }

    fn track_header_dimensions(tkhd: &[u8]) -> Option<Dimensions> {
        let version = *tkhd.first()?;
        let (matrix_at, size_at) = if version == 1 { (52, 88) } else { (40, 76) };

        // Sizes are 16.16 fixed point.
        let width = be_u32(tkhd, size_at)? >> 16;
        let height = be_u32(tkhd, size_at + 4)? >> 16;

        let a = be_u32(tkhd, matrix_at)?;
        let b = be_u32(tkhd, matrix_at + 4)?;
        if a == 0 && b != 0 {
            // Quarter-turn rotation: the display size is transposed.
            return Some(Dimensions::new(height, width));
        }
        Some(Dimensions::new(width, height))
    }
}

mod ebml {
    use super::Dimensions;

    pub(super) const HEADER_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

    const SEGMENT: u32 = 0x1853_8067;
    const TRACKS: u32 = 0x1654_AE6B;
    const TRACK_ENTRY: u32 = 0xAE;
    const VIDEO: u32 = 0xE0;
    const PIXEL_WIDTH: u32 = 0xB0;
    const PIXEL_HEIGHT: u32 = 0xBA;
    const DISPLAY_WIDTH: u32 = 0x54B0;
    const DISPLAY_HEIGHT: u32 = 0x54BA;
    const CLUSTER: u32 = 0x1F43_B675;

    struct Element<'a> {
        id: u32,
        body: &'a [u8],
        unknown_size: bool,
    }

    fn read_id(data: &[u8], pos: usize) -> Option<(u32, usize)> {
        let first = *data.get(pos)?;
        let len = first.leading_zeros() as usize + 1;
        if len > 4 {
            return None;
        }
        let bytes = data.get(pos..pos + len)?;
        let id = bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        Some((id, len))
    }

    /// Returns the size (None when "unknown") and the number of bytes read.
    fn read_size(data: &[u8], pos: usize) -> Option<(Option<u64>, usize)> {
        let first = *data.get(pos)?;
        let len = first.leading_zeros() as usize + 1;
        if len > 8 {
            return None;
        }
        let bytes = data.get(pos..pos + len)?;
        let mask = if len == 8 { 0 } else { 0xFFu8 >> len };
        let value = bytes[1..]
            .iter()
            .fold(u64::from(first & mask), |acc, b| (acc << 8) | u64::from(*b));
        let all_ones = (1u64 << (7 * len)) - 1;
        Some((if value == all_ones { None } else { Some(value) }, len))
    }

    fn elements(data: &[u8]) -> impl Iterator<Item = Element<'_>> {
        let mut pos = 0usize;
        std::iter::from_fn(move || {
            let (id, id_len) = read_id(data, pos)?;
            let (size, size_len) = read_size(data, pos + id_len)?;
            let start = pos + id_len + size_len;
            let end = match size {
                Some(size) => start
                    .checked_add(usize::try_from(size).ok()?)?
                    .min(data.len()),
                None => data.len(),
            };
            let body = data.get(start..end)?;
            pos = end;
            Some(Element {
                id,
                body,
                unknown_size: size.is_none(),
            })
        })
    }

    fn read_uint(body: &[u8]) -> Option<u32> {
        if body.is_empty() || body.len() > 8 {
            return None;
        }
        let value = body.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        u32::try_from(value).ok()
    }

    pub(super) fn dimensions(data: &[u8]) -> Option<Dimensions> {
        let segment = elements(data).find(|e| e.id == SEGMENT)?;

        for element in elements(segment.body) {
            match element.id {
                TRACKS => return tracks_dimensions(element.body),
                CLUSTER => return None,
                // An unknown-size child swallows the rest of the segment.
                _ if element.unknown_size => return None,
                _ => {}
            }
        }
        None
    }

    fn tracks_dimensions(tracks: &[u8]) -> Option<Dimensions> {
        elements(tracks)
            .filter(|e| e.id == TRACK_ENTRY)
            .filter_map(|entry| elements(entry.body).find(|e| e.id == VIDEO))
            .filter_map(|video| video_dimensions(video.body))
            .find(|d| d.width > 0 && d.height > 0)
    }

    fn video_dimensions(video: &[u8]) -> Option<Dimensions> {
        let (mut pixel_w, mut pixel_h, mut display_w, mut display_h) = (None, None, None, None);
        for element in elements(video) {
            match element.id {
                PIXEL_WIDTH => pixel_w = read_uint(element.body),
                PIXEL_HEIGHT => pixel_h = read_uint(element.body),
                DISPLAY_WIDTH => display_w = read_uint(element.body),
                DISPLAY_HEIGHT => display_h = read_uint(element.body),
                _ => {}
            }
        }
        match (display_w, display_h) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Dimensions::new(w, h)),
            _ => Some(Dimensions::new(pixel_w?, pixel_h?)),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal containers carrying only the metadata the probe reads.

    fn mp4_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(body.len() + 8);
        out.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    fn tkhd_v0(width: u32, height: u32, rotated: bool) -> Vec<u8> {
        let mut body = vec![0u8; 84];
        let (a, b): (u32, u32) = if rotated {
            (0, 0x0001_0000)
        } else {
            (0x0001_0000, 0)
        };
        body[40..44].copy_from_slice(&a.to_be_bytes());
        body[44..48].copy_from_slice(&b.to_be_bytes());
        body[76..80].copy_from_slice(&(width << 16).to_be_bytes());
        body[80..84].copy_from_slice(&(height << 16).to_be_bytes());
        mp4_box(b"tkhd", &body)
    }

    fn tkhd_v1(width: u32, height: u32) -> Vec<u8> {
        let mut body = vec![0u8; 96];
        body[0] = 1;
        body[52..56].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        body[88..92].copy_from_slice(&(width << 16).to_be_bytes());
        body[92..96].copy_from_slice(&(height << 16).to_be_bytes());
        mp4_box(b"tkhd", &body)
    }

    /// An MP4 with an audio-like track (zero size) followed by a video track.
    pub fn mp4(width: u32, height: u32, rotated: bool) -> Vec<u8> {
        let audio = mp4_box(b"trak", &tkhd_v0(0, 0, false));
        let video = mp4_box(b"trak", &tkhd_v0(width, height, rotated));
        let mut moov_body = mp4_box(b"mvhd", &[0u8; 100]);
        moov_body.extend(audio);
        moov_body.extend(video);

        let mut file = mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2mp41");
        file.extend(mp4_box(b"mdat", &[0u8; 32]));
        file.extend(mp4_box(b"moov", &moov_body));
        file
    }

    pub fn mp4_v1(width: u32, height: u32) -> Vec<u8> {
        let trak = mp4_box(b"trak", &tkhd_v1(width, height));
        let mut file = mp4_box(b"ftyp", b"isom\0\0\x02\0");
        file.extend(mp4_box(b"moov", &trak));
        file
    }

    fn ebml_element(id: &[u8], body: &[u8]) -> Vec<u8> {
        assert!(body.len() < 0x7F);
        let mut out = id.to_vec();
        out.push(0x80 | body.len() as u8);
        out.extend_from_slice(body);
        out
    }

    fn ebml_uint(id: &[u8], value: u16) -> Vec<u8> {
        ebml_element(id, &value.to_be_bytes())
    }

    /// A WebM whose Segment has unknown size, as live muxers emit.
    pub fn webm(width: u16, height: u16, display: Option<(u16, u16)>) -> Vec<u8> {
        let mut video = ebml_uint(&[0xB0], width);
        video.extend(ebml_uint(&[0xBA], height));
        if let Some((dw, dh)) = display {
            video.extend(ebml_uint(&[0x54, 0xB0], dw));
            video.extend(ebml_uint(&[0x54, 0xBA], dh));
        }

        let mut entry = ebml_element(&[0xD7], &[1]);
        entry.extend(ebml_element(&[0xE0], &video));
        let tracks = ebml_element(&[0x16, 0x54, 0xAE, 0x6B], &ebml_element(&[0xAE], &entry));

        let mut segment_body = ebml_element(&[0x15, 0x49, 0xA9, 0x66], &[0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40]);
        segment_body.extend(tracks);
        segment_body.extend(ebml_element(&[0x1F, 0x43, 0xB6, 0x75], &[0xE7, 0x81, 0x00]));

        let mut file = ebml_element(&[0x1A, 0x45, 0xDF, 0xA3], &ebml_element(&[0x42, 0x82], b"webm"));
        file.extend_from_slice(&[0x18, 0x53, 0x80, 0x67]);
        file.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        file.extend(segment_body);
        file
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn test_image_ratio_is_height_over_width() {
        let png = fixtures::png(200, 100);
        let dims = probe_image(&png).unwrap();
        assert_eq!(dims, Dimensions::new(200, 100));
        assert!((dims.aspect_ratio().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_portrait_image() {
        let png = fixtures::png(30, 90);
        let ratio = aspect_ratio_or_default(MediaKind::Image, &png);
        assert!((ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_undecodable_image_defaults_to_one() {
        assert!(probe_image(b"not an image at all").is_err());
        assert_eq!(aspect_ratio_or_default(MediaKind::Image, b"not an image"), 1.0);
        assert_eq!(aspect_ratio_or_default(MediaKind::Image, &[]), 1.0);
    }

    #[test]
    fn test_mp4_skips_trackless_dimensions() {
        let data = fixtures::mp4(1920, 1080, false);
        assert_eq!(probe_video(&data).unwrap(), Dimensions::new(1920, 1080));
    }

    #[test]
    fn test_mp4_rotation_swaps_dimensions() {
        let data = fixtures::mp4(1920, 1080, true);
        let ratio = aspect_ratio_or_default(MediaKind::Video, &data);
        assert!((ratio - 1920.0 / 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_mp4_version_one_header() {
        let data = fixtures::mp4_v1(640, 480);
        assert_eq!(probe_video(&data).unwrap(), Dimensions::new(640, 480));
    }

    #[test]
    fn test_webm_pixel_size() {
        let data = fixtures::webm(1280, 720, None);
        assert_eq!(probe_video(&data).unwrap(), Dimensions::new(1280, 720));
    }

    #[test]
    fn test_webm_prefers_display_size() {
        let data = fixtures::webm(720, 576, Some((1024, 576)));
        assert_eq!(probe_video(&data).unwrap(), Dimensions::new(1024, 576));
    }

    #[test]
    fn test_unknown_or_truncated_video_defaults_to_one() {
        assert!(probe_video(b"RIFF....AVI ").is_err());
        assert_eq!(aspect_ratio_or_default(MediaKind::Video, b"garbage"), 1.0);

        let mut truncated = fixtures::mp4(1920, 1080, false);
        truncated.truncate(60);
        assert_eq!(aspect_ratio_or_default(MediaKind::Video, &truncated), 1.0);
    }

    #[test]
    fn test_degenerate_dimensions() {
        assert_eq!(Dimensions::new(0, 10).aspect_ratio(), None);
        assert_eq!(Dimensions::new(10, 0).aspect_ratio(), None);
    }
}
