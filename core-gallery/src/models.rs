//! Gallery domain models.
//!
//! [`MediaRecord`] is the single persisted shape: it is what the remote table
//! stores per row and what the local cache snapshot stores per element, with
//! identical snake_case keys in both places.

use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_media::{DataUri, EncodedMedia, MediaKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{GalleryError, Result};

/// Base cell height used by the masonry grid, in pixels.
pub const BASE_CELL_HEIGHT: f64 = 250.0;

const SUFFIX_LEN: usize = 9;

/// `<prefix>-<unix millis>-<9 random chars>`
fn generate_id(prefix: &str, clock: &dyn Clock) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        clock.unix_timestamp_millis(),
        &suffix[..SUFFIX_LEN]
    )
}

// =============================================================================
// ID Types
// =============================================================================

/// Identifier of a stored media record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate(clock: &dyn Clock) -> Self {
        Self(generate_id("media", clock))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Session identity of whoever created a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploaderId(String);

impl UploaderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate(clock: &dyn Clock) -> Self {
        Self(generate_id("user", clock))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UploaderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Media Record
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    pub file_name: String,
    /// MIME type; always `image/*` or `video/*`
    pub file_type: String,
    pub file_data: DataUri,
    pub uploader_id: UploaderId,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Height / width; `null` on the wire reads as the default ratio
    #[serde(deserialize_with = "aspect_ratio::deserialize")]
    pub aspect_ratio: f64,
}

impl MediaRecord {
    /// Build a fresh record from an encoded file, stamping id and creation time.
    pub fn from_encoded(encoded: EncodedMedia, uploader: UploaderId, clock: &dyn Clock) -> Self {
        Self {
            id: MediaId::generate(clock),
            file_name: encoded.file_name,
            file_type: encoded.mime_type,
            file_data: encoded.data_uri,
            uploader_id: uploader,
            created_at: clock.now(),
            aspect_ratio: encoded.aspect_ratio,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(GalleryError::InvalidRecord("Media id cannot be empty".to_string()));
        }

        if self.kind().is_none() {
            return Err(GalleryError::InvalidRecord(format!(
                "Unsupported file type '{}' for {}",
                self.file_type, self.id
            )));
        }

        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(GalleryError::InvalidRecord(format!(
                "Aspect ratio {} of {} must be positive",
                self.aspect_ratio, self.id
            )));
        }

        Ok(())
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.file_type)
    }

    pub fn is_video(&self) -> bool {
        self.kind() == Some(MediaKind::Video)
    }

    /// Only the uploader or the admin identity may delete a record.
    pub fn can_be_deleted_by(&self, caller: &UploaderId, admin_identity: &str) -> bool {
        caller == &self.uploader_id || caller.as_str() == admin_identity
    }

    /// Grid cell height for a given base height.
    pub fn cell_height(&self, base: f64) -> f64 {
        base * self.aspect_ratio
    }
}

/// Other clients write `NaN` ratios, which JSON carries as `null`.
mod aspect_ratio {
    use core_media::DEFAULT_ASPECT_RATIO;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_ASPECT_RATIO))
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::FixedClock;
    use chrono::TimeZone;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn record(file_type: &str, aspect_ratio: f64) -> MediaRecord {
        MediaRecord {
            id: MediaId::new("media-1714564800000-abcdefghi"),
            file_name: "beach.png".to_string(),
            file_type: file_type.to_string(),
            file_data: DataUri::encode(file_type, b"px"),
            uploader_id: UploaderId::new("user-1-aaaaaaaaa"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            aspect_ratio,
        }
    }

    #[test]
    fn test_generated_id_format() {
        let clock = clock();
        let id = MediaId::generate(&clock);
        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();

        assert_eq!(parts[0], "media");
        assert_eq!(parts[1], "1714564800000");
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));

        let user = UploaderId::generate(&clock);
        assert!(user.as_str().starts_with("user-1714564800000-"));
        assert_ne!(MediaId::generate(&clock), id);
    }

    #[test]
    fn test_wire_format_uses_snake_case_and_millis() {
        let json = serde_json::to_value(record("image/png", 0.5)).unwrap();

        assert_eq!(json["id"], "media-1714564800000-abcdefghi");
        assert_eq!(json["file_type"], "image/png");
        assert_eq!(json["uploader_id"], "user-1-aaaaaaaaa");
        assert_eq!(json["created_at"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["aspect_ratio"], 0.5);
        assert!(json["file_data"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_null_aspect_ratio_reads_as_default() {
        let mut json = serde_json::to_value(record("video/mp4", 0.5)).unwrap();
        json["aspect_ratio"] = serde_json::Value::Null;

        let parsed: MediaRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.aspect_ratio, 1.0);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_accepts_offset_timestamps() {
        let mut json = serde_json::to_value(record("image/png", 1.0)).unwrap();
        json["created_at"] = "2024-05-01T14:00:00.250+02:00".into();

        let parsed: MediaRecord = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_partial_record_is_rejected() {
        let mut json = serde_json::to_value(record("image/png", 1.0)).unwrap();
        json.as_object_mut().unwrap().remove("file_data");
        assert!(serde_json::from_value::<MediaRecord>(json).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(record("image/jpeg", 1.5).validate().is_ok());
        assert!(record("video/mp4", 0.56).validate().is_ok());
        assert!(record("audio/mpeg", 1.0).validate().is_err());
        assert!(record("image/png", 0.0).validate().is_err());
        assert!(record("image/png", f64::NAN).validate().is_err());
    }

    #[test]
    fn test_delete_authorization() {
        let rec = record("image/png", 1.0);

        assert!(rec.can_be_deleted_by(&UploaderId::new("user-1-aaaaaaaaa"), "admin"));
        assert!(rec.can_be_deleted_by(&UploaderId::new("admin"), "admin"));
        assert!(!rec.can_be_deleted_by(&UploaderId::new("user-2-bbbbbbbbb"), "admin"));
    }

    #[test]
    fn test_cell_height_and_kind() {
        let rec = record("video/webm", 0.5625);
        assert!(rec.is_video());
        assert!((rec.cell_height(BASE_CELL_HEIGHT) - 140.625).abs() < 1e-9);
        assert!(!record("image/gif", 1.0).is_video());
    }
}
