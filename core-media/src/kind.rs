use serde::{Deserialize, Serialize};
use std::fmt;

/// The two media families the gallery accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a MIME type by its top-level type.
    ///
    /// Returns `None` for anything that is not `image/*` or `video/*`.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let (top, sub) = mime_type.trim().split_once('/')?;
        if sub.is_empty() {
            return None;
        }
        if top.eq_ignore_ascii_case("image") {
            Some(MediaKind::Image)
        } else if top.eq_ignore_ascii_case("video") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime() {
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("image/svg+xml"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
        assert_eq!(MediaKind::from_mime("image/"), None);
        assert_eq!(MediaKind::from_mime("image"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }
}
