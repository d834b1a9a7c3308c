//! Self-contained `data:<mime>;base64,<payload>` strings.
//!
//! Stored records carry their content inline, so a [`DataUri`] is both the
//! storage format and what the rendering layer feeds to `<img>`/`<video>`.
//! The string is shared behind an `Arc`, which keeps cloning whole gallery
//! snapshots cheap.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::error::{MediaError, Result};

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataUri(Arc<str>);

impl DataUri {
    /// Encode raw bytes under the given MIME type.
    pub fn encode(mime_type: &str, data: &[u8]) -> Self {
        let payload = STANDARD.encode(data);
        let mut uri =
            String::with_capacity(SCHEME.len() + mime_type.len() + BASE64_MARKER.len() + payload.len());
        uri.push_str(SCHEME);
        uri.push_str(mime_type);
        uri.push_str(BASE64_MARKER);
        uri.push_str(&payload);
        Self(uri.into())
    }

    /// Accept an existing string after checking its shape.
    ///
    /// The payload itself is not decoded here; use [`DataUri::decode`] for that.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        Self::split(&value)?;
        Ok(Self(value.into()))
    }

    fn split(value: &str) -> Result<(&str, &str)> {
        let rest = value
            .strip_prefix(SCHEME)
            .ok_or_else(|| MediaError::InvalidDataUri("missing 'data:' scheme".to_string()))?;
        let (mime_type, payload) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(|| MediaError::InvalidDataUri("missing ';base64,' marker".to_string()))?;
        if mime_type.is_empty() {
            return Err(MediaError::InvalidDataUri("empty MIME type".to_string()));
        }
        Ok((mime_type, payload))
    }

    pub fn mime_type(&self) -> &str {
        Self::split(&self.0).map(|(mime, _)| mime).unwrap_or_default()
    }

    pub fn payload(&self) -> &str {
        Self::split(&self.0)
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    /// Decode the payload back to the original bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.payload())
            .map_err(|e| MediaError::InvalidDataUri(format!("bad base64 payload: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for DataUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Payloads are huge; Debug shows the header and size only.
impl fmt::Debug for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataUri({})", core_runtime::logging::summarize_data_uri(&self.0))
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        DataUri::parse(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_and_decode_bytes() {
        let bytes = [0u8, 1, 2, 254, 255];
        let uri = DataUri::encode("image/png", &bytes);

        assert!(uri.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(uri.mime_type(), "image/png");
        assert_eq!(uri.decode().unwrap(), bytes);
    }

    #[test]
    fn test_empty_content() {
        let uri = DataUri::encode("video/mp4", &[]);
        assert_eq!(uri.as_str(), "data:video/mp4;base64,");
        assert!(uri.decode().unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(DataUri::parse("image/png;base64,AAAA").is_err());
        assert!(DataUri::parse("data:image/png,AAAA").is_err());
        assert!(DataUri::parse("data:;base64,AAAA").is_err());
        assert!(DataUri::parse("data:image/gif;base64,R0lGOD").is_ok());
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        let uri = DataUri::parse("data:image/png;base64,@@@").unwrap();
        assert!(uri.decode().is_err());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let uri = DataUri::encode("image/jpeg", b"hi");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"data:image/jpeg;base64,aGk=\"");

        let back: DataUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);

        assert!(serde_json::from_str::<DataUri>("\"https://cdn/x.png\"").is_err());
    }

    #[test]
    fn test_debug_is_summarized() {
        let uri = DataUri::encode("image/png", &[0u8; 300]);
        let debug = format!("{:?}", uri);
        assert!(debug.starts_with("DataUri(data:image/png;base64,<"));
        assert!(debug.len() < 60);
    }
}
