//! # Media Encoding
//!
//! Converts user-supplied file blobs into self-contained gallery payloads.
//!
//! ## Pipeline
//!
//! 1. Classify the declared MIME type ([`MediaKind`]); anything other than
//!    `image/*` or `video/*` is rejected before the content is read.
//! 2. Read the blob through the host's [`FileBlob`](bridge_traits::FileBlob).
//! 3. Encode the bytes as a [`DataUri`].
//! 4. Probe intrinsic dimensions from headers or container metadata and
//!    derive the aspect ratio (height / width), defaulting to `1.0`.
//!
//! ```ignore
//! use core_media::MediaEncoder;
//!
//! let encoded = MediaEncoder::new().encode(&blob).await?;
//! println!("{} -> ratio {}", encoded.file_name, encoded.aspect_ratio);
//! ```

pub mod data_uri;
pub mod encoder;
pub mod error;
pub mod kind;
pub mod probe;

pub use data_uri::DataUri;
pub use encoder::{EncodedMedia, MediaEncoder};
pub use error::{MediaError, Result};
pub use kind::MediaKind;
pub use probe::{aspect_ratio_or_default, Dimensions, DEFAULT_ASPECT_RATIO};
