//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `KeyValueStore` using an SQLite-backed table
//! - `FileBlob` over files on local disk, MIME type guessed from the extension
//! - `HttpClient` using `reqwest`
//!
//! The remote store connector lives in `provider-supabase` and runs on top of
//! the HTTP client provided here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalFileBlob, SqliteKeyValueStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let store = SqliteKeyValueStore::new(SqliteKeyValueStore::default_path()).await?;
//!     let photo = LocalFileBlob::open("beach.jpg").await?;
//!     // Hand both to the gallery service
//!     Ok(())
//! }
//! ```

mod file_blob;
mod http;
mod key_value;

pub use file_blob::LocalFileBlob;
pub use http::ReqwestHttpClient;
pub use key_value::SqliteKeyValueStore;
