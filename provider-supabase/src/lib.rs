//! # Supabase Provider
//!
//! Implements [`RemoteStore`](bridge_traits::remote::RemoteStore) for a
//! Supabase project through its PostgREST endpoint.
//!
//! ## Overview
//!
//! - Select with column projection and ordering
//! - Batched inserts in a single request
//! - Deletes filtered by `id`
//! - Change subscriptions backed by a polling task
//! - Retry with exponential backoff on rate limits and server errors
//!
//! All HTTP traffic goes through the host-provided
//! [`HttpClient`](bridge_traits::http::HttpClient).

pub mod connector;
pub mod error;
mod poller;

pub use connector::SupabaseConnector;
pub use error::{Result, SupabaseError};
