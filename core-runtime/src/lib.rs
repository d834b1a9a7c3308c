//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the media gallery core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other core crate depends on this one for its logging conventions,
//! its configuration types and the events it publishes to the rendering layer.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
