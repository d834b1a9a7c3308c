//! # Event Bus System
//!
//! Typed notifications from the gallery core to whoever renders it, carried
//! over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐   subscribe   ┌──────────────┐
//! │ Sync controller  ├──────────>│           ├──────────────>│ Grid view    │
//! └──────────────────┘           │ EventBus  │               └──────────────┘
//! ┌──────────────────┐   emit    │           │   subscribe   ┌──────────────┐
//! │ Gallery manager  ├──────────>│           ├──────────────>│ Viewer modal │
//! └──────────────────┘           └───────────┘               └──────────────┘
//! ```
//!
//! ## Event Types
//!
//! ### Connection Events
//! - `StatusChanged`: the controller moved between connecting/connected/offline
//! - `LoadFailed`: a remote fetch failed and the cache was consulted
//!
//! ### Gallery Events
//! - `CollectionReplaced`: a load replaced the whole collection
//! - `ItemsAppended`: a local-fallback upload appended records
//! - `ItemDeleted` / `DeleteDenied`: outcome of a delete request
//! - `SelectionChanged`, `PlaybackChanged`: viewer state
//!
//! ### Upload Events
//! - `Started`, `FileSkipped`, `RemoteRejected`, `Completed`
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber should re-read the gallery snapshot.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Connection(ConnectionEvent::StatusChanged {
//!         previous: "connecting".to_string(),
//!         current: "offline".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Connection status changed");
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Connection state of the sync controller
    Connection(ConnectionEvent),
    /// Collection, selection and playback changes
    Gallery(GalleryEvent),
    /// Upload batch progress
    Upload(UploadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Connection(e) => e.description(),
            CoreEvent::Gallery(e) => e.description(),
            CoreEvent::Upload(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Connection(ConnectionEvent::LoadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Upload(UploadEvent::RemoteRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Gallery(GalleryEvent::DeleteDenied { .. }) => EventSeverity::Warning,
            CoreEvent::Connection(ConnectionEvent::StatusChanged { .. }) => EventSeverity::Info,
            CoreEvent::Upload(UploadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Gallery(GalleryEvent::ItemDeleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Connection Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectionEvent {
    /// The controller changed state (`connecting`, `connected`, `offline`).
    StatusChanged { previous: String, current: String },
    /// A remote fetch failed.
    LoadFailed {
        message: String,
        /// Whether a cache snapshot replaced the collection.
        used_cache: bool,
    },
}

impl ConnectionEvent {
    fn description(&self) -> &str {
        match self {
            ConnectionEvent::StatusChanged { .. } => "Connection status changed",
            ConnectionEvent::LoadFailed { .. } => "Remote load failed",
        }
    }
}

// ============================================================================
// Gallery Events
// ============================================================================

/// Where a replacement collection came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionSource {
    Remote,
    Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum GalleryEvent {
    CollectionReplaced {
        count: usize,
        source: CollectionSource,
    },
    ItemsAppended {
        media_ids: Vec<String>,
    },
    ItemDeleted {
        media_id: String,
        /// Whether the remote delete was attempted and succeeded.
        remote_synced: bool,
    },
    DeleteDenied {
        media_id: String,
        caller: String,
    },
    SelectionChanged {
        media_id: Option<String>,
    },
    PlaybackChanged {
        media_id: String,
        playing: bool,
        muted: bool,
    },
}

impl GalleryEvent {
    fn description(&self) -> &str {
        match self {
            GalleryEvent::CollectionReplaced { .. } => "Gallery collection replaced",
            GalleryEvent::ItemsAppended { .. } => "Items appended to gallery",
            GalleryEvent::ItemDeleted { .. } => "Item deleted",
            GalleryEvent::DeleteDenied { .. } => "Delete not permitted",
            GalleryEvent::SelectionChanged { .. } => "Selection changed",
            GalleryEvent::PlaybackChanged { .. } => "Playback state changed",
        }
    }
}

// ============================================================================
// Upload Events
// ============================================================================

/// Where an upload batch ended up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadDestination {
    Remote,
    Local,
    /// Nothing was written (no valid files).
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    Started {
        file_count: usize,
    },
    FileSkipped {
        file_name: String,
        reason: String,
    },
    /// The remote insert failed; the batch is kept locally instead.
    RemoteRejected {
        message: String,
    },
    Completed {
        stored: usize,
        skipped: usize,
        destination: UploadDestination,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Started { .. } => "Upload started",
            UploadEvent::FileSkipped { .. } => "File skipped",
            UploadEvent::RemoteRejected { .. } => "Remote insert rejected",
            UploadEvent::Completed { .. } => "Upload completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, GalleryEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut grid = event_bus.subscribe();
/// let mut viewer = event_bus.subscribe();
///
/// event_bus
///     .emit(CoreEvent::Gallery(GalleryEvent::SelectionChanged {
///         media_id: Some("media-1700000000000-abc123def".to_string()),
///     }))
///     .ok();
/// assert!(grid.try_recv().is_ok());
/// assert!(viewer.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if nobody is listening. Core modules ignore that error with
    /// `.ok()`: a gallery without a rendering layer attached is still valid.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let connection_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Connection(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// This will skip events that don't match the filter and return the next matching event.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(Ok(event)),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
