//! Connection status shared between the controller and its observers.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// A load is in flight
    Connecting,
    /// The last load reached the remote store
    Connected,
    /// The last load failed; the gallery shows the local snapshot
    Offline,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Offline => "offline",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer status cell; readers subscribe through a `watch` receiver.
#[derive(Debug)]
pub(crate) struct StatusCell {
    tx: watch::Sender<ConnectionStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionStatus::Connecting);
        Self { tx }
    }

    pub fn current(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Store a new status, returning the previous one if it changed.
    pub fn set(&self, status: ConnectionStatus) -> Option<ConnectionStatus> {
        let previous = self.tx.send_replace(status);
        (previous != status).then_some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_connecting() {
        let cell = StatusCell::new();
        assert_eq!(cell.current(), ConnectionStatus::Connecting);
    }

    #[test]
    fn test_set_reports_changes_only() {
        let cell = StatusCell::new();
        assert_eq!(cell.set(ConnectionStatus::Offline), Some(ConnectionStatus::Connecting));
        assert_eq!(cell.set(ConnectionStatus::Offline), None);
        assert_eq!(cell.current(), ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn test_receivers_observe_updates() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionStatus::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Offline).unwrap(),
            "\"offline\""
        );
    }
}
