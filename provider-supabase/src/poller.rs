//! Polling change feed
//!
//! PostgREST has no push channel, so subscriptions are served by periodically
//! selecting a narrow projection of the table and comparing it with the
//! previous poll.

use bridge_traits::remote::{
    ChangeCallback, ChangeEvent, ChangeKind, RemoteStore, Row, SelectQuery, Subscription,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// `tokio::time::interval` rejects a zero period.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Columns fetched on every poll
const POLL_COLUMNS: [&str; 2] = ["id", "created_at"];

/// What a single poll saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableSnapshot {
    ids: BTreeSet<String>,
    fingerprint: [u8; 32],
}

impl TableSnapshot {
    pub(crate) fn from_rows(rows: &[Row]) -> Self {
        let mut lines: Vec<String> = rows.iter().map(|row| row.to_string()).collect();
        lines.sort();

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }

        Self {
            ids: rows
                .iter()
                .filter_map(|row| row.get("id").and_then(|id| id.as_str()))
                .map(str::to_owned)
                .collect(),
            fingerprint: hasher.finalize().into(),
        }
    }

    /// Classify the difference from `previous`, `None` when nothing changed
    pub(crate) fn change_since(&self, previous: &TableSnapshot) -> Option<ChangeKind> {
        if self == previous {
            return None;
        }

        let added = self.ids.difference(&previous.ids).next().is_some();
        let removed = previous.ids.difference(&self.ids).next().is_some();

        Some(match (added, removed) {
            (true, false) => ChangeKind::Insert,
            (false, true) => ChangeKind::Delete,
            (false, false) => ChangeKind::Update,
            (true, true) => ChangeKind::Unknown,
        })
    }
}

/// Background poller that turns table differences into change events
pub(crate) struct ChangePoller<S> {
    store: S,
    table: String,
    interval: Duration,
}

impl<S> ChangePoller<S>
where
    S: RemoteStore + 'static,
{
    pub(crate) fn new(store: S, table: &str, interval: Duration) -> Self {
        Self {
            store,
            table: table.to_string(),
            interval: interval.max(MIN_TICK),
        }
    }

    /// Start polling; the returned subscription stops the task.
    pub(crate) fn spawn(self, callback: ChangeCallback) -> Subscription {
        let token = CancellationToken::new();
        let task_token = token.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut baseline: Option<TableSnapshot> = None;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let current = match self.poll().await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        debug!(table = %self.table, error = %e, "Change poll failed");
                        continue;
                    }
                };

                if task_token.is_cancelled() {
                    break;
                }

                if let Some(previous) = &baseline {
                    if let Some(kind) = current.change_since(previous) {
                        debug!(table = %self.table, ?kind, "Table changed");
                        callback(ChangeEvent::new(self.table.clone(), kind));
                    } else {
                        trace!(table = %self.table, "No change");
                    }
                }
                baseline = Some(current);
            }

            debug!(table = %self.table, "Change poller stopped");
        });

        Subscription::new(move || token.cancel())
    }

    async fn poll(&self) -> bridge_traits::error::Result<TableSnapshot> {
        let query = SelectQuery::table(self.table.clone()).columns(POLL_COLUMNS);
        let rows = self.store.select(&query).await?;
        Ok(TableSnapshot::from_rows(&rows))
    }
}
