//! Remote Table Store Abstraction
//!
//! The backend is treated as an opaque table store reachable through four
//! operations: select, insert, delete and subscribe. Rows travel as JSON
//! objects so the store stays independent of the record schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// A single table row as a JSON object.
pub type Row = serde_json::Value;

/// Sort direction for [`SelectQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

/// Select query builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    /// Projected columns; empty means all columns.
    pub columns: Vec<String>,
    pub order_by: Option<OrderBy>,
}

impl SelectQuery {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            order_by: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            order,
        });
        self
    }

    /// Column projection in PostgREST form (`*` when unrestricted)
    pub fn projection(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        }
    }
}

/// Kind of row change reported by a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The store noticed a change but cannot tell which kind.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            kind,
        }
    }
}

/// Callback invoked for every change on a subscribed table.
pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Handle for an active change subscription.
///
/// The subscription ends when [`Subscription::unsubscribe`] is called or the
/// handle is dropped, whichever comes first.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel (stores without change feeds).
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Remote table store trait
///
/// Implemented by backend connectors (the Supabase/PostgREST connector on
/// desktop) and by in-memory fakes in tests.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::{RemoteStore, SelectQuery, SortOrder};
///
/// async fn newest_first(store: &dyn RemoteStore) -> Result<Vec<Row>> {
///     let query = SelectQuery::table("media_items").order_by("created_at", SortOrder::Descending);
///     store.select(&query).await
/// }
/// ```
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch rows matching the query
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>>;

    /// Insert rows as a single batch
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<()>;

    /// Delete the row whose `id` column equals `id`
    async fn delete(&self, table: &str, id: &str) -> Result<()>;

    /// Subscribe to changes on a table
    ///
    /// The callback may be invoked from any task and must not block.
    async fn subscribe(&self, table: &str, callback: ChangeCallback) -> Result<Subscription>;
}
