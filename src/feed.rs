//! Change events pushed by the remote store.
//!
//! A [`ChangeFeed`] is the receiving end of a subscription: an ordered async
//! stream of [`ChangeEvent`]s, or transport errors, for the subscribed tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::model::Table;

pub const FEED_SCHEMA_VERSION: &str = "taskboard.change.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change. Inserts and updates carry `new`; deletes carry at
/// least the identifier in `old`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    #[serde(rename = "new", default, skip_serializing_if = "Option::is_none")]
    pub new_record: Option<serde_json::Value>,
    #[serde(rename = "old", default, skip_serializing_if = "Option::is_none")]
    pub old_record: Option<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn insert(table: Table, record: serde_json::Value) -> Self {
        Self::new(table, ChangeKind::Insert, Some(record), None)
    }

    pub fn update(table: Table, record: serde_json::Value, old: Option<serde_json::Value>) -> Self {
        Self::new(table, ChangeKind::Update, Some(record), old)
    }

    pub fn delete(table: Table, old: serde_json::Value) -> Self {
        Self::new(table, ChangeKind::Delete, None, Some(old))
    }

    fn new(
        table: Table,
        kind: ChangeKind,
        new_record: Option<serde_json::Value>,
        old_record: Option<serde_json::Value>,
    ) -> Self {
        Self {
            table,
            kind,
            new_record,
            old_record,
            timestamp: Utc::now(),
        }
    }
}

/// Producer half handed to store-side forwarders.
pub type FeedSender = mpsc::UnboundedSender<Result<ChangeEvent>>;

/// Ordered stream of change notifications for one subscription.
pub struct ChangeFeed {
    rx: mpsc::UnboundedReceiver<Result<ChangeEvent>>,
}

impl ChangeFeed {
    pub fn channel() -> (FeedSender, ChangeFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ChangeFeed { rx })
    }

    /// Wait for the next event. `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<Result<ChangeEvent>> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<Result<ChangeEvent>> {
        self.rx.try_recv().ok()
    }
}
