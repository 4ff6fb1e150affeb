//! In-process change feed for real-time portal updates.
//!
//! Handlers publish a [`ChangeEvent`] after committing a write; the
//! `/realtime` endpoint subscribes and forwards events for the caller's own
//! user id. Publishing never blocks: when the channel is full the oldest
//! event is dropped and slow subscribers observe a lag.

use serde::Serialize;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{debug, trace};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Which table a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Notification,
    Appointment,
    Ticket,
    Payment,
    Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub action: ChangeAction,
    pub record_id: String,
    /// Owner of the changed row; events are delivered only to this user.
    #[serde(skip)]
    pub user_id: String,
    /// Snapshot of the row after the change, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, action: ChangeAction, user_id: &str, record_id: &str) -> Self {
        Self {
            kind,
            action,
            record_id: record_id.to_string(),
            user_id: user_id.to_string(),
            record: None,
        }
    }

    /// Attach a serialized snapshot. Serialization failures leave the event without one.
    pub fn with_record<T: Serialize>(mut self, record: &T) -> Self {
        self.record = serde_json::to_value(record).ok();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let rx = self.sender.subscribe();
        debug!(subscribers = self.subscriber_count(), "Realtime subscriber added");
        rx
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        trace!(kind = ?event.kind, action = ?event.action, record_id = %event.record_id, "Publishing change");
        // No subscribers is the normal idle state.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
