//! The durable sync queue item.

use crate::config::DEFAULT_MAX_RETRIES;
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueItemStatus {
    /// Waiting to be dispatched (or re-dispatched after a failed attempt).
    Pending,
    /// Handed to the background executor; a result is outstanding.
    InFlight,
    /// Exhausted all retries; retained for manual inspection and retry.
    Failed,
    /// Confirmed by the server. Completed items are removed from the queue,
    /// so this status is transient and never persisted.
    Completed,
}

impl QueueItemStatus {
    /// Returns true if `next` is a legal successor of this status.
    ///
    /// The only legal moves are pending → in-flight and
    /// in-flight → {completed | pending (retry) | failed}. A manual retry
    /// additionally moves failed → pending.
    pub fn can_transition_to(&self, next: QueueItemStatus) -> bool {
        use QueueItemStatus::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (InFlight, Completed)
                | (InFlight, Pending)
                | (InFlight, Failed)
                | (Failed, Pending)
        )
    }
}

/// A durably persisted record of one pending mutation awaiting remote
/// confirmation.
///
/// Items are created by `enqueue`, persisted before the caller proceeds,
/// and destroyed on success or retained indefinitely in `Failed` status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Unique id, generated at enqueue time.
    pub id: Uuid,
    /// The mutation to replay against the server.
    pub operation: Operation,
    /// Name of the target collection (e.g. `parking_sessions`).
    pub entity_type: String,
    /// Opaque entity data.
    pub payload: Value,
    /// Creation time, UTC milliseconds.
    pub timestamp: i64,
    /// Current lifecycle status.
    pub status: QueueItemStatus,
    /// Number of failed dispatch attempts so far.
    pub retry_count: u32,
    /// Retry cap; once reached the item fails permanently.
    pub max_retries: u32,
    /// Monotonic enqueue counter, preserves submission order when
    /// millisecond timestamps collide.
    pub sequence: u64,
}

impl SyncQueueItem {
    /// Creates a new pending item with a fresh id.
    pub fn new(operation: Operation, entity_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            entity_type: entity_type.into(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: QueueItemStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            sequence: 0,
        }
    }

    /// Sets the enqueue sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets a non-default retry cap.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the entity id carried in the payload, if any.
    ///
    /// Update and delete dispatches address the remote entity by this id.
    pub fn entity_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }

    /// Returns true if one more failed attempt would exhaust the item.
    pub fn on_last_attempt(&self) -> bool {
        self.retry_count + 1 >= self.max_retries
    }
}
