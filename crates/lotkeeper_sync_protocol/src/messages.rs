//! Messages exchanged between the queue manager and the executor.
//!
//! The two sides share no mutable state; the whole protocol is one
//! [`StartSync`] request followed by exactly one [`SyncOutcome`] per item.

use crate::config::SyncConfig;
use crate::item::SyncQueueItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request to the background executor: dispatch this batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartSync {
    /// The one and only request variant.
    StartSync {
        /// Items to dispatch, in submission order.
        items: Vec<SyncQueueItem>,
        /// Batch configuration.
        config: SyncConfig,
    },
}

impl StartSync {
    /// Creates a start-sync request.
    pub fn new(items: Vec<SyncQueueItem>, config: SyncConfig) -> Self {
        StartSync::StartSync { items, config }
    }
}

/// Per-item result streamed back from the executor.
///
/// The executor never retries internally and never merges results; it posts
/// exactly one outcome for every item it received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOutcome {
    /// The server confirmed the mutation (2xx).
    SyncCompleted {
        /// Queue item id.
        id: Uuid,
    },
    /// The dispatch failed with a non-conflict error.
    SyncFailed {
        /// Queue item id.
        id: Uuid,
        /// Human-readable error description.
        error: String,
        /// True for non-409 4xx responses that will not succeed on retry.
        /// Permanent failures still enter the standard retry counter but
        /// are distinguishable in logs.
        permanent: bool,
    },
    /// The server rejected the mutation as out of date (409).
    ConflictDetected {
        /// Queue item id.
        id: Uuid,
        /// Current server-side entity from the response body.
        server_data: Value,
        /// The client's attempted payload.
        client_data: Value,
    },
}

impl SyncOutcome {
    /// Returns the queue item id this outcome refers to.
    pub fn item_id(&self) -> Uuid {
        match self {
            SyncOutcome::SyncCompleted { id }
            | SyncOutcome::SyncFailed { id, .. }
            | SyncOutcome::ConflictDetected { id, .. } => *id,
        }
    }
}
