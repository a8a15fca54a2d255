//! Conflict records and resolution policies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The paired server/client representations of an entity when the remote
/// service rejects a mutation as out of date (HTTP 409).
///
/// Created only in response to a conflict signal, consumed by the conflict
/// resolver and then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Id of the queue item whose dispatch conflicted.
    pub queue_item_id: Uuid,
    /// The current server-side entity, as returned in the 409 body.
    pub server_payload: Value,
    /// The client's attempted mutation payload.
    pub client_payload: Value,
    /// Detection time, UTC milliseconds.
    pub detected_at: i64,
}

impl ConflictRecord {
    /// Creates a record stamped with the current time.
    pub fn new(queue_item_id: Uuid, server_payload: Value, client_payload: Value) -> Self {
        Self {
            queue_item_id,
            server_payload,
            client_payload,
            detected_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Policy applied when the server reports a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Discard the client's pending mutation and adopt the server payload.
    #[default]
    Server,
    /// Re-issue the client's mutation as a fresh dispatch (overwrite).
    Client,
    /// Hold the item and surface the record for human resolution.
    Manual,
}

impl ConflictPolicy {
    /// Returns true if this policy resolves conflicts without human input.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictPolicy::Manual)
    }
}

/// A human's decision for a manually held conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualChoice {
    /// Proceed as the automatic server-wins branch.
    Server,
    /// Proceed as the automatic client-wins branch.
    Client,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_policy_is_server() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Server);
    }

    #[test]
    fn auto_resolution() {
        assert!(ConflictPolicy::Server.auto_resolves());
        assert!(ConflictPolicy::Client.auto_resolves());
        assert!(!ConflictPolicy::Manual.auto_resolves());
    }

    #[test]
    fn record_carries_both_payloads() {
        let id = Uuid::new_v4();
        let record = ConflictRecord::new(id, json!({"v": 2}), json!({"v": 1}));
        assert_eq!(record.queue_item_id, id);
        assert_eq!(record.server_payload, json!({"v": 2}));
        assert_eq!(record.client_payload, json!({"v": 1}));
        assert!(record.detected_at > 0);
    }

    #[test]
    fn policy_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConflictPolicy::Manual).unwrap(),
            "\"manual\""
        );
    }
}
