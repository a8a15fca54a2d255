//! Conflict resolution.
//!
//! A 409 from the server is never treated as a plain failure. The resolver
//! maps the configured policy onto one of three actions; manual conflicts
//! are parked here, outside the retry loop, until the application decides.

use lotkeeper_sync_protocol::{ConflictPolicy, ConflictRecord};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// What the queue manager should do with a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverAction {
    /// Overwrite the local entity with the server's version and drop the
    /// queue item.
    AcceptServer,
    /// Keep the client payload and re-dispatch the item.
    RetryClient,
    /// Park the conflict for an explicit application decision.
    Hold,
}

/// Applies the conflict policy and tracks held (manual) conflicts.
pub struct ConflictResolver {
    policy: ConflictPolicy,
    held: Mutex<HashMap<Uuid, ConflictRecord>>,
}

impl ConflictResolver {
    /// Creates a resolver for the given policy.
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured policy.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Decides the action for a detected conflict.
    pub fn decide(&self) -> ResolverAction {
        match self.policy {
            ConflictPolicy::Server => ResolverAction::AcceptServer,
            ConflictPolicy::Client => ResolverAction::RetryClient,
            ConflictPolicy::Manual => ResolverAction::Hold,
        }
    }

    /// Parks a conflict awaiting a manual decision.
    pub fn hold(&self, record: ConflictRecord) {
        self.held.lock().insert(record.queue_item_id, record);
    }

    /// Ids of queue items currently parked on a conflict.
    ///
    /// Parked items are excluded from dispatch batches until resolved.
    pub fn held_ids(&self) -> HashSet<Uuid> {
        self.held.lock().keys().copied().collect()
    }

    /// Returns every parked conflict.
    pub fn open_conflicts(&self) -> Vec<ConflictRecord> {
        self.held.lock().values().cloned().collect()
    }

    /// Removes and returns the parked conflict for a queue item.
    pub fn take(&self, queue_item_id: Uuid) -> Option<ConflictRecord> {
        self.held.lock().remove(&queue_item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: Uuid) -> ConflictRecord {
        ConflictRecord::new(id, json!({"zone": "B"}), json!({"zone": "A"}))
    }

    #[test]
    fn policy_maps_to_action() {
        assert_eq!(
            ConflictResolver::new(ConflictPolicy::Server).decide(),
            ResolverAction::AcceptServer
        );
        assert_eq!(
            ConflictResolver::new(ConflictPolicy::Client).decide(),
            ResolverAction::RetryClient
        );
        assert_eq!(
            ConflictResolver::new(ConflictPolicy::Manual).decide(),
            ResolverAction::Hold
        );
    }

    #[test]
    fn held_conflicts_are_tracked_and_taken_once() {
        let resolver = ConflictResolver::new(ConflictPolicy::Manual);
        let id = Uuid::new_v4();
        resolver.hold(record(id));

        assert!(resolver.held_ids().contains(&id));
        assert_eq!(resolver.open_conflicts().len(), 1);

        let taken = resolver.take(id).unwrap();
        assert_eq!(taken.queue_item_id, id);
        assert!(resolver.take(id).is_none());
        assert!(resolver.held_ids().is_empty());
    }
}
