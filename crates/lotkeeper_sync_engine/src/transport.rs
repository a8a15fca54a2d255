//! Transport abstraction for dispatching queued mutations.

use async_trait::async_trait;
use lotkeeper_sync_protocol::{Operation, SyncQueueItem};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Classified result of dispatching a single queue item.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The server confirmed the mutation (2xx).
    Completed,
    /// The server rejected the mutation as out of date (409) and returned
    /// its current entity.
    Conflict {
        /// Current server-side entity from the response body.
        server: Value,
    },
    /// The dispatch failed.
    Failed {
        /// Human-readable error description.
        message: String,
        /// True for responses that will not succeed on retry.
        permanent: bool,
    },
}

impl DispatchOutcome {
    /// Creates a transient (retryable) failure.
    pub fn transient(message: impl Into<String>) -> Self {
        DispatchOutcome::Failed {
            message: message.into(),
            permanent: false,
        }
    }

    /// Creates a permanent failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        DispatchOutcome::Failed {
            message: message.into(),
            permanent: true,
        }
    }
}

/// A remote transport dispatches one queued mutation at a time.
///
/// The trait abstracts the network layer so the executor can be exercised
/// with a [`MockTransport`] in tests and an HTTP client in production.
/// Implementations classify every outcome; they never panic on network
/// errors and never retry internally.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Dispatches the item's mutation and classifies the result.
    async fn dispatch(&self, item: &SyncQueueItem) -> DispatchOutcome;
}

/// A scripted transport for testing.
///
/// Outcomes are queued per item id; unscripted dispatches return the
/// default outcome (initially [`DispatchOutcome::Completed`]). Every
/// dispatch is recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    scripted: Mutex<HashMap<Uuid, VecDeque<DispatchOutcome>>>,
    default_outcome: Mutex<Option<DispatchOutcome>>,
    calls: Mutex<Vec<(Uuid, Operation, String)>>,
}

impl MockTransport {
    /// Creates a transport that completes every dispatch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for the next dispatch of the given item.
    pub fn script(&self, id: Uuid, outcome: DispatchOutcome) {
        self.scripted.lock().entry(id).or_default().push_back(outcome);
    }

    /// Sets the outcome returned for unscripted dispatches.
    pub fn set_default_outcome(&self, outcome: DispatchOutcome) {
        *self.default_outcome.lock() = Some(outcome);
    }

    /// Returns every dispatch seen so far, in order.
    pub fn calls(&self) -> Vec<(Uuid, Operation, String)> {
        self.calls.lock().clone()
    }

    /// Returns the number of dispatches seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn dispatch(&self, item: &SyncQueueItem) -> DispatchOutcome {
        self.calls
            .lock()
            .push((item.id, item.operation, item.entity_type.clone()));

        if let Some(outcome) = self
            .scripted
            .lock()
            .get_mut(&item.id)
            .and_then(|queue| queue.pop_front())
        {
            return outcome;
        }

        self.default_outcome
            .lock()
            .clone()
            .unwrap_or(DispatchOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> SyncQueueItem {
        SyncQueueItem::new(Operation::Create, "vehicles", json!({"id": "v1"}))
    }

    #[tokio::test]
    async fn unscripted_dispatch_completes() {
        let transport = MockTransport::new();
        let item = item();
        assert!(matches!(
            transport.dispatch(&item).await,
            DispatchOutcome::Completed
        ));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_outcomes_drain_in_order() {
        let transport = MockTransport::new();
        let item = item();
        transport.script(item.id, DispatchOutcome::transient("reset"));
        transport.script(item.id, DispatchOutcome::Completed);

        assert!(matches!(
            transport.dispatch(&item).await,
            DispatchOutcome::Failed { permanent: false, .. }
        ));
        assert!(matches!(
            transport.dispatch(&item).await,
            DispatchOutcome::Completed
        ));
    }

    #[tokio::test]
    async fn default_outcome_override() {
        let transport = MockTransport::new();
        transport.set_default_outcome(DispatchOutcome::permanent("validation failed"));

        let item = item();
        assert!(matches!(
            transport.dispatch(&item).await,
            DispatchOutcome::Failed { permanent: true, .. }
        ));
    }

    #[tokio::test]
    async fn calls_record_operation_and_entity_type() {
        let transport = MockTransport::new();
        let item = item();
        transport.dispatch(&item).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (item.id, Operation::Create, "vehicles".to_string()));
    }
}
