//! Durable sync queue manager.
//!
//! The manager owns the full mutation lifecycle: items are persisted
//! before `enqueue` returns, dispatched in submission order by the
//! background executor, retried a fixed number of times with a fixed
//! backoff, and either removed on server confirmation or retained in
//! `Failed` status for manual retry.
//!
//! # Key Invariants
//!
//! - An enqueued item is durable before the caller observes success
//! - At most one sync pass runs at a time; passes are serialized, never
//!   dropped
//! - `last_synced_at` on a cached entity is set only after the server
//!   confirms the mutation
//! - A conflict (409) never increments the retry counter and never lands
//!   an item in `Failed`

use crate::config::EngineConfig;
use crate::conflict::{ConflictResolver, ResolverAction};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::executor::ExecutorHandle;
use lotkeeper_store::{Collection, StoreBackend, StoredRecord};
use lotkeeper_sync_protocol::{
    ConflictRecord, ManualChoice, Operation, QueueItemStatus, SyncOutcome, SyncQueueItem,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Notifications published by the queue manager.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// An item was confirmed by the server and removed from the queue.
    ItemCompleted {
        /// Queue item id.
        id: Uuid,
    },
    /// An item exhausted its retries and is now in `Failed` status.
    SyncExhausted {
        /// Queue item id.
        id: Uuid,
        /// Target collection name.
        entity_type: String,
        /// Final retry counter value, never exceeding the cap.
        retries: u32,
    },
    /// A conflict is parked awaiting a manual decision.
    ConflictPending {
        /// The parked conflict.
        record: ConflictRecord,
    },
}

struct QueueInner {
    store: Arc<dyn StoreBackend>,
    executor: ExecutorHandle,
    config: EngineConfig,
    monitor: Arc<ConnectivityMonitor>,
    resolver: ConflictResolver,
    next_sequence: AtomicU64,
    pass_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<EngineEvent>,
}

/// Manages the durable mutation queue and drives sync passes.
#[derive(Clone)]
pub struct SyncQueueManager {
    inner: Arc<QueueInner>,
}

impl SyncQueueManager {
    /// Creates a manager over an opened store.
    ///
    /// Items left in-flight by a previous process (a crash mid-pass) are
    /// recovered to pending; a dispatch without an observed outcome is
    /// retried, never assumed to have succeeded.
    pub fn new(
        store: Arc<dyn StoreBackend>,
        executor: ExecutorHandle,
        config: EngineConfig,
        monitor: Arc<ConnectivityMonitor>,
    ) -> SyncResult<Self> {
        let resolver = ConflictResolver::new(config.conflict_resolution);
        let (events, _) = broadcast::channel(64);

        let manager = Self {
            inner: Arc::new(QueueInner {
                store,
                executor,
                config,
                monitor,
                resolver,
                next_sequence: AtomicU64::new(0),
                pass_lock: tokio::sync::Mutex::new(()),
                events,
            }),
        };

        let mut max_sequence = 0;
        for mut item in manager.load_items()? {
            max_sequence = max_sequence.max(item.sequence);
            if item.status == QueueItemStatus::InFlight {
                info!(item = %item.id, "recovering in-flight item to pending");
                item.status = QueueItemStatus::Pending;
                manager.persist_item(&item)?;
            }
        }
        manager
            .inner
            .next_sequence
            .store(max_sequence + 1, Ordering::SeqCst);

        Ok(manager)
    }

    /// Persists a mutation and returns the durable item.
    ///
    /// When the host is online a sync pass is triggered in the background;
    /// the caller never waits on the network.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EnqueueFailed`] when the item could not be
    /// made durable. Nothing is queued in that case.
    pub fn enqueue(
        &self,
        operation: Operation,
        entity_type: impl Into<String>,
        payload: Value,
    ) -> SyncResult<SyncQueueItem> {
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::SeqCst);
        let item = SyncQueueItem::new(operation, entity_type, payload)
            .with_max_retries(self.inner.config.max_retries)
            .with_sequence(sequence);

        self.persist_item(&item)
            .map_err(|e| match e {
                SyncError::Store(store) => SyncError::EnqueueFailed(store),
                other => other,
            })?;
        debug!(item = %item.id, entity_type = %item.entity_type, "enqueued mutation");

        if self.inner.monitor.is_online() {
            self.trigger_sync();
        }
        Ok(item)
    }

    /// Spawns a sync pass in the background.
    ///
    /// Passes are serialized; triggering while one runs queues another
    /// behind it rather than overlapping dispatches.
    pub fn trigger_sync(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.run_sync_pass().await {
                warn!(error = %e, "sync pass failed");
            }
        });
    }

    /// Runs one sync pass to completion and returns the number of items
    /// dispatched.
    ///
    /// Dispatches regardless of reported connectivity; the automatic
    /// triggers (enqueue, reconnect, backoff timer) are the ones gated on
    /// being online. Returns without dispatching when nothing is pending.
    pub async fn run_sync_pass(&self) -> SyncResult<usize> {
        let _guard = self.inner.pass_lock.lock().await;

        let batch = self.pending_items()?;
        if batch.is_empty() {
            return Ok(0);
        }

        let mut in_flight = HashMap::with_capacity(batch.len());
        for item in &batch {
            let mut marked = item.clone();
            marked.status = QueueItemStatus::InFlight;
            self.persist_item(&marked)?;
            in_flight.insert(marked.id, marked);
        }

        let mut rx = match self
            .inner
            .executor
            .start_sync(batch.clone(), self.inner.config.sync_config())
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                for item in in_flight.into_values() {
                    self.repend(item)?;
                }
                return Err(e);
            }
        };

        let mut want_redispatch = false;
        while let Some(outcome) = rx.recv().await {
            let Some(item) = in_flight.remove(&outcome.item_id()) else {
                warn!(item = %outcome.item_id(), "outcome for unknown item ignored");
                continue;
            };
            match outcome {
                SyncOutcome::SyncCompleted { .. } => {
                    self.confirm_local_entity(&item)?;
                    self.remove_item(item.id)?;
                }
                SyncOutcome::SyncFailed {
                    error, permanent, ..
                } => {
                    if self.register_failure(item, &error, permanent)? {
                        want_redispatch = true;
                    }
                }
                SyncOutcome::ConflictDetected { server_data, .. } => {
                    if self.handle_conflict(item, server_data)? {
                        want_redispatch = true;
                    }
                }
            }
        }

        // Items without an observed outcome (the executor went away
        // mid-batch) return to pending so the next pass retries them; a
        // dispatch without an outcome is never assumed delivered.
        for item in in_flight.into_values() {
            self.repend(item)?;
        }

        if want_redispatch {
            self.schedule_redispatch();
        }
        Ok(batch.len())
    }

    fn repend(&self, mut item: SyncQueueItem) -> SyncResult<()> {
        item.status = QueueItemStatus::Pending;
        self.persist_item(&item)
    }

    /// Moves a failed item back to pending and triggers a pass.
    ///
    /// The retry counter restarts from zero.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ItemNotFound`] when no item has this id.
    pub fn retry(&self, id: Uuid) -> SyncResult<()> {
        let mut item = self.find_item(id)?.ok_or(SyncError::ItemNotFound(id))?;
        if item.status == QueueItemStatus::Failed {
            item.status = QueueItemStatus::Pending;
            item.retry_count = 0;
            self.persist_item(&item)?;
        }
        if self.inner.monitor.is_online() {
            self.trigger_sync();
        }
        Ok(())
    }

    /// Applies a manual decision to a parked conflict.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConflictNotFound`] when no conflict is parked
    /// for this id.
    pub fn resolve_conflict(&self, id: Uuid, choice: ManualChoice) -> SyncResult<()> {
        if !self.inner.resolver.held_ids().contains(&id) {
            return Err(SyncError::ConflictNotFound(id));
        }

        match choice {
            ManualChoice::Server => {
                // The record stays held until the item is known to exist,
                // so a failed resolution can be retried.
                let item = self.find_item(id)?.ok_or(SyncError::ItemNotFound(id))?;
                if let Some(record) = self.inner.resolver.take(id) {
                    self.adopt_server_payload(&item, record.server_payload)?;
                }
            }
            ManualChoice::Client => {
                // The item is already pending; releasing the hold is enough
                // for the next pass to pick it up.
                self.inner.resolver.take(id);
                if self.inner.monitor.is_online() {
                    self.trigger_sync();
                }
            }
        }
        Ok(())
    }

    /// Pending items in submission order, excluding parked conflicts.
    pub fn pending_items(&self) -> SyncResult<Vec<SyncQueueItem>> {
        let held = self.inner.resolver.held_ids();
        let mut items: Vec<_> = self
            .load_items()?
            .into_iter()
            .filter(|i| i.status == QueueItemStatus::Pending && !held.contains(&i.id))
            .collect();
        items.sort_by_key(|i| i.sequence);
        Ok(items)
    }

    /// Items that exhausted their retries.
    pub fn failed_items(&self) -> SyncResult<Vec<SyncQueueItem>> {
        let mut items: Vec<_> = self
            .load_items()?
            .into_iter()
            .filter(|i| i.status == QueueItemStatus::Failed)
            .collect();
        items.sort_by_key(|i| i.sequence);
        Ok(items)
    }

    /// Every conflict currently awaiting a manual decision.
    pub fn open_conflicts(&self) -> Vec<ConflictRecord> {
        self.inner.resolver.open_conflicts()
    }

    /// Subscribes to queue events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    fn handle_conflict(&self, mut item: SyncQueueItem, server_data: Value) -> SyncResult<bool> {
        let record = ConflictRecord::new(item.id, server_data, item.payload.clone());
        match self.inner.resolver.decide() {
            ResolverAction::AcceptServer => {
                debug!(item = %item.id, "conflict resolved: server wins");
                self.adopt_server_payload(&item, record.server_payload)?;
                Ok(false)
            }
            ResolverAction::RetryClient => {
                debug!(item = %item.id, "conflict resolved: client wins, re-dispatching");
                item.status = QueueItemStatus::Pending;
                self.persist_item(&item)?;
                Ok(true)
            }
            ResolverAction::Hold => {
                info!(item = %item.id, "conflict parked for manual resolution");
                item.status = QueueItemStatus::Pending;
                self.persist_item(&item)?;
                self.inner.resolver.hold(record.clone());
                let _ = self.inner.events.send(EngineEvent::ConflictPending { record });
                Ok(false)
            }
        }
    }

    /// Overwrites the local entity with the server's version and drops the
    /// queue item.
    fn adopt_server_payload(&self, item: &SyncQueueItem, server_payload: Value) -> SyncResult<()> {
        if let Ok(collection) = Collection::parse(&item.entity_type) {
            let id = server_payload
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| item.entity_id().map(str::to_string));
            if let Some(id) = id {
                let mut record = StoredRecord::new(id, server_payload);
                record.mark_synced_now();
                self.inner.store.put(collection, &record)?;
            }
        }
        self.remove_item(item.id)
    }

    /// Stamps the local entity as confirmed after a successful dispatch.
    fn confirm_local_entity(&self, item: &SyncQueueItem) -> SyncResult<()> {
        let Ok(collection) = Collection::parse(&item.entity_type) else {
            return Ok(());
        };
        let Some(id) = item.entity_id().map(str::to_string) else {
            return Ok(());
        };
        match item.operation {
            Operation::Delete => {
                self.inner.store.delete(collection, &id)?;
            }
            Operation::Create | Operation::Update => {
                let mut record = StoredRecord::new(id, item.payload.clone());
                record.mark_synced_now();
                self.inner.store.put(collection, &record)?;
            }
        }
        Ok(())
    }

    fn register_failure(
        &self,
        mut item: SyncQueueItem,
        error: &str,
        permanent: bool,
    ) -> SyncResult<bool> {
        // Clamped so the count never exceeds the cap, including a cap of
        // zero (fail on the first attempt).
        item.retry_count = (item.retry_count + 1).min(item.max_retries);
        if item.retry_count < item.max_retries {
            debug!(
                item = %item.id,
                attempt = item.retry_count,
                permanent,
                error,
                "dispatch failed, will retry"
            );
            item.status = QueueItemStatus::Pending;
            self.persist_item(&item)?;
            Ok(true)
        } else {
            warn!(
                item = %item.id,
                retries = item.retry_count,
                error,
                "dispatch failed permanently, retries exhausted"
            );
            item.status = QueueItemStatus::Failed;
            self.persist_item(&item)?;
            let _ = self.inner.events.send(EngineEvent::SyncExhausted {
                id: item.id,
                entity_type: item.entity_type,
                retries: item.retry_count,
            });
            Ok(false)
        }
    }

    fn schedule_redispatch(&self) {
        let manager = self.clone();
        let backoff = self.inner.config.retry_backoff;
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            // A host that went offline meanwhile gets its pass from the
            // reconnect trigger instead.
            if !manager.inner.monitor.is_online() {
                return;
            }
            if let Err(e) = manager.run_sync_pass().await {
                warn!(error = %e, "re-dispatch pass failed");
            }
        });
    }

    fn persist_item(&self, item: &SyncQueueItem) -> SyncResult<()> {
        let record = StoredRecord::new(item.id.to_string(), serde_json::to_value(item)?);
        self.inner.store.put(Collection::SyncQueue, &record)?;
        Ok(())
    }

    fn remove_item(&self, id: Uuid) -> SyncResult<()> {
        self.inner.store.delete(Collection::SyncQueue, &id.to_string())?;
        let _ = self.inner.events.send(EngineEvent::ItemCompleted { id });
        Ok(())
    }

    fn find_item(&self, id: Uuid) -> SyncResult<Option<SyncQueueItem>> {
        let Some(record) = self.inner.store.get(Collection::SyncQueue, &id.to_string())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(record.data)?))
    }

    fn load_items(&self) -> SyncResult<Vec<SyncQueueItem>> {
        let mut items = Vec::new();
        for record in self.inner.store.get_all(Collection::SyncQueue)? {
            items.push(serde_json::from_value(record.data)?);
        }
        Ok(items)
    }
}
