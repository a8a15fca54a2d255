//! The offline engine facade.
//!
//! Wires the store, connectivity monitor, executor, queue manager, and
//! merge engine together behind one handle suitable for embedding in a
//! host application.

use crate::config::EngineConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::error::SyncResult;
use crate::executor::SyncExecutor;
use crate::http::HttpTransport;
use crate::merge::MergeEngine;
use crate::queue::{EngineEvent, SyncQueueManager};
use crate::transport::RemoteTransport;
use lotkeeper_store::{Collection, StoreBackend, StoreConfig, StoreContext, StoredRecord};
use lotkeeper_sync_protocol::{ConflictRecord, ManualChoice, Operation, SyncQueueItem};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// Aborts the reconnect listener when the last engine clone drops, so a
/// dropped engine releases its store (and any file lock) promptly.
struct ListenerGuard(tokio::task::JoinHandle<()>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The assembled offline-first engine.
///
/// Cheap to clone; all clones share the same queue, store, and monitor.
#[derive(Clone)]
pub struct OfflineEngine {
    store: Arc<dyn StoreBackend>,
    monitor: Arc<ConnectivityMonitor>,
    queue: SyncQueueManager,
    merger: Arc<MergeEngine>,
    _reconnect: Arc<ListenerGuard>,
}

impl OfflineEngine {
    /// Opens the store and assembles the engine with an HTTP transport
    /// built from the configuration.
    pub async fn new(config: EngineConfig, store_config: StoreConfig) -> SyncResult<Self> {
        let transport = Arc::new(HttpTransport::new(
            config.base_url.clone(),
            config.request_timeout,
        )?);
        Self::with_transport(config, StoreContext::new(store_config), transport).await
    }

    /// Assembles the engine over an explicit transport.
    pub async fn with_transport(
        config: EngineConfig,
        store_context: StoreContext,
        transport: Arc<dyn RemoteTransport>,
    ) -> SyncResult<Self> {
        let store = store_context.store().await?;
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let executor = SyncExecutor::spawn(transport);
        let queue = SyncQueueManager::new(store.clone(), executor, config, monitor.clone())?;
        let merger = Arc::new(MergeEngine::new(store.clone()));

        let reconnect = Self::spawn_reconnect_listener(&monitor, &queue);
        info!("offline engine ready");
        Ok(Self {
            store,
            monitor,
            queue,
            merger,
            _reconnect: Arc::new(ListenerGuard(reconnect)),
        })
    }

    /// Triggers a sync pass whenever the host comes back online.
    fn spawn_reconnect_listener(
        monitor: &ConnectivityMonitor,
        queue: &SyncQueueManager,
    ) -> tokio::task::JoinHandle<()> {
        let mut rx = monitor.subscribe();
        let queue = queue.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if *rx.borrow_and_update() {
                    debug!("connectivity restored, triggering sync");
                    queue.trigger_sync();
                }
            }
        })
    }

    /// Persists a mutation for eventual dispatch.
    ///
    /// Durable before this returns; the network is never awaited.
    pub fn enqueue(
        &self,
        operation: Operation,
        entity_type: impl Into<String>,
        payload: Value,
    ) -> SyncResult<SyncQueueItem> {
        self.queue.enqueue(operation, entity_type, payload)
    }

    /// Reports the host as online.
    pub fn notify_online(&self) {
        self.monitor.notify_online();
    }

    /// Reports the host as offline.
    pub fn notify_offline(&self) {
        self.monitor.notify_offline();
    }

    /// Whether the host currently reports being online.
    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// The full connectivity snapshot.
    pub fn connectivity(&self) -> ConnectivityState {
        self.monitor.state()
    }

    /// Runs one sync pass to completion.
    pub async fn sync_now(&self) -> SyncResult<usize> {
        self.queue.run_sync_pass().await
    }

    /// Pending items in submission order.
    pub fn pending_items(&self) -> SyncResult<Vec<SyncQueueItem>> {
        self.queue.pending_items()
    }

    /// Number of items awaiting dispatch.
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.queue.pending_items()?.len())
    }

    /// Items that exhausted their retries.
    pub fn failed_items(&self) -> SyncResult<Vec<SyncQueueItem>> {
        self.queue.failed_items()
    }

    /// Moves a failed item back to pending.
    pub fn retry(&self, id: Uuid) -> SyncResult<()> {
        self.queue.retry(id)
    }

    /// Conflicts parked for manual resolution.
    pub fn open_conflicts(&self) -> Vec<ConflictRecord> {
        self.queue.open_conflicts()
    }

    /// Applies a manual decision to a parked conflict.
    pub fn resolve_conflict(&self, id: Uuid, choice: ManualChoice) -> SyncResult<()> {
        self.queue.resolve_conflict(id, choice)
    }

    /// Subscribes to queue events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.queue.subscribe()
    }

    /// Merges a freshly fetched server snapshot into a collection.
    pub fn merge(
        &self,
        collection: Collection,
        server_records: Vec<StoredRecord>,
    ) -> SyncResult<Vec<StoredRecord>> {
        self.merger.merge(collection, server_records)
    }

    /// Direct access to the underlying store.
    pub fn store(&self) -> Arc<dyn StoreBackend> {
        self.store.clone()
    }
}
