//! Background sync executor.
//!
//! The executor runs as an isolated task owning its transport. It shares
//! no mutable state with the queue manager; the whole protocol is one
//! [`StartSync`] request followed by exactly one [`SyncOutcome`] per item,
//! streamed back over a channel. Items are processed **sequentially** in
//! submission order so causally dependent mutations on the same entity
//! (create then update) are never reordered. All retry policy lives in
//! the queue manager; the executor never retries internally.

use crate::error::{SyncError, SyncResult};
use crate::transport::{DispatchOutcome, RemoteTransport};
use lotkeeper_sync_protocol::{StartSync, SyncConfig, SyncOutcome, SyncQueueItem};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

enum ExecutorRequest {
    StartSync {
        batch: StartSync,
        results: mpsc::Sender<SyncOutcome>,
    },
    Shutdown,
}

/// Handle for sending requests to the executor task.
///
/// Cloneable; dropping every handle ends the task once its queue drains.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<ExecutorRequest>,
}

impl ExecutorHandle {
    /// Submits a batch and returns the stream of per-item outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ExecutorGone`] if the executor task has
    /// stopped.
    pub async fn start_sync(
        &self,
        items: Vec<SyncQueueItem>,
        config: SyncConfig,
    ) -> SyncResult<mpsc::Receiver<SyncOutcome>> {
        let (results, rx) = mpsc::channel(items.len().max(1));
        self.tx
            .send(ExecutorRequest::StartSync {
                batch: StartSync::new(items, config),
                results,
            })
            .await
            .map_err(|_| SyncError::ExecutorGone)?;
        Ok(rx)
    }

    /// Asks the executor task to stop after the current batch.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ExecutorRequest::Shutdown).await;
    }
}

/// Spawner for the background executor task.
pub struct SyncExecutor;

impl SyncExecutor {
    /// Spawns the executor task and returns its handle.
    pub fn spawn(transport: Arc<dyn RemoteTransport>) -> ExecutorHandle {
        let (tx, mut rx) = mpsc::channel::<ExecutorRequest>(16);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    ExecutorRequest::StartSync { batch, results } => {
                        let StartSync::StartSync { items, config } = batch;
                        Self::run_batch(&*transport, items, &config, &results).await;
                    }
                    ExecutorRequest::Shutdown => {
                        info!("sync executor shutting down");
                        break;
                    }
                }
            }
        });

        ExecutorHandle { tx }
    }

    async fn run_batch(
        transport: &dyn RemoteTransport,
        items: Vec<SyncQueueItem>,
        config: &SyncConfig,
        results: &mpsc::Sender<SyncOutcome>,
    ) {
        debug!(
            items = items.len(),
            priority = ?config.priority,
            "executor: sync pass started"
        );

        for item in items {
            let outcome = match transport.dispatch(&item).await {
                DispatchOutcome::Completed => SyncOutcome::SyncCompleted { id: item.id },
                DispatchOutcome::Conflict { server } => SyncOutcome::ConflictDetected {
                    id: item.id,
                    server_data: server,
                    client_data: item.payload.clone(),
                },
                DispatchOutcome::Failed { message, permanent } => SyncOutcome::SyncFailed {
                    id: item.id,
                    error: message,
                    permanent,
                },
            };

            // The manager may drop its receiver mid-batch (shutdown); the
            // remaining items stay pending and re-enter the next pass.
            if results.send(outcome).await.is_err() {
                break;
            }
        }
    }
}
