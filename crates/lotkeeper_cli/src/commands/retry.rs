//! Retry command implementation.
//!
//! Rewrites a failed queue item to pending directly in the store. The
//! next engine pass (or process start) picks it up; the CLI itself never
//! touches the network.

use lotkeeper_store::{Collection, EmbeddedStore, StoreBackend, StoredRecord};
use lotkeeper_sync_protocol::{QueueItemStatus, SyncQueueItem};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Runs the retry command.
pub fn run(path: &Path, id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
    let store = EmbeddedStore::open(path)?;

    let Some(record) = store.get(Collection::SyncQueue, &id.to_string())? else {
        return Err(format!("No queue item with id {id}").into());
    };
    let mut item: SyncQueueItem = serde_json::from_value(record.data)?;

    if item.status != QueueItemStatus::Failed {
        return Err(format!(
            "Queue item {id} is {:?}, only failed items can be retried",
            item.status
        )
        .into());
    }

    item.status = QueueItemStatus::Pending;
    item.retry_count = 0;
    store.put(
        Collection::SyncQueue,
        &StoredRecord::new(item.id.to_string(), serde_json::to_value(&item)?),
    )?;
    info!(item = %id, entity_type = %item.entity_type, "queue item reset to pending");

    println!("Queue item {id} moved back to pending");
    Ok(())
}
