//! Queue listing command implementation.

use chrono::{TimeZone, Utc};
use lotkeeper_store::{Collection, EmbeddedStore, StoreBackend};
use lotkeeper_sync_protocol::{QueueItemStatus, SyncQueueItem};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// One listed queue item.
#[derive(Debug, Serialize)]
pub struct QueueRow {
    /// Queue item id.
    pub id: String,
    /// Mutation kind.
    pub operation: String,
    /// Target collection name.
    pub entity_type: String,
    /// Lifecycle status.
    pub status: QueueItemStatus,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Retry cap.
    pub max_retries: u32,
    /// Enqueue time, UTC milliseconds.
    pub timestamp: i64,
}

/// Runs the queue command.
pub fn run(path: &Path, failed_only: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = EmbeddedStore::open(path)?;
    let mut items = load_queue(&store)?;
    items.sort_by_key(|i| i.sequence);
    debug!(items = items.len(), failed_only, "loaded sync queue");

    let rows: Vec<QueueRow> = items
        .iter()
        .filter(|i| !failed_only || i.status == QueueItemStatus::Failed)
        .map(|i| QueueRow {
            id: i.id.to_string(),
            operation: i.operation.to_string(),
            entity_type: i.entity_type.clone(),
            status: i.status,
            retry_count: i.retry_count,
            max_retries: i.max_retries,
            timestamp: i.timestamp,
        })
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => print_text_output(&rows),
    }
    Ok(())
}

fn load_queue(store: &dyn StoreBackend) -> Result<Vec<SyncQueueItem>, Box<dyn std::error::Error>> {
    let mut items = Vec::new();
    for record in store.get_all(Collection::SyncQueue)? {
        items.push(serde_json::from_value(record.data)?);
    }
    Ok(items)
}

fn print_text_output(rows: &[QueueRow]) {
    if rows.is_empty() {
        println!("Queue is empty");
        return;
    }

    println!(
        "{:<36}  {:<6}  {:<16}  {:<9}  {:<7}  {}",
        "ID", "OP", "ENTITY", "STATUS", "RETRIES", "ENQUEUED"
    );
    for row in rows {
        let enqueued = Utc
            .timestamp_millis_opt(row.timestamp)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| row.timestamp.to_string());
        println!(
            "{:<36}  {:<6}  {:<16}  {:<9}  {:>3}/{:<3}  {}",
            row.id,
            row.operation,
            row.entity_type,
            format!("{:?}", row.status).to_lowercase(),
            row.retry_count,
            row.max_retries,
            enqueued
        );
    }
    println!("\n{} item(s)", rows.len());
}
