//! Inspect command implementation.

use lotkeeper_store::{Collection, EmbeddedStore, StoreBackend};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store directory path.
    pub path: String,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
    /// Total records across collections.
    pub total_records: usize,
    /// Records never confirmed by the server.
    pub unsynchronized: usize,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: &'static str,
    /// Number of records.
    pub record_count: usize,
    /// Records never confirmed by the server.
    pub unsynchronized: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = EmbeddedStore::open(path)?;

    let mut result = InspectResult {
        path: path.display().to_string(),
        collections: Vec::new(),
        total_records: 0,
        unsynchronized: 0,
    };

    for collection in Collection::ALL {
        let records = store.get_all(collection)?;
        let unsynchronized = records.iter().filter(|r| r.is_unsynchronized()).count();
        result.total_records += records.len();
        result.unsynchronized += unsynchronized;
        result.collections.push(CollectionStats {
            name: collection.name(),
            record_count: records.len(),
            unsynchronized,
        });
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!();
    println!("{:<18}  {:>8}  {:>14}", "COLLECTION", "RECORDS", "UNSYNCHRONIZED");
    for stats in &result.collections {
        println!(
            "{:<18}  {:>8}  {:>14}",
            stats.name, stats.record_count, stats.unsynchronized
        );
    }
    println!();
    println!(
        "{} record(s) total, {} unsynchronized",
        result.total_records, result.unsynchronized
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotkeeper_store::StoredRecord;
    use serde_json::json;

    #[test]
    fn counts_records_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EmbeddedStore::open(dir.path()).unwrap();
            store
                .put(Collection::Vehicles, &StoredRecord::new("v1", json!({})))
                .unwrap();
            store
                .put(
                    Collection::Vehicles,
                    &StoredRecord::new("v2", json!({})).with_last_synced_at(100),
                )
                .unwrap();
        }

        run(dir.path(), "text").unwrap();
        run(dir.path(), "json").unwrap();
    }
}
