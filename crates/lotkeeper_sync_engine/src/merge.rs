//! Merge-on-reload.
//!
//! After a reload the client holds a cached copy of each collection while
//! the server returns a fresh snapshot. The merge keeps local-only records
//! (usually mutations still in the queue), adopts server-only records, and
//! picks a winner per shared id using the version authority.

use crate::error::SyncResult;
use lotkeeper_store::{Collection, StoreBackend, StoredRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Decides which side wins when both hold a record with the same id.
pub trait VersionAuthority: Send + Sync {
    /// Returns true when the local record should survive the merge.
    fn local_wins(&self, local: &StoredRecord, server: &StoredRecord) -> bool;
}

/// The default authority: compare confirmed sync timestamps.
///
/// An unsynchronized local record always wins (it carries a mutation the
/// server has not seen). When both sides carry timestamps the newer one
/// wins, with ties going to the server as the authoritative side.
pub struct LastSyncedTimestamp;

impl VersionAuthority for LastSyncedTimestamp {
    fn local_wins(&self, local: &StoredRecord, server: &StoredRecord) -> bool {
        match (local.last_synced_at, server.last_synced_at) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(local_at), Some(server_at)) => local_at > server_at,
        }
    }
}

/// Merges server snapshots into the local store.
pub struct MergeEngine {
    store: Arc<dyn StoreBackend>,
    authority: Arc<dyn VersionAuthority>,
}

impl MergeEngine {
    /// Creates a merge engine with the [`LastSyncedTimestamp`] authority.
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self {
            store,
            authority: Arc::new(LastSyncedTimestamp),
        }
    }

    /// Replaces the version authority.
    pub fn with_authority(mut self, authority: Arc<dyn VersionAuthority>) -> Self {
        self.authority = authority;
        self
    }

    /// Merges a server snapshot into a collection and returns the merged
    /// result, ordered by record id.
    ///
    /// Only adopted server records are written back; records the local
    /// side wins are left untouched on disk.
    pub fn merge(
        &self,
        collection: Collection,
        server_records: Vec<StoredRecord>,
    ) -> SyncResult<Vec<StoredRecord>> {
        let mut merged: BTreeMap<String, StoredRecord> = self
            .store
            .get_all(collection)?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut adopted = 0usize;
        for server in server_records {
            let keep_local = merged
                .get(&server.id)
                .is_some_and(|local| self.authority.local_wins(local, &server));
            if keep_local {
                continue;
            }
            self.store.put(collection, &server)?;
            merged.insert(server.id.clone(), server);
            adopted += 1;
        }

        debug!(%collection, adopted, total = merged.len(), "merged server snapshot");
        Ok(merged.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotkeeper_store::MemoryStore;
    use proptest::prelude::*;
    use serde_json::json;

    fn engine() -> (MergeEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (MergeEngine::new(store.clone()), store)
    }

    fn synced(id: &str, data: serde_json::Value, at: i64) -> StoredRecord {
        StoredRecord::new(id, data).with_last_synced_at(at)
    }

    #[test]
    fn local_only_records_survive() {
        let (engine, store) = engine();
        store
            .put(Collection::Vehicles, &StoredRecord::new("v1", json!({"zone": "A"})))
            .unwrap();

        let merged = engine.merge(Collection::Vehicles, vec![]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "v1");
    }

    #[test]
    fn server_only_records_are_adopted_and_persisted() {
        let (engine, store) = engine();
        let merged = engine
            .merge(
                Collection::Vehicles,
                vec![synced("v1", json!({"zone": "B"}), 100)],
            )
            .unwrap();
        assert_eq!(merged.len(), 1);

        let cached = store.get(Collection::Vehicles, "v1").unwrap().unwrap();
        assert_eq!(cached.data["zone"], "B");
        assert_eq!(cached.last_synced_at, Some(100));
    }

    #[test]
    fn unsynchronized_local_record_beats_server() {
        let (engine, store) = engine();
        store
            .put(Collection::Vehicles, &StoredRecord::new("v1", json!({"zone": "A"})))
            .unwrap();

        let merged = engine
            .merge(
                Collection::Vehicles,
                vec![synced("v1", json!({"zone": "B"}), 100)],
            )
            .unwrap();
        assert_eq!(merged[0].data["zone"], "A");
        assert!(merged[0].is_unsynchronized());

        // The losing server record is not written back.
        let cached = store.get(Collection::Vehicles, "v1").unwrap().unwrap();
        assert_eq!(cached.data["zone"], "A");
    }

    #[test]
    fn newer_timestamp_wins_with_ties_to_server() {
        let (engine, store) = engine();
        store
            .put(Collection::Vehicles, &synced("older", json!({"side": "local"}), 50))
            .unwrap();
        store
            .put(Collection::Vehicles, &synced("newer", json!({"side": "local"}), 200))
            .unwrap();
        store
            .put(Collection::Vehicles, &synced("tied", json!({"side": "local"}), 100))
            .unwrap();

        let merged = engine
            .merge(
                Collection::Vehicles,
                vec![
                    synced("older", json!({"side": "server"}), 100),
                    synced("newer", json!({"side": "server"}), 100),
                    synced("tied", json!({"side": "server"}), 100),
                ],
            )
            .unwrap();

        let by_id: std::collections::HashMap<_, _> =
            merged.into_iter().map(|r| (r.id.clone(), r)).collect();
        assert_eq!(by_id["older"].data["side"], "server");
        assert_eq!(by_id["newer"].data["side"], "local");
        assert_eq!(by_id["tied"].data["side"], "server");
    }

    #[test]
    fn custom_authority_is_honored() {
        struct ServerAlwaysWins;
        impl VersionAuthority for ServerAlwaysWins {
            fn local_wins(&self, _: &StoredRecord, _: &StoredRecord) -> bool {
                false
            }
        }

        let store = Arc::new(MemoryStore::new());
        store
            .put(Collection::Settings, &StoredRecord::new("s1", json!({"v": "local"})))
            .unwrap();
        let engine = MergeEngine::new(store).with_authority(Arc::new(ServerAlwaysWins));

        let merged = engine
            .merge(Collection::Settings, vec![synced("s1", json!({"v": "server"}), 1)])
            .unwrap();
        assert_eq!(merged[0].data["v"], "server");
    }

    fn arb_record(prefix: &'static str) -> impl Strategy<Value = StoredRecord> {
        (0u8..8, proptest::option::of(0i64..1000)).prop_map(move |(n, at)| {
            let mut record = StoredRecord::new(format!("{prefix}{n}"), json!({"n": n}));
            record.last_synced_at = at;
            record
        })
    }

    proptest! {
        #[test]
        fn merge_covers_the_union_of_ids(
            locals in prop::collection::vec(arb_record("r"), 0..8),
            servers in prop::collection::vec(arb_record("r"), 0..8),
        ) {
            let store = Arc::new(MemoryStore::new());
            for record in &locals {
                store.put(Collection::Vehicles, record).unwrap();
            }
            let engine = MergeEngine::new(store);
            let merged = engine.merge(Collection::Vehicles, servers.clone()).unwrap();

            let mut expected: std::collections::BTreeSet<String> =
                locals.iter().map(|r| r.id.clone()).collect();
            expected.extend(servers.iter().map(|r| r.id.clone()));

            let got: std::collections::BTreeSet<String> =
                merged.iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn merge_is_idempotent(
            locals in prop::collection::vec(arb_record("r"), 0..8),
            servers in prop::collection::vec(arb_record("r"), 0..8),
        ) {
            let store = Arc::new(MemoryStore::new());
            for record in &locals {
                store.put(Collection::Vehicles, record).unwrap();
            }
            let engine = MergeEngine::new(store);
            let once = engine.merge(Collection::Vehicles, servers.clone()).unwrap();
            let twice = engine.merge(Collection::Vehicles, servers).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
