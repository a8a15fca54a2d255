//! In-memory store backend for testing and ephemeral use.

use crate::backend::StoreBackend;
use crate::error::StoreResult;
use crate::record::{Collection, StoredRecord};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// An in-memory [`StoreBackend`].
///
/// Records live in a `BTreeMap` per collection, so `get_all` is naturally
/// ordered by id. Nothing survives a drop; use it in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, StoredRecord>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryStore {
    fn put(&self, collection: Collection, record: &StoredRecord) -> StoreResult<()> {
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<StoredRecord>> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    fn get_all(&self, collection: Collection) -> StoreResult<Vec<StoredRecord>> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        Ok(self
            .collections
            .write()
            .get_mut(&collection)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }
}
