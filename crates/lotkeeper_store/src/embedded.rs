//! File-backed embedded store.

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};
use crate::record::{Collection, StoredRecord};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = ".lotkeeper.lock";

type CollectionMap = BTreeMap<String, StoredRecord>;

/// A file-backed [`StoreBackend`].
///
/// Each collection is persisted as one JSON snapshot file in the store
/// directory. Every mutation rewrites the affected snapshot through a
/// temp-file-then-rename sequence, so a write is either fully durable or
/// absent; readers never observe a partial file. The directory carries an
/// advisory lock for the lifetime of the store, so two processes cannot
/// open the same directory concurrently.
pub struct EmbeddedStore {
    dir: PathBuf,
    collections: RwLock<HashMap<Collection, CollectionMap>>,
    // Held until drop; releasing it releases the directory lock.
    _lock: File,
}

impl EmbeddedStore {
    /// Opens (or creates) a store in the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the
    /// directory lock, or an I/O / serialization error if an existing
    /// snapshot cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let lock = File::create(dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(dir.display().to_string()))?;

        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            collections.insert(collection, Self::load_snapshot(&dir, collection)?);
        }

        debug!(dir = %dir.display(), "opened embedded store");
        Ok(Self {
            dir,
            collections: RwLock::new(collections),
            _lock: lock,
        })
    }

    fn snapshot_path(dir: &Path, collection: Collection) -> PathBuf {
        dir.join(format!("{}.json", collection.name()))
    }

    fn load_snapshot(dir: &Path, collection: Collection) -> StoreResult<CollectionMap> {
        let path = Self::snapshot_path(dir, collection);
        if !path.exists() {
            return Ok(CollectionMap::new());
        }

        let file = File::open(&path)?;
        let records: Vec<StoredRecord> = serde_json::from_reader(file)?;
        Ok(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    /// Writes the snapshot to a temp file, fsyncs it, then renames it over
    /// the previous snapshot. Rename is atomic on the filesystems we
    /// support, so a crash leaves either the old or the new snapshot.
    fn persist_snapshot(&self, collection: Collection, records: &CollectionMap) -> StoreResult<()> {
        let path = Self::snapshot_path(&self.dir, collection);
        let tmp_path = path.with_extension("json.tmp");

        let records: Vec<&StoredRecord> = records.values().collect();
        let bytes = serde_json::to_vec(&records)?;

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&bytes)?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Applies a mutation to a copy of the collection, persists the copy,
    /// and only then makes it visible to readers.
    fn mutate<F>(&self, collection: Collection, apply: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut CollectionMap) -> bool,
    {
        let mut guard = self.collections.write();
        let current = guard.entry(collection).or_default();

        let mut updated = current.clone();
        let changed = apply(&mut updated);
        if !changed {
            return Ok(false);
        }

        self.persist_snapshot(collection, &updated)?;
        *current = updated;
        Ok(true)
    }
}

impl StoreBackend for EmbeddedStore {
    fn put(&self, collection: Collection, record: &StoredRecord) -> StoreResult<()> {
        self.mutate(collection, |records| {
            records.insert(record.id.clone(), record.clone());
            true
        })?;
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
        self.mutate(collection, |records| records.remove(id).is_some())
    }
}
