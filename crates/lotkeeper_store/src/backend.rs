//! Storage backend trait definition.

use crate::error::StoreResult;
use crate::record::{Collection, StoredRecord};

/// A durable key-value store over the fixed set of [`Collection`]s.
///
/// # Invariants
///
/// - `put` is transactionally atomic: a write is either fully visible to
///   subsequent reads or not visible at all
/// - `get` returns exactly the record previously written under that id
/// - `get_all` returns a consistent snapshot ordered by record id
/// - Backends must be `Send + Sync`; callers may share them across tasks
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - for tests
/// - [`crate::EmbeddedStore`] - file-backed persistent storage
/// - [`crate::HostManagedStore`] - host-provided SQLite database
pub trait StoreBackend: Send + Sync {
    /// Writes (inserts or replaces) a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write could not be made durable. On error
    /// the previous record, if any, remains visible.
    fn put(&self, collection: Collection, record: &StoredRecord) -> StoreResult<()>;

    /// Reads the record with the given id, if present.
    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<StoredRecord>>;

    /// Reads a snapshot of all records in the collection, ordered by id.
    fn get_all(&self, collection: Collection) -> StoreResult<Vec<StoredRecord>>;

    /// Removes the record with the given id.
    ///
    /// Returns true if a record was removed.
    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Returns the number of records in the collection.
    fn count(&self, collection: Collection) -> StoreResult<usize> {
        Ok(self.get_all(collection)?.len())
    }
}
