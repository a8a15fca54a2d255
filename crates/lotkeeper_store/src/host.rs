//! SQLite-backed store for hosts that provide a native database.

use crate::backend::StoreBackend;
use crate::error::StoreResult;
use crate::record::{Collection, StoredRecord};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// A [`StoreBackend`] over a host-managed SQLite database.
///
/// All four collections share one `records` table keyed by
/// `(collection, id)`. Every mutation runs inside a transaction, so a
/// write is fully visible or not at all, and the database file survives
/// process restarts.
pub struct HostManagedStore {
    conn: Mutex<Connection>,
}

impl HostManagedStore {
    /// Opens (or creates) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init_schema(&conn)?;
        debug!(path = %path.as_ref().display(), "opened host-managed store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database. Useful for tests that want SQLite
    /// semantics without a file.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                last_synced_at INTEGER,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;
        Ok(())
    }

    fn row_to_record(
        id: String,
        data: String,
        last_synced_at: Option<i64>,
    ) -> StoreResult<StoredRecord> {
        Ok(StoredRecord {
            id,
            data: serde_json::from_str(&data)?,
            last_synced_at,
        })
    }
}

impl StoreBackend for HostManagedStore {
    fn put(&self, collection: Collection, record: &StoredRecord) -> StoreResult<()> {
        let data = serde_json::to_string(&record.data)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO records (collection, id, data, last_synced_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (collection, id) DO UPDATE SET
                 data = excluded.data,
                 last_synced_at = excluded.last_synced_at",
            params![collection.name(), record.id, data, record.last_synced_at],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<StoredRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, data, last_synced_at FROM records
                 WHERE collection = ?1 AND id = ?2",
                params![collection.name(), id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, data, last_synced_at)| Self::row_to_record(id, data, last_synced_at))
            .transpose()
    }

    fn get_all(&self, collection: Collection) -> StoreResult<Vec<StoredRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, data, last_synced_at FROM records
             WHERE collection = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![collection.name()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data, last_synced_at) = row?;
            records.push(Self::row_to_record(id, data, last_synced_at)?);
        }
        Ok(records)
    }

    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.name(), id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn count(&self, collection: Collection) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection.name()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_roundtrip() {
        let store = HostManagedStore::open_in_memory().unwrap();
        let record = StoredRecord::new("s1", json!({"zone": "A"})).with_last_synced_at(99);

        store.put(Collection::ParkingSessions, &record).unwrap();
        let read = store.get(Collection::ParkingSessions, "s1").unwrap().unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn put_replaces_existing() {
        let store = HostManagedStore::open_in_memory().unwrap();
        store
            .put(Collection::Vehicles, &StoredRecord::new("v1", json!({"n": 1})))
            .unwrap();
        store
            .put(Collection::Vehicles, &StoredRecord::new("v1", json!({"n": 2})))
            .unwrap();

        assert_eq!(store.count(Collection::Vehicles).unwrap(), 1);
        assert_eq!(
            store.get(Collection::Vehicles, "v1").unwrap().unwrap().data,
            json!({"n": 2})
        );
    }

    #[test]
    fn get_all_is_ordered_by_id() {
        let store = HostManagedStore::open_in_memory().unwrap();
        for id in ["b", "a", "c"] {
            store
                .put(Collection::Settings, &StoredRecord::new(id, json!({})))
                .unwrap();
        }

        let ids: Vec<String> = store
            .get_all(Collection::Settings)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lotkeeper.db");
        {
            let store = HostManagedStore::open(&path).unwrap();
            store
                .put(Collection::SyncQueue, &StoredRecord::new("q1", json!({"op": "delete"})))
                .unwrap();
        }

        let store = HostManagedStore::open(&path).unwrap();
        assert_eq!(
            store.get(Collection::SyncQueue, "q1").unwrap().unwrap().data,
            json!({"op": "delete"})
        );
    }

    #[test]
    fn delete_reports_presence() {
        let store = HostManagedStore::open_in_memory().unwrap();
        store
            .put(Collection::SyncQueue, &StoredRecord::new("q1", json!({})))
            .unwrap();

        assert!(store.delete(Collection::SyncQueue, "q1").unwrap());
        assert!(!store.delete(Collection::SyncQueue, "q1").unwrap());
    }
}
