//! Collections and the cached entity record.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The fixed set of persistent collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Active and historical parking sessions.
    ParkingSessions,
    /// Registered vehicles.
    Vehicles,
    /// Client settings records.
    Settings,
    /// The durable sync queue itself.
    SyncQueue,
}

impl Collection {
    /// Every collection, in storage order.
    pub const ALL: [Collection; 4] = [
        Collection::ParkingSessions,
        Collection::Vehicles,
        Collection::Settings,
        Collection::SyncQueue,
    ];

    /// Returns the canonical collection name. This is also the entity-type
    /// string used in queue items and remote endpoint paths.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::ParkingSessions => "parking_sessions",
            Collection::Vehicles => "vehicles",
            Collection::Settings => "settings",
            Collection::SyncQueue => "sync_queue",
        }
    }

    /// Resolves a collection from its name or entity-type string.
    pub fn parse(name: &str) -> StoreResult<Self> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A locally cached entity plus its sync bookkeeping.
///
/// `last_synced_at` is set only after a confirmed successful remote write
/// or fetch, never speculatively. A record without it is unsynchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Entity id, unique within its collection.
    pub id: String,
    /// Opaque entity data.
    pub data: Value,
    /// Last confirmed sync time, UTC milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<i64>,
}

impl StoredRecord {
    /// Creates an unsynchronized record.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            last_synced_at: None,
        }
    }

    /// Sets the confirmed sync timestamp.
    pub fn with_last_synced_at(mut self, at: i64) -> Self {
        self.last_synced_at = Some(at);
        self
    }

    /// Stamps the record with the current time as its confirmed sync time.
    pub fn mark_synced_now(&mut self) {
        self.last_synced_at = Some(chrono::Utc::now().timestamp_millis());
    }

    /// Returns true if the record has never been confirmed by the server.
    pub fn is_unsynchronized(&self) -> bool {
        self.last_synced_at.is_none()
    }
}
