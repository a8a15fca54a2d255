//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the durable local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage could not be opened. Fatal to all engine
    /// operations until resolved.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The named collection is not one of the known collections.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Another process holds the store directory lock.
    #[error("store directory is locked: {0}")]
    Locked(String),
}
