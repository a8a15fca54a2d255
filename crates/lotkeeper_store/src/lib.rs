//! # Lotkeeper Store
//!
//! Durable local storage for Lotkeeper's offline-first client.
//!
//! The store holds the cached entity collections (parking sessions,
//! vehicles, settings) and the sync queue itself, and survives process
//! restarts. Writes are transactionally atomic: a record is either fully
//! visible or not visible at all.
//!
//! ## Backends
//!
//! The backend is selected **once at construction** via [`StoreConfig`],
//! never via runtime feature detection inside business logic:
//!
//! - [`EmbeddedStore`] - file-backed JSON snapshots, atomic rename per write
//! - [`HostManagedStore`] - SQLite via `rusqlite`, transactional mutations
//! - [`MemoryStore`] - in-memory, for tests and ephemeral use
//!
//! ## Initialization
//!
//! [`StoreContext`] carries a memoized initialization future: concurrent
//! callers before the store is ready all await the same outcome rather
//! than racing to open storage multiple times. If the backing storage
//! cannot be opened, initialization fails with [`StoreError::Unavailable`]
//! and every dependent operation propagates that failure.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod context;
mod embedded;
mod error;
mod host;
mod memory;
mod record;

pub use backend::StoreBackend;
pub use context::{StoreConfig, StoreContext};
pub use embedded::EmbeddedStore;
pub use error::{StoreError, StoreResult};
pub use host::HostManagedStore;
pub use memory::MemoryStore;
pub use record::{Collection, StoredRecord};
