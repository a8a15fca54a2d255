//! # Lotkeeper Sync Engine
//!
//! Offline-first synchronization between the local store and the remote
//! parking service.
//!
//! Mutations are accepted immediately: `enqueue` persists an item to the
//! durable sync queue and returns before any network activity. A
//! background executor dispatches pending items in submission order
//! whenever the host is online, retries transient failures a fixed number
//! of times with a fixed backoff, and funnels server conflicts (409)
//! through a policy-driven resolver instead of the failure path. After a
//! reload, [`MergeEngine`] folds fresh server snapshots into the cached
//! collections without discarding unsynchronized local changes.
//!
//! ## Key Invariants
//!
//! - An enqueued mutation is durable before the caller observes success
//! - The executor posts exactly one outcome per dispatched item and never
//!   retries internally
//! - A conflict never increments the retry counter and never lands an
//!   item in `Failed`
//! - `last_synced_at` is stamped only after the server confirms a write
//!
//! ## Assembly
//!
//! [`OfflineEngine`] wires the pieces together:
//!
//! ```no_run
//! use lotkeeper_store::StoreConfig;
//! use lotkeeper_sync_engine::{EngineConfig, OfflineEngine};
//! use lotkeeper_sync_protocol::Operation;
//! use serde_json::json;
//!
//! # async fn demo() -> lotkeeper_sync_engine::SyncResult<()> {
//! let engine = OfflineEngine::new(
//!     EngineConfig::new("https://api.example.com"),
//!     StoreConfig::Embedded { dir: "/var/lib/lotkeeper".into() },
//! )
//! .await?;
//!
//! engine.enqueue(
//!     Operation::Create,
//!     "parking_sessions",
//!     json!({"id": "s1", "plate": "AB-123"}),
//! )?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod connectivity;
mod engine;
mod error;
mod executor;
mod http;
mod merge;
mod queue;
mod transport;

pub use config::EngineConfig;
pub use conflict::{ConflictResolver, ResolverAction};
pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use engine::OfflineEngine;
pub use error::{SyncError, SyncResult};
pub use executor::{ExecutorHandle, SyncExecutor};
pub use http::HttpTransport;
pub use merge::{LastSyncedTimestamp, MergeEngine, VersionAuthority};
pub use queue::{EngineEvent, SyncQueueManager};
pub use transport::{DispatchOutcome, MockTransport, RemoteTransport};
