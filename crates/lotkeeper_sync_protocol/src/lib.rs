//! # Lotkeeper Sync Protocol
//!
//! Data model and message protocol for Lotkeeper's offline-first sync engine.
//!
//! This crate provides:
//! - The durable queue item model ([`SyncQueueItem`], [`QueueItemStatus`])
//! - Mutation operations ([`Operation`])
//! - Conflict records and resolution policies ([`ConflictRecord`], [`ConflictPolicy`])
//! - The request/response messages exchanged between the queue manager and
//!   the background sync executor ([`StartSync`], [`SyncOutcome`])
//! - The sync configuration handed to the executor ([`SyncConfig`])
//!
//! ## Key invariants
//!
//! - A queue item's `id` is unique for the lifetime of the queue
//! - Status only moves pending → in-flight → {completed | pending (retry) | failed}
//! - `retry_count` never exceeds `max_retries`
//! - The executor posts exactly one [`SyncOutcome`] per item it receives
//!
//! All message types serialize to the `{ "type": ..., "data": ... }` shape
//! used on the wire between the two execution contexts.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod item;
mod messages;
mod operation;

pub use config::{SyncConfig, SyncPriority, DEFAULT_BACKOFF_MS, DEFAULT_MAX_RETRIES};
pub use conflict::{ConflictPolicy, ConflictRecord, ManualChoice};
pub use item::{QueueItemStatus, SyncQueueItem};
pub use messages::{StartSync, SyncOutcome};
pub use operation::{Operation, ParseOperationError};
