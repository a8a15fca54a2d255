//! Sync configuration handed to the background executor.

use crate::conflict::ConflictPolicy;
use serde::{Deserialize, Serialize};

/// Default retry cap for a queue item.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed backoff between retry dispatches, milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 5000;

/// Relative priority of a sync batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPriority {
    /// Opportunistic background sync.
    Low,
    /// Regular dispatch triggered by enqueue or reconnect.
    #[default]
    Normal,
    /// User-initiated sync (manual retry, explicit refresh).
    High,
}

/// Configuration for a sync pass, carried inside the [`crate::StartSync`]
/// request so the executor needs no other shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Interval between automatic sync passes, milliseconds.
    pub sync_interval_ms: u64,
    /// Batch priority.
    pub priority: SyncPriority,
    /// Policy applied when the server reports a conflict.
    pub conflict_resolution: ConflictPolicy,
    /// Retry cap applied to items in this batch.
    pub retry_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 30_000,
            priority: SyncPriority::Normal,
            conflict_resolution: ConflictPolicy::Server,
            retry_attempts: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SyncConfig {
    /// Sets the batch priority.
    pub fn with_priority(mut self, priority: SyncPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the conflict resolution policy.
    pub fn with_conflict_resolution(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_resolution = policy;
        self
    }

    /// Sets the retry cap.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }
}
