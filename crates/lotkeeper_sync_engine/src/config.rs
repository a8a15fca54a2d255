//! Engine configuration.

use lotkeeper_sync_protocol::{
    ConflictPolicy, SyncConfig, SyncPriority, DEFAULT_BACKOFF_MS, DEFAULT_MAX_RETRIES,
};
use std::time::Duration;

/// Configuration for the sync engine.
///
/// All retry policy lives here (and thus in the queue manager); the
/// background executor receives a derived [`SyncConfig`] inside each
/// request and holds no other state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the remote service, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Retry cap per queue item.
    pub max_retries: u32,
    /// Fixed delay before a failed item is re-dispatched.
    pub retry_backoff: Duration,
    /// Per-request timeout for remote calls.
    pub request_timeout: Duration,
    /// Policy applied when the server reports a conflict.
    pub conflict_resolution: ConflictPolicy,
    /// Interval between automatic sync passes.
    pub sync_interval: Duration,
    /// Priority attached to dispatched batches.
    pub priority: SyncPriority,
}

impl EngineConfig {
    /// Creates a configuration with the documented defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            request_timeout: Duration::from_secs(30),
            conflict_resolution: ConflictPolicy::Server,
            sync_interval: Duration::from_secs(30),
            priority: SyncPriority::Normal,
        }
    }

    /// Sets the retry cap.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the fixed retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the conflict resolution policy.
    pub fn with_conflict_resolution(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_resolution = policy;
        self
    }

    /// Sets the batch priority.
    pub fn with_priority(mut self, priority: SyncPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Derives the per-batch configuration handed to the executor.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            sync_interval_ms: self.sync_interval.as_millis() as u64,
            priority: self.priority,
            conflict_resolution: self.conflict_resolution,
            retry_attempts: self.max_retries,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let config = EngineConfig::new("https://api.example.com");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(5000));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.conflict_resolution, ConflictPolicy::Server);
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::new("https://api.example.com")
            .with_max_retries(5)
            .with_retry_backoff(Duration::from_millis(100))
            .with_conflict_resolution(ConflictPolicy::Manual);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_backoff, Duration::from_millis(100));
        assert_eq!(config.conflict_resolution, ConflictPolicy::Manual);
    }

    #[test]
    fn derived_sync_config() {
        let config = EngineConfig::new("x").with_max_retries(4);
        let sync = config.sync_config();
        assert_eq!(sync.retry_attempts, 4);
        assert_eq!(sync.sync_interval_ms, 30_000);
    }
}
