//! Error types for the sync engine.

use lotkeeper_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in the sync engine.
///
/// Local persistence failures are fatal to the triggering call and surface
/// through these variants. Network-phase failures never propagate to
/// collaborators as errors; they are funneled into queue-item state and
/// engine events instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A mutation could not be persisted locally. Surfaced synchronously
    /// to the caller of `enqueue`.
    #[error("enqueue failed: {0}")]
    EnqueueFailed(#[source] StoreError),

    /// The durable local store failed or is unavailable.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A dispatch attempt failed in a way that is expected to succeed on
    /// retry (connection loss, 5xx, timeout).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// A non-409 response that will not succeed on retry (e.g. a
    /// validation rejection). Still enters the standard retry counter,
    /// but distinguishable in logs.
    #[error("permanent remote error (HTTP {status}): {message}")]
    Permanent {
        /// HTTP status code.
        status: u16,
        /// Response detail.
        message: String,
    },

    /// The remote call exceeded the configured per-request timeout.
    #[error("request timed out")]
    Timeout,

    /// The transport could not be constructed.
    #[error("transport configuration error: {0}")]
    InvalidTransport(String),

    /// The background executor task is no longer running.
    #[error("sync executor is gone")]
    ExecutorGone,

    /// A persisted queue item could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No queue item with this id exists.
    #[error("queue item not found: {0}")]
    ItemNotFound(Uuid),

    /// No open conflict is held for this queue item.
    #[error("no open conflict for queue item {0}")]
    ConflictNotFound(Uuid),
}

impl SyncError {
    /// Returns true if a dispatch failing with this error is expected to
    /// succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::TransientNetwork(_) | SyncError::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::TransientNetwork("connection reset".into()).is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(!SyncError::Permanent {
            status: 422,
            message: "validation failed".into()
        }
        .is_retryable());
        assert!(!SyncError::ExecutorGone.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Permanent {
            status: 400,
            message: "bad plate".into(),
        };
        assert_eq!(
            err.to_string(),
            "permanent remote error (HTTP 400): bad plate"
        );
    }
}
