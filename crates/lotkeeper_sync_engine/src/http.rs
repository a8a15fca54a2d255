//! HTTP transport implementation.
//!
//! Maps queue operations onto the remote REST contract: per entity type
//! `E`, `POST /{E}` creates, `PUT /{E}/{id}` updates, `DELETE /{E}/{id}`
//! deletes. Any 2xx is success, 409 carries the current server entity as
//! JSON, everything else is a generic failure.

use crate::error::{SyncError, SyncResult};
use crate::transport::{DispatchOutcome, RemoteTransport};
use async_trait::async_trait;
use lotkeeper_sync_protocol::{Operation, SyncQueueItem};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::debug;

/// A [`RemoteTransport`] over HTTP, with a per-request timeout.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport for the given base URL.
    ///
    /// The timeout applies to every request; an elapsed timeout is
    /// classified as a transient failure.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidTransport(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves the HTTP method and URL for an item.
    ///
    /// Returns `None` when an update or delete has no entity id in its
    /// payload; such an item can never be addressed remotely.
    fn route(&self, item: &SyncQueueItem) -> Option<(Method, String)> {
        match item.operation {
            Operation::Create => Some((
                Method::POST,
                format!("{}/{}", self.base_url, item.entity_type),
            )),
            Operation::Update => item.entity_id().map(|id| {
                (
                    Method::PUT,
                    format!("{}/{}/{}", self.base_url, item.entity_type, id),
                )
            }),
            Operation::Delete => item.entity_id().map(|id| {
                (
                    Method::DELETE,
                    format!("{}/{}/{}", self.base_url, item.entity_type, id),
                )
            }),
        }
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn dispatch(&self, item: &SyncQueueItem) -> DispatchOutcome {
        let Some((method, url)) = self.route(item) else {
            return DispatchOutcome::permanent(format!(
                "{} on {} has no entity id in its payload",
                item.operation, item.entity_type
            ));
        };

        debug!(%method, %url, item = %item.id, "dispatching queue item");

        let mut request = self.client.request(method, &url);
        if matches!(item.operation, Operation::Create | Operation::Update) {
            request = request.json(&item.payload);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return DispatchOutcome::transient(SyncError::Timeout.to_string());
            }
            Err(e) => return DispatchOutcome::transient(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return DispatchOutcome::Completed;
        }

        if status == StatusCode::CONFLICT {
            return match response.json().await {
                Ok(server) => DispatchOutcome::Conflict { server },
                Err(e) => {
                    DispatchOutcome::transient(format!("unreadable 409 body: {e}"))
                }
            };
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            DispatchOutcome::permanent(
                SyncError::Permanent {
                    status: status.as_u16(),
                    message,
                }
                .to_string(),
            )
        } else {
            DispatchOutcome::transient(format!("HTTP {status}: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> HttpTransport {
        HttpTransport::new("https://api.example.com/", Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(transport().base_url(), "https://api.example.com");
    }

    #[test]
    fn create_routes_to_post_collection() {
        let item = SyncQueueItem::new(Operation::Create, "vehicles", json!({"id": "v1"}));
        let (method, url) = transport().route(&item).unwrap();
        assert_eq!(method, Method::POST);
        assert_eq!(url, "https://api.example.com/vehicles");
    }

    #[test]
    fn update_routes_to_put_entity() {
        let item = SyncQueueItem::new(Operation::Update, "parking_sessions", json!({"id": "s1"}));
        let (method, url) = transport().route(&item).unwrap();
        assert_eq!(method, Method::PUT);
        assert_eq!(url, "https://api.example.com/parking_sessions/s1");
    }

    #[test]
    fn delete_routes_to_delete_entity() {
        let item = SyncQueueItem::new(Operation::Delete, "vehicles", json!({"id": "v2"}));
        let (method, url) = transport().route(&item).unwrap();
        assert_eq!(method, Method::DELETE);
        assert_eq!(url, "https://api.example.com/vehicles/v2");
    }

    #[test]
    fn update_without_entity_id_has_no_route() {
        let item = SyncQueueItem::new(Operation::Update, "vehicles", json!({"plate": "AB-123"}));
        assert!(transport().route(&item).is_none());
    }

    #[tokio::test]
    async fn unroutable_item_fails_permanently() {
        let item = SyncQueueItem::new(Operation::Delete, "vehicles", json!({}));
        let outcome = transport().dispatch(&item).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed { permanent: true, .. }
        ));
    }
}
