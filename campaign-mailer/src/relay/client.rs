//! HTTP client the dashboard uses to reach the relay.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{BulkEmail, BulkRequest, BulkResponse, HealthReport};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay request to {url} timed out after {} seconds", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("cannot reach relay at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("relay returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid relay response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Relay client. Cheap to clone.
#[derive(Clone)]
pub struct RelayClient {
    inner: Arc<RelayClientInner>,
}

struct RelayClientInner {
    base_url: String,
    http: Client,
    health_timeout: Duration,
    send_timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, health_timeout: Duration, send_timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(RelayClientInner {
                base_url,
                http: Client::new(),
                health_timeout,
                send_timeout,
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// `GET /api/health`.
    pub async fn health(&self) -> Result<HealthReport, RelayError> {
        let url = format!("{}/api/health", self.inner.base_url);
        let timeout = self.inner.health_timeout;
        let request = self.inner.http.get(&url).timeout(timeout);
        self.execute(request, &url, timeout).await
    }

    /// `POST /api/send-bulk`.
    pub async fn send_bulk(&self, emails: Vec<BulkEmail>) -> Result<BulkResponse, RelayError> {
        let url = format!("{}/api/send-bulk", self.inner.base_url);
        let timeout = self.inner.send_timeout;
        let count = emails.len();

        info!(url = %url, count = count, "relay_bulk_request");
        let request = self
            .inner
            .http
            .post(&url)
            .timeout(timeout)
            .json(&BulkRequest { emails });

        let response: BulkResponse = self.execute(request, &url, timeout).await?;
        info!(
            sent = response.summary.sent,
            failed = response.summary.failed,
            "relay_bulk_response"
        );
        Ok(response)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> Result<T, RelayError> {
        let response = request.send().await.map_err(|e| classify(e, url, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status_code = status.as_u16(), "relay_request_failed");
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                classify(e, url, timeout)
            } else {
                RelayError::Decode(e)
            }
        })
    }
}

fn classify(e: reqwest::Error, url: &str, timeout: Duration) -> RelayError {
    if e.is_timeout() {
        warn!(url = %url, timeout_seconds = timeout.as_secs_f64(), "relay_request_timeout");
        RelayError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        warn!(url = %url, error = %e, "relay_request_error");
        RelayError::Unreachable {
            url: url.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::{instant_mock, spawn_relay};

    #[test]
    fn test_base_url_trimmed() {
        let client = RelayClient::new("http://localhost:9000/", Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_health_and_bulk_against_relay() {
        let url = spawn_relay(Some(instant_mock())).await;
        let client = RelayClient::new(url, Duration::from_secs(5), Duration::from_secs(5));

        let health = client.health().await.unwrap();
        assert!(health.email_service.is_usable());

        let response = client
            .send_bulk(vec![BulkEmail {
                contact_id: Some("7".to_string()),
                to: "ada@example.com".to_string(),
                subject: "Hi".to_string(),
                html: "<p>Hi</p>".to_string(),
                text: None,
                sender_name: None,
                reply_to: None,
            }])
            .await
            .unwrap();
        assert_eq!(response.summary.sent, 1);
        assert_eq!(response.results[0].contact_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let url = spawn_relay(Some(instant_mock())).await;
        let client = RelayClient::new(url, Duration::from_secs(5), Duration::from_secs(5));
        let err = client.send_bulk(Vec::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RelayClient::new(format!("http://{addr}"), Duration::from_secs(2), Duration::from_secs(2));
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, RelayError::Unreachable { .. } | RelayError::Timeout { .. }));
    }
}
