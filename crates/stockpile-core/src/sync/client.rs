//! HTTP transport for delivering queued actions.

use std::future::Future;
use std::time::Duration;

use serde_json::json;

use crate::error::{Error, Result};
use crate::models::QueuedAction;
use crate::util::{is_http_url, normalize_text_option};

/// Transport for delivering a single action to the remote endpoint.
///
/// Success is at-least-once: the same action may be pushed again if a reply
/// is lost, so the receiving side should treat deliveries as idempotent.
/// The future is `Send` so the engine can run deliveries from spawned
/// retry tasks.
pub trait ActionTransport {
    /// Deliver one action. `Ok(())` means the endpoint accepted it.
    fn push(&self, action: &QueuedAction) -> impl Future<Output = Result<()>> + Send;
}

/// reqwest-backed `ActionTransport` POSTing JSON to the sync endpoint.
#[derive(Clone)]
pub struct HttpSyncClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSyncClient {
    /// Build a client for the given endpoint with a bounded per-request
    /// timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Configuration(error.to_string()))?;

        Ok(Self { endpoint, client })
    }

    /// The normalized endpoint this client delivers to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ActionTransport for HttpSyncClient {
    async fn push(&self, action: &QueuedAction) -> Result<()> {
        let body = json!({
            "id": action.id.to_string(),
            "type": action.action_type.as_str(),
            "data": action.payload,
            "timestamp": action.enqueued_at,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|error| Error::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
            });
        }

        // Success is determined by the status code alone; the body is
        // parsed and discarded.
        response.json::<serde_json::Value>().await.ok();
        Ok(())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Configuration("endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::Configuration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("   ".to_string()).is_err());
        assert!(normalize_endpoint("sync.example.com".to_string()).is_err());
    }

    #[test]
    fn normalize_endpoint_trims_trailing_slash() {
        let client =
            HttpSyncClient::new("https://sync.example.com/v1/actions/", Duration::from_secs(10))
                .unwrap();
        assert_eq!(client.endpoint(), "https://sync.example.com/v1/actions");
    }
}
