use std::time::Duration;

use chatrouter_adapter::{Adapter, AdapterError, AdapterHealthCounters, AdapterHealthSnapshot};
use chatrouter_core::{AdapterPayload, EventContext, ExecuteRequest, ExecuteResponse};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Fixed header the Webhook variant signs into (spec.md §4.7: "header name
/// fixed, format `sha256=<hex>`").
pub const SIGNATURE_HEADER: &str = "X-ChatRouter-Signature";

/// Default and hard-cap timeouts for the Webhook variant (spec.md §4.7).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: String,
    pub timeout: Duration,
}

impl WebhookConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: secret.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the request timeout, clamped to the variant's hard cap.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(MAX_TIMEOUT);
        self
    }
}

/// Adapter variant that delivers a request as an HMAC-SHA256-signed HTTP
/// POST (spec.md §4.7 Webhook row).
pub struct WebhookAdapter {
    name: String,
    config: WebhookConfig,
    client: Client,
    counters: AdapterHealthCounters,
}

impl WebhookAdapter {
    pub fn new(name: impl Into<String>, config: WebhookConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            config,
            client,
            counters: AdapterHealthCounters::default(),
        })
    }

    /// For tests: inject a pre-built client (e.g. pointed at a mock server).
    pub fn with_client(name: impl Into<String>, config: WebhookConfig, client: Client) -> Self {
        Self {
            name: name.into(),
            config,
            client,
            counters: AdapterHealthCounters::default(),
        }
    }

    #[must_use]
    pub fn health_snapshot(&self) -> AdapterHealthSnapshot {
        self.counters.snapshot(self.name.clone())
    }

    fn sign(secret: &str, body: &[u8]) -> Result<String, AdapterError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AdapterError::Configuration(format!("invalid HMAC key: {e}")))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Timeout
    } else {
        AdapterError::Connection(err.to_string())
    }
}

impl Adapter for WebhookAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        _ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        let payload = AdapterPayload::from(request);
        let body = serde_json::to_vec(&payload)
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;
        let signature = Self::sign(&self.config.secret, &body)?;

        debug!(url = %self.config.url, "dispatching webhook adapter request");

        let response = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, format!("sha256={signature}"))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "webhook request failed");
                classify_reqwest_error(&e)
            })?;

        let status = response.status().as_u16();

        if !(200..300).contains(&status) {
            self.counters.record_failure(format!("http {status}"));
            return Err(AdapterError::Http(status));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;
        let parsed: ExecuteResponse =
            serde_json::from_value(body).map_err(|e| AdapterError::Serialization(e.to_string()))?;

        if parsed.success {
            self.counters.record_success();
        } else {
            self.counters.record_failure("adapter reported failure");
        }
        Ok(parsed)
    }

    fn health_snapshot(&self) -> Option<AdapterHealthSnapshot> {
        Some(self.health_snapshot())
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.client
            .head(&self.config.url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_is_deterministic_hex() {
        let sig1 = WebhookAdapter::sign("secret", b"hello").unwrap();
        let sig2 = WebhookAdapter::sign("secret", b"hello").unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
        assert!(sig1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sign_differs_by_secret() {
        let sig1 = WebhookAdapter::sign("secret-one", b"hello").unwrap();
        let sig2 = WebhookAdapter::sign("secret-two", b"hello").unwrap();
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn timeout_is_clamped_to_hard_cap() {
        let config = WebhookConfig::new("https://example.com", "s").with_timeout(Duration::from_secs(60));
        assert_eq!(config.timeout, MAX_TIMEOUT);
    }

    #[test]
    fn default_timeout_is_five_seconds() {
        let config = WebhookConfig::new("https://example.com", "s");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
