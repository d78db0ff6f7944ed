use std::time::Duration;

use chatrouter_adapter::{Adapter, AdapterError, AdapterHealthCounters, AdapterHealthSnapshot};
use chatrouter_core::{AdapterPayload, EventContext, ExecuteRequest, ExecuteResponse};
use google_cloud_auth::credentials::{self, Credentials};
use reqwest::Client;
use tracing::debug;

/// Default timeout for the GCP Function variant (spec.md §4.7: "30 s").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GcpFunctionConfig {
    pub url: String,
    /// Inline service-account JSON key. `None` falls back to Application
    /// Default Credentials (the teacher's `build_gcp_credentials` fallback).
    pub credentials_json: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for GcpFunctionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpFunctionConfig")
            .field("url", &self.url)
            .field("credentials_json", &self.credentials_json.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GcpFunctionConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials_json: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_credentials_json(mut self, json: impl Into<String>) -> Self {
        self.credentials_json = Some(json.into());
        self
    }
}

async fn build_credentials(json: Option<&str>) -> Result<Option<Credentials>, AdapterError> {
    let Some(json) = json else {
        return Ok(None);
    };
    let key_value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| AdapterError::Configuration(format!("invalid GCP credentials JSON: {e}")))?;
    let creds = credentials::service_account::Builder::new(key_value)
        .build()
        .map_err(|e| AdapterError::Configuration(format!("failed to build GCP credentials: {e}")))?;
    Ok(Some(creds))
}

async fn bearer_token(credentials: &Credentials) -> Result<String, AdapterError> {
    let headers = credentials.headers(http::Extensions::new()).await.map_err(|e| {
        AdapterError::Configuration(format!("failed to resolve GCP credentials: {e}"))
    })?;
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_owned())
        .ok_or_else(|| AdapterError::Configuration("GCP credentials produced no Authorization header".into()))
}

/// Adapter variant that invokes a GCP Cloud Function over HTTPS with an
/// OAuth bearer token (spec.md §4.7 GCP Function row).
pub struct GcpFunctionAdapter {
    name: String,
    config: GcpFunctionConfig,
    client: Client,
    credentials: Option<Credentials>,
    counters: AdapterHealthCounters,
}

impl GcpFunctionAdapter {
    pub async fn new(name: impl Into<String>, config: GcpFunctionConfig) -> Result<Self, AdapterError> {
        let credentials = build_credentials(config.credentials_json.as_deref()).await?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            config,
            client,
            credentials,
            counters: AdapterHealthCounters::default(),
        })
    }

    #[must_use]
    pub fn health_snapshot(&self) -> AdapterHealthSnapshot {
        self.counters.snapshot(self.name.clone())
    }
}

impl Adapter for GcpFunctionAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        _ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        let payload = AdapterPayload::from(request);

        debug!(url = %self.config.url, "invoking GCP Function adapter");

        let mut builder = self.client.post(&self.config.url).json(&payload);
        if let Some(credentials) = &self.credentials {
            let token = bearer_token(credentials).await?;
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout
            } else {
                AdapterError::Connection(e.to_string())
            }
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
    fn config_defaults_to_adc_and_thirty_second_timeout() {
        let config = GcpFunctionConfig::new("https://example.com/fn");
        assert!(config.credentials_json.is_none());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = GcpFunctionConfig::new("https://example.com/fn")
            .with_credentials_json(r#"{"type":"service_account"}"#);
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("service_account"));
    }
}
