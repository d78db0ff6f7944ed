use std::time::Duration;

use chatrouter_adapter::{Adapter, AdapterError, AdapterHealthCounters, AdapterHealthSnapshot};
use chatrouter_core::{AdapterPayload, EventContext, ExecuteRequest, ExecuteResponse};
use reqwest::Client;
use tracing::debug;

/// Default timeout for the `OpenWhisk` variant (spec.md §4.7: "30 s").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct OpenWhiskConfig {
    /// Base URL of the `OpenWhisk` API host, e.g. `https://openwhisk.example.com`.
    pub api_host: String,
    pub namespace: String,
    pub action_name: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenWhiskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWhiskConfig")
            .field("api_host", &self.api_host)
            .field("namespace", &self.namespace)
            .field("action_name", &self.action_name)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenWhiskConfig {
    #[must_use]
    pub fn new(
        api_host: impl Into<String>,
        namespace: impl Into<String>,
        action_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            namespace: namespace.into(),
            action_name: action_name.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn invoke_url(&self) -> String {
        format!(
            "{}/api/v1/namespaces/{}/actions/{}?blocking=true&result=true",
            self.api_host.trim_end_matches('/'),
            self.namespace,
            self.action_name
        )
    }
}

/// Adapter variant that invokes an `OpenWhisk` action over its REST API
/// with HTTP basic auth (spec.md §4.7 `OpenWhisk` row).
pub struct OpenWhiskAdapter {
    name: String,
    config: OpenWhiskConfig,
    client: Client,
    counters: AdapterHealthCounters,
}

impl OpenWhiskAdapter {
    pub fn new(name: impl Into<String>, config: OpenWhiskConfig) -> Result<Self, AdapterError> {
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

    #[must_use]
    pub fn health_snapshot(&self) -> AdapterHealthSnapshot {
        self.counters.snapshot(self.name.clone())
    }
}

impl Adapter for OpenWhiskAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        _ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        let payload = AdapterPayload::from(request);

        debug!(action = %self.config.action_name, "invoking OpenWhisk adapter");

        let response = self
            .client
            .post(self.config.invoke_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
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
            .get(format!(
                "{}/api/v1/namespaces/{}",
                self.config.api_host.trim_end_matches('/'),
                self.config.namespace
            ))
            .basic_auth(&self.config.username, Some(&self.config.password))
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
    fn invoke_url_is_blocking_and_result_mode() {
        let config = OpenWhiskConfig::new(
            "https://openwhisk.example.com",
            "guest",
            "hello",
            "user",
            "pass",
        );
        assert_eq!(
            config.invoke_url(),
            "https://openwhisk.example.com/api/v1/namespaces/guest/actions/hello?blocking=true&result=true"
        );
    }

    #[test]
    fn debug_redacts_password() {
        let config = OpenWhiskConfig::new("https://host", "ns", "action", "user", "s3cret");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("s3cret"));
    }
}
