use std::time::Duration;

use async_trait::async_trait;
use chatrouter_core::{Entity, ExecuteResponse};
use chatrouter_gateway::EgressSink;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Same fixed signature header the Webhook adapter variant uses, so a
/// single downstream verifier can validate both inbound adapter calls and
/// outbound egress deliveries.
pub const SIGNATURE_HEADER: &str = "X-ChatRouter-Signature";

#[derive(Serialize)]
struct WebhookEgressBody<'a> {
    entity: &'a Entity,
    response: &'a ExecuteResponse,
}

/// An [`EgressSink`] that posts the response as an HMAC-SHA256-signed JSON
/// body, one instance per configured platform (spec.md §4.9: "delivery
/// adapters live outside the router core").
pub struct WebhookEgressSink {
    platform: String,
    url: String,
    secret: String,
    client: Client,
}

impl WebhookEgressSink {
    pub fn new(
        platform: impl Into<String>,
        url: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            platform: platform.into(),
            url: url.into(),
            secret: secret.into(),
            client,
        })
    }

    fn sign(&self, body: &[u8]) -> Result<String, String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| format!("invalid HMAC key: {e}"))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl EgressSink for WebhookEgressSink {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn send(&self, entity: &Entity, response: &ExecuteResponse) -> Result<(), String> {
        let body = serde_json::to_vec(&WebhookEgressBody { entity, response })
            .map_err(|e| format!("failed to serialize egress body: {e}"))?;
        let signature = self.sign(&body)?;

        debug!(platform = %self.platform, url = %self.url, "delivering egress webhook");

        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, format!("sha256={signature}"))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(platform = %self.platform, error = %e, "egress webhook delivery failed");
                e.to_string()
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("egress webhook returned http {status}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_body_deterministically() {
        let sink =
            WebhookEgressSink::new("discord", "https://example.com/hook", "secret", Duration::from_secs(5))
                .unwrap();
        let sig1 = sink.sign(b"hello").unwrap();
        let sig2 = sink.sign(b"hello").unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
    }

    #[test]
    fn platform_name_matches_construction() {
        let sink =
            WebhookEgressSink::new("twitch", "https://example.com/hook", "secret", Duration::from_secs(5))
                .unwrap();
        assert_eq!(sink.platform(), "twitch");
    }
}
