use std::sync::Arc;

use chatrouter_adapter::AdapterRegistry;
use chatrouter_audit::AuditStore;
use chatrouter_core::CircuitBreakerConfig;
use chatrouter_state::{RateLimiter, ResponseCache, StateStore, UnavailablePolicy};

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::dispatcher::Dispatcher;
use crate::egress::EgressRegistry;
use crate::error::GatewayError;
use crate::permissions::PermissionGate;
use crate::retry::RetryPolicy;

/// Fluent builder for constructing a [`Dispatcher`].
///
/// At minimum, a [`StateStore`], an [`AuditStore`], and a [`PermissionGate`]
/// must be supplied. All other fields have sensible defaults.
pub struct GatewayBuilder {
    state: Option<Arc<dyn StateStore>>,
    audit: Option<Arc<dyn AuditStore>>,
    permissions: Option<Arc<PermissionGate>>,
    adapters: AdapterRegistry,
    egress: EgressRegistry,
    circuit_breaker_config: CircuitBreakerConfig,
    retry_policy: RetryPolicy,
    response_cache_capacity: u64,
    unavailable_policy: UnavailablePolicy,
    command_prefixes: Vec<String>,
}

impl GatewayBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: None,
            audit: None,
            permissions: None,
            adapters: AdapterRegistry::new(),
            egress: EgressRegistry::new(),
            circuit_breaker_config: CircuitBreakerConfig::default(),
            retry_policy: RetryPolicy::default(),
            response_cache_capacity: 10_000,
            unavailable_policy: UnavailablePolicy::default(),
            command_prefixes: vec!["!".to_string()],
        }
    }

    /// Set the shared state store implementation.
    #[must_use]
    pub fn state(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state = Some(store);
        self
    }

    /// Set the audit sink.
    #[must_use]
    pub fn audit(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(store);
        self
    }

    /// Set the permission gate.
    #[must_use]
    pub fn permissions(mut self, gate: Arc<PermissionGate>) -> Self {
        self.permissions = Some(gate);
        self
    }

    /// Register an adapter instance.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn chatrouter_adapter::DynAdapter>) -> Self {
        self.adapters.register(adapter);
        self
    }

    /// Register an egress delivery sink.
    #[must_use]
    pub fn egress_sink(mut self, sink: Arc<dyn crate::egress::EgressSink>) -> Self {
        self.egress.register(sink);
        self
    }

    /// Set the per-adapter circuit breaker configuration.
    #[must_use]
    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    /// Set the adapter retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the response cache's maximum entry count.
    #[must_use]
    pub fn response_cache_capacity(mut self, capacity: u64) -> Self {
        self.response_cache_capacity = capacity;
        self
    }

    /// Set the rate limiter's store-unavailable policy.
    #[must_use]
    pub fn unavailable_policy(mut self, policy: UnavailablePolicy) -> Self {
        self.unavailable_policy = policy;
        self
    }

    /// Set the recognized command prefixes (default `["!"]`).
    #[must_use]
    pub fn command_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.command_prefixes = prefixes;
        self
    }

    /// Consume the builder and produce a configured [`Dispatcher`].
    ///
    /// Returns [`GatewayError::Configuration`] if required fields (state
    /// store, audit sink, permission gate) have not been set.
    pub fn build(self) -> Result<Dispatcher, GatewayError> {
        let state = self
            .state
            .ok_or_else(|| GatewayError::Configuration("state store is required".into()))?;
        let audit = self
            .audit
            .ok_or_else(|| GatewayError::Configuration("audit sink is required".into()))?;
        let permissions = self
            .permissions
            .ok_or_else(|| GatewayError::Configuration("permission gate is required".into()))?;

        Ok(Dispatcher {
            adapters: self.adapters,
            circuit_breakers: CircuitBreakerRegistry::new(self.circuit_breaker_config),
            permissions,
            rate_limiter: RateLimiter::new(state, self.unavailable_policy),
            cache: ResponseCache::new(self.response_cache_capacity),
            egress: self.egress,
            audit,
            retry_policy: self.retry_policy,
            command_prefixes: self.command_prefixes,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chatrouter_state::InMemoryStateStore;

    use super::*;

    #[test]
    fn missing_state_store_is_a_configuration_error() {
        let err = GatewayBuilder::new().build().unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[tokio::test]
    async fn builder_produces_dispatcher_with_required_fields() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let audit: Arc<dyn AuditStore> = Arc::new(
            chatrouter_audit::AuditSink::spawn(16, 4, std::time::Duration::from_millis(10)),
        );
        let codec = chatrouter_core::ScopeEnvelopeCodec::new(b"test-secret-test-secret-32bytes");
        let revocation = Arc::new(chatrouter_state::RevocationList::new(store.clone()));
        let permissions = Arc::new(PermissionGate::new(codec, revocation));

        let result = GatewayBuilder::new()
            .state(store)
            .audit(audit)
            .permissions(permissions)
            .build();
        assert!(result.is_ok());
    }
}
