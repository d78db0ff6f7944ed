use std::sync::Arc;

use chatrouter_adapter::{AdapterHealthSnapshot, AdapterRegistry};
use chatrouter_audit::{AuditDecision, AuditRecord, AuditStore};
use chatrouter_core::{
    CircuitState, EgressResult, EgressStatus, EgressTarget, Event, EventContext, ExecuteRequest,
    ExecuteResponse, RouteBinding, RouterError, TargetSelection,
};
use chatrouter_resolver::{resolve, RouteTable};
use chatrouter_state::{compute_fingerprint, BucketParams, KeyKind, RateLimiter, ResponseCache, StateKey};
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreakerRegistry, Permit};
use crate::egress::EgressRegistry;
use crate::permissions::PermissionGate;
use crate::retry::{retry_with_backoff, FailureClass, RetryPolicy};

/// Wires together the resolver, permission gate, rate limiter, response
/// cache, adapter registry, circuit breakers, retry policy, egress
/// fan-out, and audit sink into the per-event dispatch pipeline (spec.md
/// §4.6, §5).
pub struct Dispatcher {
    pub(crate) adapters: AdapterRegistry,
    pub(crate) circuit_breakers: CircuitBreakerRegistry,
    pub(crate) permissions: Arc<PermissionGate>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) cache: ResponseCache,
    pub(crate) egress: EgressRegistry,
    pub(crate) audit: Arc<dyn AuditStore>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) command_prefixes: Vec<String>,
}

impl Dispatcher {
    /// Resolve `event` against `table` and dispatch every surviving route,
    /// returning the egress results of every target actually attempted.
    /// An empty route match is the `no-route` case and returns `Ok(vec![])`
    /// after an audit write, not an error (spec.md §4.2).
    pub async fn dispatch(
        &self,
        event: &Event,
        table: &RouteTable,
        ctx: &EventContext,
    ) -> Result<Vec<EgressResult>, RouterError> {
        let bindings = resolve(event, table, &self.command_prefixes);
        if bindings.is_empty() {
            self.audit(event, None, AuditDecision::NoRoute, serde_json::json!({}))
                .await;
            return Ok(Vec::new());
        }

        let (ordered, unordered): (Vec<_>, Vec<_>) =
            bindings.into_iter().partition(|b| b.route.ordered);

        let mut results = Vec::new();
        for binding in ordered {
            results.extend(self.process_binding(event, binding, ctx).await);
        }

        let unordered_futures = unordered
            .into_iter()
            .map(|binding| self.process_binding(event, binding, ctx));
        let unordered_results = futures::future::join_all(unordered_futures).await;
        results.extend(unordered_results.into_iter().flatten());

        Ok(results)
    }

    /// Names of every registered adapter, for `/healthz` reporting.
    #[must_use]
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.list()
    }

    /// Rolling health counters for a registered adapter, if it tracks them.
    /// `None` if `adapter` isn't registered or doesn't expose a snapshot.
    #[must_use]
    pub fn adapter_health(&self, adapter: &str) -> Option<AdapterHealthSnapshot> {
        self.adapters.get(adapter)?.health_snapshot()
    }

    /// Current circuit-breaker state for `adapter`. Creates the breaker
    /// (in `Closed` state) if none has been consulted yet, so this never
    /// fails for the purpose of a health report.
    #[must_use]
    pub async fn circuit_state(&self, adapter: &str) -> CircuitState {
        self.circuit_breakers.get_or_create(adapter).state().await
    }

    async fn process_binding(
        &self,
        event: &Event,
        binding: RouteBinding,
        ctx: &EventContext,
    ) -> Vec<EgressResult> {
        let route_id = binding.route.id.clone();

        if ctx.is_expired() {
            self.audit(
                event,
                Some(&route_id),
                AuditDecision::DeadlineExceeded,
                serde_json::json!({}),
            )
            .await;
            return Vec::new();
        }

        self.audit(event, Some(&route_id), AuditDecision::Routed, serde_json::json!({}))
            .await;

        let (granted_scopes, envelope) = match self
            .permissions
            .authorize(&event.community_id, &binding.route.module, &binding.route.required_scopes)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                self.audit(
                    event,
                    Some(&route_id),
                    AuditDecision::DeniedPerm,
                    serde_json::json!({ "error": err.to_string() }),
                )
                .await;
                return Vec::new();
            }
        };

        let (capacity, refill) = binding.route.rate_limit_class.default_bucket_params();
        let module_key = StateKey::new(
            event.community_id.clone(),
            KeyKind::RateLimit,
            format!("mod:{}", binding.route.module),
        );
        let principal_key = StateKey::new(
            event.community_id.clone(),
            KeyKind::RateLimit,
            format!("user:{}", event.user.id),
        );
        let params = BucketParams {
            capacity,
            refill_per_second: refill,
        };
        let decision = self
            .rate_limiter
            .check_dual(&module_key, params, &principal_key, params)
            .await;
        if let chatrouter_state::RateLimitDecision::Denied { bucket_id } = decision {
            self.audit(
                event,
                Some(&route_id),
                AuditDecision::DeniedRate,
                serde_json::json!({ "bucket_id": bucket_id }),
            )
            .await;
            return Vec::new();
        }

        let request = ExecuteRequest::new(
            event.community_id.clone(),
            event.user.clone(),
            event.entity.clone(),
            binding.route.module.clone(),
            binding.matched_command.clone(),
            binding.context_text.clone(),
            granted_scopes,
            envelope,
        );

        let response = if binding.route.cache_policy.is_enabled() {
            self.dispatch_cached(event, &binding, &request, ctx).await
        } else {
            self.dispatch_uncached(event, &binding, &request, ctx).await
        };

        self.fan_out(event, &binding, &response).await
    }

    async fn dispatch_cached(
        &self,
        event: &Event,
        binding: &RouteBinding,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> ExecuteResponse {
        let role_bucket = "default";
        let user_scoped = binding
            .route
            .cache_policy
            .user_scoped
            .then_some(event.user.id.as_str());
        let fingerprint = compute_fingerprint(
            &event.community_id,
            &binding.route.module,
            &request.command,
            &request.context_text,
            role_bucket,
            user_scoped,
        );

        let cache_failures = binding.route.cache_policy.cache_failures;
        let ttl = binding.route.cache_policy.ttl.unwrap_or_default();

        let computed_fresh = std::sync::atomic::AtomicBool::new(false);
        let result = self
            .cache
            .get_or_compute(&fingerprint, || async {
                computed_fresh.store(true, std::sync::atomic::Ordering::SeqCst);
                let response = self.execute_with_resilience(event, binding, request, ctx).await;
                let entry_ttl = if response.is_cacheable(cache_failures) {
                    ttl
                } else {
                    std::time::Duration::ZERO
                };
                Ok::<_, String>((response, entry_ttl))
            })
            .await;

        match result {
            Ok(response) => {
                if !computed_fresh.load(std::sync::atomic::Ordering::SeqCst) {
                    self.audit(
                        event,
                        Some(&binding.route.id),
                        AuditDecision::CacheHit,
                        serde_json::json!({ "fingerprint": fingerprint }),
                    )
                    .await;
                }
                response
            }
            Err(err) => ExecuteResponse::failure(format!("cache compute failed: {err}")),
        }
    }

    async fn dispatch_uncached(
        &self,
        event: &Event,
        binding: &RouteBinding,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> ExecuteResponse {
        self.execute_with_resilience(event, binding, request, ctx).await
    }

    /// Circuit breaker + retry guarded adapter call (spec.md §4.6 steps
    /// 2-5, §4.8: "the breaker is consulted before retry logic").
    async fn execute_with_resilience(
        &self,
        event: &Event,
        binding: &RouteBinding,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> ExecuteResponse {
        let module = binding.route.module.as_str();
        let Some(adapter) = self.adapters.get(module) else {
            self.audit(
                event,
                Some(&binding.route.id),
                AuditDecision::Failed,
                serde_json::json!({ "error": "unknown function" }),
            )
            .await;
            return ExecuteResponse::failure(format!("unknown adapter for module {module}"));
        };

        let breaker = self.circuit_breakers.get_or_create(module);
        if breaker.try_acquire_permit().await == Permit::Denied {
            self.audit(
                event,
                Some(&binding.route.id),
                AuditDecision::Failed,
                serde_json::json!({ "error": "circuit open" }),
            )
            .await;
            return ExecuteResponse::failure("circuit open");
        }

        let retry_fut = retry_with_backoff(
            &self.retry_policy,
            |_attempt| {
                let adapter = adapter.clone();
                async move { adapter.execute(request, ctx).await }
            },
            FailureClass::from_adapter_error,
        );

        // Bound the whole retry sequence (every attempt plus backoff sleeps)
        // by the event's remaining deadline, and let an explicit cancel win
        // the same way. Whichever branch loses is dropped, which cancels any
        // adapter call still in flight (spec.md §5, §8 S7).
        let outcome = tokio::select! {
            result = retry_fut => Some(result),
            () = tokio::time::sleep(ctx.remaining()) => None,
            () = ctx.cancellation_token().cancelled() => None,
        };

        match outcome {
            Some(Ok(response)) => {
                breaker.record_success().await;
                self.audit(
                    event,
                    Some(&binding.route.id),
                    AuditDecision::Dispatched,
                    serde_json::json!({ "success": response.success }),
                )
                .await;
                response
            }
            Some(Err(err)) => {
                if FailureClass::from_adapter_error(&err) == FailureClass::Transient {
                    breaker.record_failure().await;
                }
                self.audit(
                    event,
                    Some(&binding.route.id),
                    AuditDecision::Failed,
                    serde_json::json!({ "error": err.to_string() }),
                )
                .await;
                ExecuteResponse::failure(err.to_string())
            }
            None => {
                breaker.record_failure().await;
                self.audit(
                    event,
                    Some(&binding.route.id),
                    AuditDecision::DeadlineExceeded,
                    serde_json::json!({ "adapter": module }),
                )
                .await;
                ExecuteResponse::failure("deadline exceeded")
            }
        }
    }

    /// Forward a response to every target it declares, each independently,
    /// recording a per-target `egress-result` audit row (spec.md §4.9:
    /// "failures on one target do not cancel others").
    ///
    /// The response's own `targets` list drives fan-out when the adapter set
    /// one (spec.md §4.9: "each `ExecuteResponse` carries a target list; the
    /// egress component resolves each target") -- an `Explicit` route narrows
    /// that list to its declared platform set, a `SameAsOrigin` route takes it
    /// as-is. Only when the response names no targets does the route's static
    /// `target_selection` supply the fan-out list on its own.
    async fn fan_out(
        &self,
        event: &Event,
        binding: &RouteBinding,
        response: &ExecuteResponse,
    ) -> Vec<EgressResult> {
        let targets = if response.targets.is_empty() {
            match &binding.route.target_selection {
                TargetSelection::SameAsOrigin => {
                    vec![EgressTarget::Platform(event.platform.to_string())]
                }
                TargetSelection::Explicit { platforms } => platforms
                    .iter()
                    .cloned()
                    .map(EgressTarget::Platform)
                    .collect(),
            }
        } else {
            match &binding.route.target_selection {
                TargetSelection::SameAsOrigin => response.targets.clone(),
                TargetSelection::Explicit { platforms } => response
                    .targets
                    .iter()
                    .filter(|target| platforms.iter().any(|p| p == target.platform_name()))
                    .cloned()
                    .collect(),
            }
        };

        let mut results = Vec::with_capacity(targets.len());
        for target in &targets {
            let platform = target.platform_name();
            let result = match self.egress.get(platform) {
                Some(sink) => match sink.send(&event.entity, response).await {
                    Ok(()) => EgressResult {
                        platform: platform.to_owned(),
                        status: EgressStatus::Ok,
                        error: None,
                    },
                    Err(error) => EgressResult {
                        platform: platform.to_owned(),
                        status: EgressStatus::Failed,
                        error: Some(error),
                    },
                },
                None => {
                    warn!(platform, "no egress sink registered");
                    EgressResult {
                        platform: platform.to_owned(),
                        status: EgressStatus::Failed,
                        error: Some("no egress sink registered".into()),
                    }
                }
            };
            self.audit(
                event,
                Some(&binding.route.id),
                AuditDecision::EgressResult,
                serde_json::json!({ "platform": &result.platform, "status": result.status }),
            )
            .await;
            results.push(result);
        }
        results
    }

    async fn audit(
        &self,
        event: &Event,
        route_id: Option<&str>,
        decision: AuditDecision,
        outcome_details: serde_json::Value,
    ) {
        let mut record = AuditRecord::new(
            event.id.clone(),
            event.correlation_id.clone(),
            event.community_id.to_string(),
            decision,
            outcome_details,
        );
        if let Some(route_id) = route_id {
            record = record.with_route(route_id);
        }
        if let Err(err) = self.audit.record(record).await {
            debug!(?err, "audit sink unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chatrouter_adapter::{Adapter, AdapterError};
    use chatrouter_core::{
        CachePolicy, CircuitBreakerConfig, CommunityId, Entity, ModuleId, Principal, RateLimitClass,
        Route, RoutePattern, Scope, ScopeEnvelopeCodec, ScopeGrant, TargetSelection,
    };
    use chatrouter_state::{InMemoryStateStore, RateLimiter, StateStore, UnavailablePolicy};
    use chrono::Utc;

    use super::*;
    use crate::egress::EgressSink;

    struct EchoAdapter {
        calls: AtomicUsize,
    }

    impl Adapter for EchoAdapter {
        fn name(&self) -> &str {
            "weather"
        }

        async fn execute(
            &self,
            _request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExecuteResponse::success("sunny", vec![]))
        }

        async fn health_check(&self) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    struct RecordingSink {
        platform: String,
        sent: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new(platform: &str) -> Self {
            Self {
                platform: platform.to_owned(),
                sent: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EgressSink for RecordingSink {
        fn platform(&self) -> &str {
            &self.platform
        }

        async fn send(&self, _entity: &Entity, response: &ExecuteResponse) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push(response.message.clone().unwrap_or_default());
            Ok(())
        }
    }

    /// Returns `targets` on every call, so fan-out over a response's own
    /// target list (spec.md §8 S6) can be exercised directly.
    struct MultiTargetAdapter {
        targets: Vec<EgressTarget>,
    }

    impl Adapter for MultiTargetAdapter {
        fn name(&self) -> &str {
            "weather"
        }

        async fn execute(
            &self,
            _request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            Ok(ExecuteResponse::success("multi", self.targets.clone()))
        }

        async fn health_check(&self) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    /// Never returns, so the deadline/cancellation race in
    /// `execute_with_resilience` can be exercised (spec.md §8 S7).
    struct HangingAdapter;

    impl Adapter for HangingAdapter {
        fn name(&self) -> &str {
            "weather"
        }

        async fn execute(
            &self,
            _request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            std::future::pending().await
        }

        async fn health_check(&self) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    fn weather_route() -> Route {
        Route {
            id: "weather-route".into(),
            pattern: RoutePattern::Exact {
                command: "weather".into(),
            },
            module: "weather".into(),
            required_scopes: vec![Scope::new("weather.read")],
            rate_limit_class: RateLimitClass::Chatty,
            cache_policy: CachePolicy::disabled(),
            target_selection: TargetSelection::SameAsOrigin,
            priority: 0,
            ordered: false,
        }
    }

    fn principal() -> Principal {
        Principal {
            id: "u1".into(),
            username: "alice".into(),
            platform_user_id: "p1".into(),
        }
    }

    fn make_dispatcher(adapter: Arc<dyn chatrouter_adapter::DynAdapter>, egress: Vec<Arc<dyn EgressSink>>) -> Dispatcher {
        let codec = ScopeEnvelopeCodec::new(b"test-secret-test-secret-32bytes");
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let revocation = Arc::new(chatrouter_state::RevocationList::new(store.clone()));
        let permissions = Arc::new(PermissionGate::new(codec.clone(), revocation));
        let token = codec
            .sign(
                "jti-1",
                CommunityId::new("c1"),
                ModuleId::new("weather"),
                vec!["weather.read".into()],
                60,
            )
            .unwrap();
        permissions.set_grant(
            ScopeGrant {
                community_id: CommunityId::new("c1"),
                module: ModuleId::new("weather"),
                scopes: vec![Scope::new("weather.read")],
                granted_by: "admin".into(),
                granted_at: Utc::now(),
            },
            token,
        );

        let mut adapters = AdapterRegistry::new();
        adapters.register(adapter);

        let mut egress_registry = EgressRegistry::new();
        for sink in egress {
            egress_registry.register(sink);
        }

        Dispatcher {
            adapters,
            circuit_breakers: CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
            permissions,
            rate_limiter: RateLimiter::new(store, UnavailablePolicy::FailClosed),
            cache: ResponseCache::new(100),
            egress: egress_registry,
            audit: Arc::new(chatrouter_audit::AuditSink::spawn(64, 8, Duration::from_millis(20))),
            retry_policy: RetryPolicy::default(),
            command_prefixes: vec!["!".to_string()],
        }
    }

    #[tokio::test]
    async fn no_route_returns_empty_without_error() {
        let sink = Arc::new(RecordingSink::new("discord"));
        let dispatcher = make_dispatcher(
            Arc::new(EchoAdapter {
                calls: AtomicUsize::new(0),
            }),
            vec![sink],
        );
        let table = RouteTable::build(vec![], 1);
        let event = chatrouter_core::Event::new_command(
            CommunityId::new("c1"),
            "discord",
            "chan1",
            principal(),
            "!unknown",
        );
        let ctx = EventContext::with_default_deadline(&event.correlation_id);
        let results = dispatcher.dispatch(&event, &table, &ctx).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn successful_dispatch_fans_out_to_egress() {
        let sink = Arc::new(RecordingSink::new("discord"));
        let dispatcher = make_dispatcher(
            Arc::new(EchoAdapter {
                calls: AtomicUsize::new(0),
            }),
            vec![sink.clone()],
        );
        let table = RouteTable::build(vec![weather_route()], 1);
        let event = chatrouter_core::Event::new_command(
            CommunityId::new("c1"),
            "discord",
            "chan1",
            principal(),
            "!weather London",
        );
        let ctx = EventContext::with_default_deadline(&event.correlation_id);
        let results = dispatcher.dispatch(&event, &table, &ctx).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, EgressStatus::Ok);
        assert_eq!(sink.sent.lock().unwrap().as_slice(), ["sunny".to_string()]);
    }

    #[tokio::test]
    async fn response_targets_drive_fan_out_to_multiple_platforms() {
        let discord = Arc::new(RecordingSink::new("discord"));
        let twitch = Arc::new(RecordingSink::new("twitch"));
        let dispatcher = make_dispatcher(
            Arc::new(MultiTargetAdapter {
                targets: vec![
                    EgressTarget::Platform("discord".into()),
                    EgressTarget::Platform("twitch".into()),
                ],
            }),
            vec![discord.clone(), twitch.clone()],
        );
        let table = RouteTable::build(vec![weather_route()], 1);
        let event = chatrouter_core::Event::new_command(
            CommunityId::new("c1"),
            "discord",
            "chan1",
            principal(),
            "!weather London",
        );
        let ctx = EventContext::with_default_deadline(&event.correlation_id);
        let results = dispatcher.dispatch(&event, &table, &ctx).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == EgressStatus::Ok));
        assert_eq!(discord.sent.lock().unwrap().as_slice(), ["multi".to_string()]);
        assert_eq!(twitch.sent.lock().unwrap().as_slice(), ["multi".to_string()]);
    }

    #[tokio::test]
    async fn hanging_adapter_is_cancelled_at_deadline() {
        let sink = Arc::new(RecordingSink::new("discord"));
        let dispatcher = make_dispatcher(Arc::new(HangingAdapter), vec![sink.clone()]);
        let table = RouteTable::build(vec![weather_route()], 1);
        let event = chatrouter_core::Event::new_command(
            CommunityId::new("c1"),
            "discord",
            "chan1",
            principal(),
            "!weather London",
        );
        let ctx = EventContext::new(&event.correlation_id, Duration::from_millis(50));
        let started = std::time::Instant::now();
        let results = dispatcher.dispatch(&event, &table, &ctx).await.unwrap();
        // The hang is cut off at the deadline rather than running until some
        // much longer adapter-side transport timeout.
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, EgressStatus::Ok);
    }

    #[tokio::test]
    async fn missing_grant_denies_before_dispatch() {
        let sink = Arc::new(RecordingSink::new("discord"));
        let dispatcher = make_dispatcher(
            Arc::new(EchoAdapter {
                calls: AtomicUsize::new(0),
            }),
            vec![sink.clone()],
        );
        // Reissue a dispatcher whose permission gate never received a grant.
        let codec = ScopeEnvelopeCodec::new(b"test-secret-test-secret-32bytes");
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let revocation = Arc::new(chatrouter_state::RevocationList::new(store.clone()));
        let mut dispatcher = dispatcher;
        dispatcher.permissions = Arc::new(PermissionGate::new(codec, revocation));

        let table = RouteTable::build(vec![weather_route()], 1);
        let event = chatrouter_core::Event::new_command(
            CommunityId::new("c1"),
            "discord",
            "chan1",
            principal(),
            "!weather London",
        );
        let ctx = EventContext::with_default_deadline(&event.correlation_id);
        let results = dispatcher.dispatch(&event, &table, &ctx).await.unwrap();
        assert!(results.is_empty());
        assert!(sink.sent.lock().unwrap().is_empty());
    }
}
