use serde::Deserialize;

use chatrouter_core::Route;

/// Top-level configuration for the chatrouter server, loaded from a TOML
/// file (spec.md §6's config-key list, one section per concern).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRouterConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub adapter_defaults: AdapterDefaultsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// The route table, loaded once at startup (spec.md §4.2). There is no
    /// admin-plane feed in this deployment, so routes are static for the
    /// life of the process; restart to pick up changes.
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Module scope grants, signed into envelopes at startup and installed
    /// into the permission gate (spec.md §4.3). Same static-at-startup
    /// caveat as `routes`.
    #[serde(default)]
    pub scope_grants: Vec<ScopeGrantConfig>,
    /// Outbound HMAC-signed webhook sinks, one per platform (spec.md §4.9).
    #[serde(default)]
    pub egress: Vec<EgressWebhookConfig>,
    /// Adapter instances to register with the dispatcher (spec.md §4.7).
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

impl ChatRouterConfig {
    /// Apply the spec.md §6 env-var overrides on top of whatever the TOML
    /// file set. Env vars win; a present-but-unparsable value is logged and
    /// ignored rather than rejected (the file value stands).
    pub fn apply_env_overrides(&mut self) {
        apply_parsed("ROUTER_WORKERS", &mut self.router.workers);
        apply_parsed("ROUTER_MAX_INFLIGHT", &mut self.router.max_inflight);
        if let Ok(value) = std::env::var("RATE_LIMIT_STORE") {
            self.rate_limit.store = value;
        }
        apply_parsed("CACHE_MAX_ENTRIES", &mut self.cache.max_entries);
        apply_parsed("CACHE_DEFAULT_TTL_S", &mut self.cache.default_ttl_s);
        apply_parsed("BREAKER_DEFAULT_THRESHOLD", &mut self.breaker.default_threshold);
        apply_parsed("BREAKER_DEFAULT_COOLDOWN_S", &mut self.breaker.default_cooldown_s);
        apply_parsed(
            "ADAPTER_DEFAULT_TIMEOUT_S",
            &mut self.adapter_defaults.default_timeout_s,
        );
        apply_parsed(
            "ADAPTER_DEFAULT_MAX_RETRIES",
            &mut self.adapter_defaults.default_max_retries,
        );
        apply_parsed("AUDIT_BATCH_SIZE", &mut self.audit.batch_size);
        apply_parsed("AUDIT_FLUSH_MS", &mut self.audit.flush_ms);
        if let Ok(value) = std::env::var("SIGNING_KEY") {
            self.security.signing_key = Some(value);
        }
        if let Ok(value) = std::env::var("SCOPE_ENVELOPE_SECRET") {
            self.security.scope_envelope_secret = Some(value);
        }
    }
}

fn apply_parsed<T: std::str::FromStr>(var: &str, field: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    apply_override_value(var, field, &raw);
}

/// The parse-and-assign half of an env override, split out from the
/// `std::env::var` lookup so it can be exercised without mutating
/// process-wide environment state.
fn apply_override_value<T: std::str::FromStr>(var: &str, field: &mut T, raw: &str) {
    match raw.parse() {
        Ok(value) => *field = value,
        Err(_) => tracing::warn!(var, value = %raw, "ignoring unparsable env override"),
    }
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graceful shutdown timeout in seconds; the maximum time to wait for
    /// in-flight dispatches and the audit sink to drain.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// `ROUTER_WORKERS` / `ROUTER_MAX_INFLIGHT` (spec.md §5, §6).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Size of the tokio worker pool handling inbound events. Informational
    /// here -- the multi-thread runtime is already sized by `#[tokio::main]`
    /// flavor -- kept for operators who expect to see it honored.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Upper bound on events accepted before ingress starts returning 429
    /// (spec.md §5: "bounded in-flight concurrency, backpressure over
    /// unbounded queuing").
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Recognized command prefixes (spec.md §4.2, default `["!"]`).
    #[serde(default = "default_command_prefixes")]
    pub command_prefixes: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_inflight: default_max_inflight(),
            command_prefixes: default_command_prefixes(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_max_inflight() -> usize {
    1024
}

fn default_command_prefixes() -> Vec<String> {
    vec!["!".to_owned()]
}

/// `RATE_LIMIT_STORE` (spec.md §6: `memory` or `shared`).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_store")]
    pub store: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            store: default_rate_limit_store(),
        }
    }
}

fn default_rate_limit_store() -> String {
    "memory".to_owned()
}

/// `CACHE_MAX_ENTRIES` / `CACHE_DEFAULT_TTL_S` (spec.md §4.5, §6).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_s: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            default_ttl_s: default_cache_ttl(),
        }
    }
}

fn default_cache_max_entries() -> u64 {
    10_000
}

fn default_cache_ttl() -> u64 {
    30
}

/// `BREAKER_DEFAULT_THRESHOLD` / `BREAKER_DEFAULT_COOLDOWN_S` (spec.md §4.8, §6).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_threshold")]
    pub default_threshold: u32,
    #[serde(default = "default_breaker_cooldown")]
    pub default_cooldown_s: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_breaker_threshold(),
            default_cooldown_s: default_breaker_cooldown(),
        }
    }
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_cooldown() -> u64 {
    30
}

/// `ADAPTER_DEFAULT_TIMEOUT_S` / `ADAPTER_DEFAULT_MAX_RETRIES` (spec.md §4.7, §6).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterDefaultsConfig {
    #[serde(default = "default_adapter_timeout")]
    pub default_timeout_s: u64,
    #[serde(default = "default_adapter_retries")]
    pub default_max_retries: u32,
}

impl Default for AdapterDefaultsConfig {
    fn default() -> Self {
        Self {
            default_timeout_s: default_adapter_timeout(),
            default_max_retries: default_adapter_retries(),
        }
    }
}

fn default_adapter_timeout() -> u64 {
    5
}

fn default_adapter_retries() -> u32 {
    3
}

/// `AUDIT_BATCH_SIZE` / `AUDIT_FLUSH_MS` (spec.md §4.10, §6).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_audit_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_audit_flush_ms")]
    pub flush_ms: u64,
    /// Bound on the in-memory channel feeding the audit sink's background
    /// flush task, ahead of `batch_size` many records piling up.
    #[serde(default = "default_audit_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            batch_size: default_audit_batch_size(),
            flush_ms: default_audit_flush_ms(),
            channel_capacity: default_audit_channel_capacity(),
        }
    }
}

fn default_audit_batch_size() -> usize {
    50
}

fn default_audit_flush_ms() -> u64 {
    1000
}

fn default_audit_channel_capacity() -> usize {
    1024
}

/// `SIGNING_KEY` / `SCOPE_ENVELOPE_SECRET` (spec.md §6). Both absent by
/// default; the server refuses to start without a scope envelope secret,
/// since the permission gate cannot function without one.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Default HMAC secret used for any `[[egress]]` entry that does not
    /// set its own `secret`.
    pub signing_key: Option<String>,
    pub scope_envelope_secret: Option<String>,
}

/// A scope grant to install into the permission gate at startup (spec.md
/// §3 `ScopeGrant` plus the envelope lifetime needed to sign it).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeGrantConfig {
    pub community_id: String,
    pub module: String,
    pub scopes: Vec<String>,
    pub granted_by: String,
    /// Envelope lifetime, seconds from startup (spec.md §4.3's short-lived
    /// signed envelope). There is no admin plane to re-sign a fresh one
    /// before expiry, so this should comfortably outlive the process.
    #[serde(default = "default_envelope_ttl")]
    pub envelope_ttl_seconds: i64,
}

fn default_envelope_ttl() -> i64 {
    31_536_000 // 1 year
}

/// One outbound HMAC-signed webhook egress sink (spec.md §4.9).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EgressWebhookConfig {
    pub platform: String,
    pub url: String,
    /// Overrides `security.signing_key` for this platform. One of the two
    /// must resolve to a value or the server refuses to start.
    pub secret: Option<String>,
}

/// One adapter instance to register with the dispatcher (spec.md §4.7's
/// adapter table). `grpc` and `in_process` are not representable from
/// static TOML alone -- they need a module-specific service/handler impl
/// wired in code -- so only the wholly self-contained transports are
/// configurable here.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum AdapterConfig {
    Webhook {
        name: String,
        url: String,
        secret: String,
        #[serde(default)]
        timeout_s: Option<u64>,
    },
    OpenWhisk {
        name: String,
        api_host: String,
        namespace: String,
        action_name: String,
        username: String,
        password: String,
    },
    Lambda {
        name: String,
        region: String,
        function_name: String,
        #[serde(default)]
        qualifier: Option<String>,
        #[serde(default)]
        async_invoke: bool,
    },
    GcpFunction {
        name: String,
        url: String,
        #[serde(default)]
        credentials_json: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_all_defaults() {
        let config: ChatRouterConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.router.command_prefixes, vec!["!".to_owned()]);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn env_override_parses_onto_existing_field() {
        let mut config: ChatRouterConfig = toml::from_str("[router]\nworkers = 2\n").unwrap();
        apply_override_value("ROUTER_WORKERS", &mut config.router.workers, "9");
        assert_eq!(config.router.workers, 9);
    }

    #[test]
    fn unparsable_override_leaves_field_unchanged() {
        let mut workers: usize = 4;
        apply_override_value("ROUTER_WORKERS", &mut workers, "not-a-number");
        assert_eq!(workers, 4);
    }

    #[test]
    fn adapter_config_tags_on_kind() {
        let toml = r#"
            [[adapters]]
            kind = "webhook"
            name = "discord-bot"
            url = "https://example.com/hook"
            secret = "s3cret"
        "#;
        let config: ChatRouterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.adapters.len(), 1);
        assert!(matches!(config.adapters[0], AdapterConfig::Webhook { .. }));
    }
}
