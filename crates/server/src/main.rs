use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use chatrouter_adapter::AdapterError;
use chatrouter_adapters::{
    GcpFunctionAdapter, GcpFunctionConfig, LambdaAdapter, LambdaConfig, OpenWhiskAdapter,
    OpenWhiskConfig, WebhookAdapter, WebhookConfig,
};
use chatrouter_audit::AuditSink;
use chatrouter_core::{CircuitBreakerConfig, CommunityId, ModuleId, Scope, ScopeEnvelopeCodec, ScopeGrant};
use chatrouter_gateway::GatewayBuilder;
use chatrouter_resolver::RouteTableCache;
use chatrouter_server::api::{router, AppState};
use chatrouter_server::config::{AdapterConfig, ChatRouterConfig};
use chatrouter_server::egress::WebhookEgressSink;
use chatrouter_server::error::ServerError;
use chatrouter_state::{InMemoryStateStore, RevocationList, StateStore, UnavailablePolicy};
use chrono::Utc;
use clap::Parser;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// chatrouter gateway HTTP server.
#[derive(Parser, Debug)]
#[command(name = "chatrouter-server", about = "Standalone HTTP server for the chatrouter action-dispatch plane")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "chatrouter.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config: ChatRouterConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        toml::from_str("")?
    };
    config.apply_env_overrides();

    let signing_key = config
        .security
        .scope_envelope_secret
        .clone()
        .ok_or("SCOPE_ENVELOPE_SECRET is required")?;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    if config.rate_limit.store == "shared" {
        warn!("RATE_LIMIT_STORE=shared requested but no shared backend is wired; falling back to in-memory");
    }

    let audit = Arc::new(AuditSink::spawn(
        config.audit.channel_capacity,
        config.audit.batch_size,
        Duration::from_millis(config.audit.flush_ms),
    ));

    let codec = ScopeEnvelopeCodec::new(signing_key.as_bytes());
    let revocation = Arc::new(RevocationList::new(store.clone()));
    let permissions = Arc::new(chatrouter_gateway::PermissionGate::new(codec.clone(), revocation));

    for grant in &config.scope_grants {
        let community_id = CommunityId::new(grant.community_id.clone());
        let module = ModuleId::new(grant.module.clone());
        let scopes: Vec<Scope> = grant.scopes.iter().map(|s| Scope::new(s.as_str())).collect();
        let envelope = codec
            .sign(
                uuid::Uuid::new_v4().to_string(),
                community_id.clone(),
                module.clone(),
                grant.scopes.clone(),
                grant.envelope_ttl_seconds,
            )
            .map_err(|e| format!("failed to sign scope envelope for {}: {e}", grant.module))?;
        permissions.set_grant(
            ScopeGrant {
                community_id,
                module,
                scopes,
                granted_by: grant.granted_by.clone(),
                granted_at: Utc::now(),
            },
            envelope,
        );
    }

    let mut builder = GatewayBuilder::new()
        .state(store)
        .audit(audit)
        .permissions(permissions)
        .circuit_breaker_config(CircuitBreakerConfig {
            failure_threshold: config.breaker.default_threshold,
            cooldown: Duration::from_secs(config.breaker.default_cooldown_s),
            ..CircuitBreakerConfig::default()
        })
        .response_cache_capacity(config.cache.max_entries)
        .unavailable_policy(UnavailablePolicy::FailClosed)
        .command_prefixes(config.router.command_prefixes.clone());

    for adapter in &config.adapters {
        builder = register_adapter(builder, adapter).await?;
    }

    let default_secret = config.security.signing_key.clone();
    for egress in &config.egress {
        let secret = egress
            .secret
            .clone()
            .or_else(|| default_secret.clone())
            .ok_or_else(|| format!("no signing secret configured for egress platform {}", egress.platform))?;
        let sink = WebhookEgressSink::new(
            egress.platform.clone(),
            egress.url.clone(),
            secret,
            Duration::from_secs(config.adapter_defaults.default_timeout_s),
        )
        .map_err(ServerError::Config)?;
        builder = builder.egress_sink(Arc::new(sink));
    }

    let dispatcher = Arc::new(builder.build()?);

    let route_table_cache = Arc::new(RouteTableCache::new());
    let routes = Arc::new(config.routes.clone());
    let ready = Arc::new(AtomicBool::new(false));

    // Warm the route table for no particular community yet; readiness just
    // reflects that the static route list has been loaded from config.
    ready.store(true, std::sync::atomic::Ordering::SeqCst);

    let state = AppState {
        dispatcher,
        route_table_cache,
        routes,
        ready,
        inflight: Arc::new(Semaphore::new(config.router.max_inflight)),
    };
    let app = router(state);

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "chatrouter-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("chatrouter-server shut down");
    Ok(())
}

/// Register one config-declared adapter with the gateway builder. `grpc`
/// and `in_process` are intentionally absent: both require a
/// module-specific service/handler implementation that cannot be expressed
/// as plain TOML values, so they are wired in code by deployments that need
/// them rather than here.
async fn register_adapter(
    builder: GatewayBuilder,
    adapter: &AdapterConfig,
) -> Result<GatewayBuilder, Box<dyn std::error::Error>> {
    let registered: Arc<dyn chatrouter_adapter::DynAdapter> = match adapter {
        AdapterConfig::Webhook {
            name,
            url,
            secret,
            timeout_s,
        } => {
            let mut cfg = WebhookConfig::new(url.clone(), secret.clone());
            if let Some(timeout) = timeout_s {
                cfg = cfg.with_timeout(Duration::from_secs(*timeout));
            }
            Arc::new(WebhookAdapter::new(name.clone(), cfg).map_err(adapter_error_box)?)
        }
        AdapterConfig::OpenWhisk {
            name,
            api_host,
            namespace,
            action_name,
            username,
            password,
        } => {
            let cfg = OpenWhiskConfig::new(
                api_host.clone(),
                namespace.clone(),
                action_name.clone(),
                username.clone(),
                password.clone(),
            );
            Arc::new(OpenWhiskAdapter::new(name.clone(), cfg).map_err(adapter_error_box)?)
        }
        AdapterConfig::Lambda {
            name,
            region,
            function_name,
            qualifier,
            async_invoke,
        } => {
            let mut cfg = LambdaConfig::new(region.clone(), function_name.clone());
            if let Some(qualifier) = qualifier {
                cfg = cfg.with_qualifier(qualifier.clone());
            }
            if *async_invoke {
                cfg = cfg.with_mode(chatrouter_adapters::InvocationMode::Async);
            }
            Arc::new(LambdaAdapter::new(name.clone(), cfg).await)
        }
        AdapterConfig::GcpFunction {
            name,
            url,
            credentials_json,
        } => {
            let mut cfg = GcpFunctionConfig::new(url.clone());
            if let Some(json) = credentials_json {
                cfg = cfg.with_credentials_json(json.clone());
            }
            Arc::new(GcpFunctionAdapter::new(name.clone(), cfg).await.map_err(adapter_error_box)?)
        }
    };
    Ok(builder.adapter(registered))
}

fn adapter_error_box(err: AdapterError) -> Box<dyn std::error::Error> {
    Box::new(err)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
