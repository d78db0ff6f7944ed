pub mod events;
pub mod health;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chatrouter_core::Route;
use chatrouter_gateway::Dispatcher;
use chatrouter_resolver::RouteTableCache;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub route_table_cache: Arc<RouteTableCache>,
    /// Static route list loaded once at startup; every community shares it
    /// since there is no admin plane to publish per-community tables.
    pub routes: Arc<Vec<Route>>,
    /// Flipped to `true` once the first route table has been built, so
    /// `/readyz` can distinguish "still booting" from "serving".
    pub ready: Arc<AtomicBool>,
    /// Bounds in-flight event processing (`ROUTER_MAX_INFLIGHT`); ingress
    /// returns 429 rather than queue unboundedly (spec.md §5).
    pub inflight: Arc<Semaphore>,
}

impl AppState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

/// Build the Axum router: event ingress plus the operational surface
/// (`/healthz`, `/readyz`), layered with tracing and a permissive CORS
/// policy.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(events::ingest))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
