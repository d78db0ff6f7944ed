use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
struct AdapterHealthEntry {
    name: String,
    circuit_state: String,
    successes: u64,
    failures: u64,
    last_error: Option<String>,
}

/// `GET /healthz` -- adapter health counters plus circuit-breaker state per
/// registered adapter (spec.md §10.5 ambient stack: operational surface).
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let mut adapters = Vec::new();
    for name in state.dispatcher.adapter_names() {
        let snapshot = state.dispatcher.adapter_health(name);
        let circuit_state = format!("{:?}", state.dispatcher.circuit_state(name).await);
        adapters.push(AdapterHealthEntry {
            name: name.to_owned(),
            circuit_state,
            successes: snapshot.as_ref().map_or(0, |s| s.successes),
            failures: snapshot.as_ref().map_or(0, |s| s.failures),
            last_error: snapshot.and_then(|s| s.last_error),
        });
    }

    (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "adapters": adapters })))
}

/// `GET /readyz` -- whether the route table has completed its first load.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, Json(serde_json::json!({ "ready": true })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ready": false })),
        )
    }
}
