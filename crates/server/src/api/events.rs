use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chatrouter_core::{Event, EventContext, RouterError};

use crate::error::ServerError;
use crate::ingress::InboundEvent;

use super::AppState;

/// `POST /v1/events` -- the synchronous HTTP ingress path (spec.md §4.1).
/// Converts the wire event, resolves (and lazily builds) the community's
/// route table, dispatches, and returns the per-target egress results.
pub async fn ingest(
    State(state): State<AppState>,
    Json(raw): Json<InboundEvent>,
) -> Result<impl IntoResponse, ServerError> {
    let Ok(permit) = state.inflight.clone().try_acquire_owned() else {
        return Err(ServerError::Router(RouterError::Backpressure));
    };

    let event: Event = raw
        .try_into()
        .map_err(ServerError::BadRequest)?;

    let table = {
        let routes = state.routes.clone();
        state
            .route_table_cache
            .get_or_build(&event.community_id, 1, move || (*routes).clone())
    };

    let ctx = EventContext::with_default_deadline(&event.correlation_id);
    let results = state.dispatcher.dispatch(&event, &table, &ctx).await?;
    drop(permit);

    Ok((StatusCode::OK, Json(serde_json::json!({ "results": results }))))
}
