use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatrouter_core::RouterError;
use thiserror::Error;

/// Errors that can occur while running the chatrouter server, spanning
/// startup/config failures and the ones surfaced back through the HTTP API.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gateway error: {0}")]
    Gateway(#[from] chatrouter_gateway::GatewayError),

    #[error("adapter error: {0}")]
    Adapter(#[from] chatrouter_adapter::AdapterError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), None),
            Self::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
            Self::Gateway(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
            Self::Adapter(e) => (StatusCode::BAD_GATEWAY, e.to_string(), None),
            Self::Router(e) => router_error_response(e),
        };

        let body = if let Some(retry) = retry_after {
            serde_json::json!({ "error": message, "retry_after": retry })
        } else {
            serde_json::json!({ "error": message })
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(retry) = retry_after {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }
        response
    }
}

/// Map the shared `RouterError` taxonomy onto HTTP status codes (spec.md
/// §7): input errors are 4xx the caller can fix, policy/backpressure map to
/// 429, everything else is an internal failure.
fn router_error_response(err: &RouterError) -> (StatusCode, String, Option<u64>) {
    match err {
        RouterError::MalformedEvent(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
        RouterError::UnknownCommunity(id) => {
            (StatusCode::NOT_FOUND, format!("unknown community: {id}"), None)
        }
        RouterError::InvalidScopeEnvelope(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
        RouterError::PermissionDenied { module } => (
            StatusCode::FORBIDDEN,
            format!("permission denied for module {module}"),
            None,
        ),
        RouterError::RateLimited { bucket_id } => (
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate limited on bucket {bucket_id}"),
            Some(1),
        ),
        RouterError::CircuitOpen { adapter } => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("circuit open for adapter {adapter}"),
            Some(5),
        ),
        RouterError::Backpressure => (
            StatusCode::TOO_MANY_REQUESTS,
            "server at capacity, try again shortly".to_owned(),
            Some(1),
        ),
        RouterError::DeadlineExceeded => {
            (StatusCode::GATEWAY_TIMEOUT, err.to_string(), None)
        }
        RouterError::AuditUnavailable | RouterError::StoreUnavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string(), Some(1))
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None),
    }
}
