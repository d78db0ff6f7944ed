use thiserror::Error;

/// The outward-facing error taxonomy from spec.md §7, shared across crates
/// so that ingress, the gateway, and the server's HTTP layer all speak the
/// same vocabulary.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    // -- Input --
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    #[error("unknown community: {0}")]
    UnknownCommunity(String),
    #[error("invalid scope envelope: {0}")]
    InvalidScopeEnvelope(String),

    // -- Policy --
    #[error("permission denied for module {module}")]
    PermissionDenied { module: String },
    #[error("rate limited on bucket {bucket_id}")]
    RateLimited { bucket_id: String },
    #[error("circuit open for adapter {adapter}")]
    CircuitOpen { adapter: String },

    // -- Transient --
    #[error("adapter timeout")]
    AdapterTimeout,
    #[error("adapter throttled")]
    AdapterThrottled,
    #[error("adapter returned 5xx: {0}")]
    Adapter5xx(u16),
    #[error("network error: {0}")]
    Network(String),

    // -- Permanent --
    #[error("adapter returned 4xx: {0}")]
    Adapter4xx(u16),
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    // -- Internal --
    #[error("audit sink unavailable")]
    AuditUnavailable,
    #[error("shared store unavailable")]
    StoreUnavailable,

    // -- Dispatch-level --
    #[error("backpressure: in-flight bound exceeded")]
    Backpressure,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("dispatch failed after retries: {0}")]
    DispatchFailed(String),
}

impl RouterError {
    /// Whether a failed adapter call in this class should be retried by the
    /// adapter's own policy (spec.md §4.7, §7). Policy errors and input
    /// errors never retry; transient errors do; permanent errors don't.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdapterTimeout | Self::AdapterThrottled | Self::Adapter5xx(_) | Self::Network(_)
        )
    }

    /// Whether this error is a policy decision (permission/rate/circuit)
    /// that must never be retried within the router (spec.md §7).
    #[must_use]
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::RateLimited { .. } | Self::CircuitOpen { .. }
        )
    }
}
