use thiserror::Error;

/// Errors surfaced by adapter execution (spec.md §4.7, §7). Distinct from
/// [`chatrouter_core::RouterError`]: this is the adapter-local vocabulary
/// the dispatcher translates into a `RouterError` after classifying it
/// against the retry/circuit-breaker policy.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter not found: {0}")]
    NotFound(String),

    #[error("adapter timed out")]
    Timeout,

    #[error("adapter throttled the request")]
    Throttled,

    #[error("adapter returned {0}")]
    Http(u16),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid adapter configuration: {0}")]
    Configuration(String),

    #[error("signature mismatch on adapter response")]
    SignatureMismatch,

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AdapterError {
    /// Whether a failed call in this class should be retried by the
    /// dispatcher's backoff policy (spec.md §4.7: throttling, connection
    /// errors, 5xx, and timeouts retry; 4xx other than 408/429 does not).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Throttled | Self::Connection(_) => true,
            Self::Http(code) => *code >= 500 || *code == 408 || *code == 429,
            Self::NotFound(_)
            | Self::Configuration(_)
            | Self::SignatureMismatch
            | Self::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_connection_errors_are_retryable() {
        assert!(AdapterError::Timeout.is_retryable());
        assert!(AdapterError::Throttled.is_retryable());
        assert!(AdapterError::Connection("reset".into()).is_retryable());
    }

    #[test]
    fn http_5xx_and_408_429_are_retryable() {
        assert!(AdapterError::Http(503).is_retryable());
        assert!(AdapterError::Http(408).is_retryable());
        assert!(AdapterError::Http(429).is_retryable());
    }

    #[test]
    fn other_4xx_is_not_retryable() {
        assert!(!AdapterError::Http(400).is_retryable());
        assert!(!AdapterError::Http(404).is_retryable());
        assert!(!AdapterError::SignatureMismatch.is_retryable());
    }
}
