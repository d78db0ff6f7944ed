use thiserror::Error;

/// Errors surfaced by the shared state backend (spec.md §4.4: "on store
/// unavailability, fail-open is policy-configurable"). Callers decide how
/// to react to `Unavailable`; all other variants indicate a programming or
/// backend-integrity error.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
