use thiserror::Error;

/// Errors from the audit sink (spec.md §4.10: "on sink backpressure the
/// router degrades gracefully by dropping the event with an explicit
/// `audit-unavailable` return, never proceeding silently").
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable")]
    Unavailable,

    #[error("audit backend error: {0}")]
    Backend(String),
}
