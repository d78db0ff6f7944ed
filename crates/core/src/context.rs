use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Per-event context threaded through the dispatch pipeline (spec.md §9:
/// "Coroutine/async context passing is replaced with an explicit per-event
/// context record carrying deadline, correlation id, and cancellation
/// signal; every adapter call takes this context as a first argument.").
#[derive(Debug, Clone)]
pub struct EventContext {
    pub correlation_id: String,
    pub deadline: DateTime<Utc>,
    cancellation: CancellationToken,
}

/// Default total event deadline (spec.md §5: "default 15 s total").
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

impl EventContext {
    #[must_use]
    pub fn new(correlation_id: impl Into<String>, deadline: Duration) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            deadline: Utc::now()
                + chrono::Duration::from_std(deadline).unwrap_or(chrono::Duration::seconds(15)),
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_default_deadline(correlation_id: impl Into<String>) -> Self {
        Self::new(correlation_id, DEFAULT_DEADLINE)
    }

    /// Remaining time until the deadline, or `Duration::ZERO` if already
    /// past it.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let now = Utc::now();
        if self.deadline <= now {
            return Duration::ZERO;
        }
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// A child token that is cancelled when this context's deadline passes
    /// or [`Self::cancel`] is called. Cloned into each child task spawned
    /// for a route (spec.md §4.6, §5).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Cooperatively cancel all in-flight child tasks for this event.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_not_expired() {
        let ctx = EventContext::with_default_deadline("corr-1");
        assert!(!ctx.is_expired());
        assert!(ctx.remaining() > Duration::from_secs(10));
    }

    #[test]
    fn zero_deadline_is_immediately_expired() {
        let ctx = EventContext::new("corr-1", Duration::ZERO);
        assert!(ctx.is_expired());
    }

    #[test]
    fn cancellation_propagates_to_clones() {
        let ctx = EventContext::with_default_deadline("corr-1");
        let token = ctx.cancellation_token();
        assert!(!token.is_cancelled());
        ctx.cancel();
        assert!(token.is_cancelled());
        assert!(ctx.is_cancelled());
    }
}
