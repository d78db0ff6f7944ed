use std::time::Duration;

use rand::Rng;

/// Exponential backoff with full jitter (spec.md §4.7: "retries use
/// exponential backoff with jitter, capped at a maximum delay").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-indexed: the delay before the
    /// *second* call is `backoff_for(1)`), with jitter applied uniformly
    /// over `[0, cap)`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.initial_backoff.as_millis().saturating_mul(1u128 << attempt.min(32));
        let cap = exp.min(self.max_backoff.as_millis()).max(1);
        #[allow(clippy::cast_possible_truncation)]
        let cap_ms = cap as u64;
        let jittered = rand::thread_rng().gen_range(0..=cap_ms);
        Duration::from_millis(jittered)
    }

    #[must_use]
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Outcome classification used by the dispatcher to decide whether a failed
/// attempt should be retried, should trip the circuit breaker, or must be
/// surfaced immediately (spec.md §4.7: "permanent failures and policy
/// denials never retry").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
    Policy,
}

impl FailureClass {
    #[must_use]
    pub fn from_adapter_error(err: &chatrouter_adapter::AdapterError) -> Self {
        if err.is_retryable() {
            Self::Transient
        } else {
            Self::Permanent
        }
    }

    #[must_use]
    pub fn from_router_error(err: &chatrouter_core::RouterError) -> Self {
        if err.is_policy() {
            Self::Policy
        } else if err.is_retryable() {
            Self::Transient
        } else {
            Self::Permanent
        }
    }
}

/// Run `attempt` repeatedly under `policy` until it succeeds, a non-transient
/// failure occurs, or attempts are exhausted. `classify` maps the attempt's
/// error into a [`FailureClass`] so callers can supply adapter or router
/// error vocabularies interchangeably.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut attempt: F,
    classify: C,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    C: Fn(&E) -> FailureClass,
{
    let mut attempts_made = 0;
    loop {
        match attempt(attempts_made).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempts_made += 1;
                let class = classify(&err);
                if class != FailureClass::Transient || !policy.should_retry(attempts_made) {
                    return Err(err);
                }
                tokio::time::sleep(policy.backoff_for(attempts_made)).await;
            }
        }
    }
}
