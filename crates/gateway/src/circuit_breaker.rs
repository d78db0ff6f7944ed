use std::collections::VecDeque;
use std::sync::Arc;

use chatrouter_core::{CircuitBreakerConfig, CircuitState};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Persisted circuit state for a single adapter endpoint (spec.md §4.8).
/// Serialized into the shared [`chatrouter_state::StateStore`] so replicas
/// observe the same breaker state; mutations are serialized locally with a
/// mutex since a single process only ever runs one mutation at a time for
/// a given adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CircuitData {
    state: CircuitState,
    /// Failure timestamps (ms since epoch) within the current window; used
    /// to trip the breaker when `len() >= failure_threshold`.
    failure_times_ms: VecDeque<i64>,
    trial_permits_issued: u32,
    trial_successes: u32,
    /// Current cool-down, doubled on every half-open failure up to
    /// `max_cooldown` (spec.md §4.8).
    current_cooldown_ms: i64,
    opened_at_ms: Option<i64>,
}

impl CircuitData {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_times_ms: VecDeque::new(),
            trial_permits_issued: 0,
            trial_successes: 0,
            #[allow(clippy::cast_possible_truncation)]
            current_cooldown_ms: config.cooldown.as_millis() as i64,
            opened_at_ms: None,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether a request may currently proceed, and the circuit's state as
/// observed by this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Allowed,
    Denied,
}

/// Per-adapter circuit breaker (spec.md §4.8). Holds its data in memory
/// behind a mutex; a production deployment would back this with
/// `chatrouter_state::StateStore` for cross-replica sharing, following the
/// same process-local-by-default posture as the rate limiter.
pub struct CircuitBreaker {
    adapter: String,
    config: CircuitBreakerConfig,
    data: Mutex<CircuitData>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(adapter: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let data = CircuitData::new(&config);
        Self {
            adapter: adapter.into(),
            config,
            data: Mutex::new(data),
        }
    }

    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter
    }

    /// Acquire permission to dispatch a call through this breaker (spec.md
    /// §4.8: "The breaker is consulted before retry logic"). In `HalfOpen`,
    /// this also reserves one of the configured trial slots.
    pub async fn try_acquire_permit(&self) -> Permit {
        let mut data = self.data.lock().await;
        match data.state {
            CircuitState::Closed => Permit::Allowed,
            CircuitState::Open => {
                let now = now_ms();
                let elapsed = data.opened_at_ms.map_or(i64::MAX, |t| (now - t).max(0));
                if elapsed >= data.current_cooldown_ms {
                    debug!(adapter = %self.adapter, "circuit transitioning open -> half_open");
                    data.state = CircuitState::HalfOpen;
                    data.trial_permits_issued = 1;
                    data.trial_successes = 0;
                    Permit::Allowed
                } else {
                    Permit::Denied
                }
            }
            CircuitState::HalfOpen => {
                if data.trial_permits_issued < self.config.trial_size {
                    data.trial_permits_issued += 1;
                    Permit::Allowed
                } else {
                    Permit::Denied
                }
            }
        }
    }

    /// Record a successful call through this breaker.
    pub async fn record_success(&self) {
        let mut data = self.data.lock().await;
        match data.state {
            CircuitState::Closed => {
                data.failure_times_ms.clear();
            }
            CircuitState::HalfOpen => {
                data.trial_successes += 1;
                if data.trial_successes >= self.config.trial_size {
                    info!(adapter = %self.adapter, "circuit closing after successful trial");
                    *data = CircuitData::new(&self.config);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call through this breaker.
    pub async fn record_failure(&self) {
        let mut data = self.data.lock().await;
        let now = now_ms();
        match data.state {
            CircuitState::Closed => {
                data.failure_times_ms.push_back(now);
                let window_start = now - self.config.window.as_millis() as i64;
                while data
                    .failure_times_ms
                    .front()
                    .is_some_and(|t| *t < window_start)
                {
                    data.failure_times_ms.pop_front();
                }
                if data.failure_times_ms.len() as u32 >= self.config.failure_threshold {
                    warn!(adapter = %self.adapter, "circuit opening");
                    data.state = CircuitState::Open;
                    data.opened_at_ms = Some(now);
                    #[allow(clippy::cast_possible_truncation)]
                    let base_cooldown = self.config.cooldown.as_millis() as i64;
                    data.current_cooldown_ms = base_cooldown;
                }
            }
            CircuitState::HalfOpen => {
                warn!(adapter = %self.adapter, "circuit re-opening after half-open failure");
                #[allow(clippy::cast_possible_truncation)]
                let max_cooldown_ms = self.config.max_cooldown.as_millis() as i64;
                data.current_cooldown_ms = (data.current_cooldown_ms * 2).min(max_cooldown_ms);
                data.state = CircuitState::Open;
                data.opened_at_ms = Some(now);
                data.trial_permits_issued = 0;
                data.trial_successes = 0;
            }
            CircuitState::Open => {
                data.opened_at_ms = Some(now);
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.data.lock().await.state
    }
}

/// Registry of circuit breakers, one per adapter endpoint, created lazily
/// on first use.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: dashmap::DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: dashmap::DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn get_or_create(&self, adapter: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(adapter.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(adapter, self.config.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            window: Duration::from_secs(60),
            trial_size: 2,
            cooldown: Duration::from_millis(10),
            max_cooldown: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn trips_after_threshold_and_denies() {
        let breaker = CircuitBreaker::new("webhook", config());
        assert_eq!(breaker.try_acquire_permit().await, Permit::Allowed);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(breaker.try_acquire_permit().await, Permit::Denied);
    }

    #[tokio::test]
    async fn half_open_closes_after_successful_trials() {
        let breaker = CircuitBreaker::new("webhook", config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(breaker.try_acquire_permit().await, Permit::Allowed);
        breaker.record_success().await;
        assert_eq!(breaker.try_acquire_permit().await, Permit::Allowed);
        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_doubles_cooldown() {
        let breaker = CircuitBreaker::new("webhook", config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(breaker.try_acquire_permit().await, Permit::Allowed);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Cooldown doubled to 20ms; still open after 10ms.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(breaker.try_acquire_permit().await, Permit::Denied);
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(breaker.try_acquire_permit().await, Permit::Allowed);
    }
}
