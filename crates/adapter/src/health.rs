use chatrouter_core::HealthStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling health summary for a single adapter instance (spec.md §4.7).
/// Counters are in-memory and reset on restart; this is an advisory signal
/// for operators, not an input to circuit-breaker decisions (DESIGN.md Open
/// Question 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterHealthSnapshot {
    pub adapter: String,
    pub status: HealthStatus,
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_checked: DateTime<Utc>,
}

impl AdapterHealthSnapshot {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 100.0;
        }
        (self.successes as f64 / self.total_requests as f64) * 100.0
    }
}

/// In-memory counters backing an [`AdapterHealthSnapshot`]. Updated after
/// every adapter call; cheap enough to bump on the hot path with relaxed
/// atomics.
#[derive(Debug, Default)]
pub struct AdapterHealthCounters {
    total_requests: std::sync::atomic::AtomicU64,
    successes: std::sync::atomic::AtomicU64,
    failures: std::sync::atomic::AtomicU64,
    last_error: std::sync::Mutex<Option<String>>,
}

impl AdapterHealthCounters {
    pub fn record_success(&self) {
        use std::sync::atomic::Ordering::Relaxed;
        self.total_requests.fetch_add(1, Relaxed);
        self.successes.fetch_add(1, Relaxed);
    }

    pub fn record_failure(&self, error: impl Into<String>) {
        use std::sync::atomic::Ordering::Relaxed;
        self.total_requests.fetch_add(1, Relaxed);
        self.failures.fetch_add(1, Relaxed);
        *self.last_error.lock().expect("health counters lock poisoned") = Some(error.into());
    }

    #[must_use]
    pub fn snapshot(&self, adapter: impl Into<String>) -> AdapterHealthSnapshot {
        use std::sync::atomic::Ordering::Relaxed;
        let total = self.total_requests.load(Relaxed);
        let failures = self.failures.load(Relaxed);
        let status = if failures == 0 {
            HealthStatus::Healthy
        } else if failures < total {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };
        AdapterHealthSnapshot {
            adapter: adapter.into(),
            status,
            total_requests: total,
            successes: self.successes.load(Relaxed),
            failures,
            last_error: self.last_error.lock().expect("health counters lock poisoned").clone(),
            last_checked: Utc::now(),
        }
    }
}
