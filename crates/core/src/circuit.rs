use serde::{Deserialize, Serialize};

/// State of an adapter's circuit breaker (spec.md §3 `CircuitState`, §4.8).
/// Transitions are monotonic within an epoch: closed -> open -> half-open ->
/// closed (or back to open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for a single adapter endpoint's circuit breaker (spec.md
/// §4.8: thresholds, window, trial size, and cool-down are per-adapter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub window: std::time::Duration,
    pub trial_size: u32,
    pub cooldown: std::time::Duration,
    pub max_cooldown: std::time::Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: std::time::Duration::from_secs(60),
            trial_size: 1,
            cooldown: std::time::Duration::from_secs(30),
            max_cooldown: std::time::Duration::from_secs(600),
        }
    }
}

/// Advisory rolling health summary for an adapter (spec.md §4.7). Distinct
/// from `CircuitState`: health never opens the circuit itself (DESIGN.md
/// Open Question 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
