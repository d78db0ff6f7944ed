use std::time::Duration;

use async_trait::async_trait;

use crate::error::StateError;
use crate::key::StateKey;

/// Result of a compare-and-swap operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    Ok,
    Conflict {
        current_value: Option<String>,
        current_version: u64,
    },
}

/// Trait for the shared, authoritative store backing rate buckets,
/// circuit-breaker state, and the scope-envelope revocation list across
/// router replicas (spec.md §4.4: "when multiple router replicas run, they
/// point at a shared in-memory store for authoritative counts").
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Check if a key exists; if not, set it atomically with an optional
    /// TTL. Returns `true` if the key was newly set.
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError>;

    /// Get the value for a key. Returns `None` if not found or expired.
    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError>;

    /// Set a value with an optional TTL, overwriting any previous value.
    async fn set(&self, key: &StateKey, value: &str, ttl: Option<Duration>) -> Result<(), StateError>;

    /// Delete a key. Returns `true` if the key existed.
    async fn delete(&self, key: &StateKey) -> Result<bool, StateError>;

    /// Atomically increment a counter by `delta`. Returns the new value.
    /// Creates the counter at 0 if it doesn't exist before incrementing.
    async fn increment(&self, key: &StateKey, delta: i64, ttl: Option<Duration>) -> Result<i64, StateError>;

    /// Compare-and-swap: update value only if the current version matches
    /// `expected_version` (a monotonic counter bumped on every write).
    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError>;

    /// Scan all keys of a given kind within a community. Used for
    /// diagnostics and for warm-restarting circuit-breaker state
    /// (SPEC_FULL.md §10.6); avoid on the hot dispatch path.
    async fn scan(
        &self,
        community: &chatrouter_core::CommunityId,
        kind: crate::key::KeyKind,
    ) -> Result<Vec<(String, String)>, StateError>;

    /// Atomically refill-then-decrement a token bucket (spec.md §4.4: "the
    /// store exposes a compare-and-decrement primitive sufficient to
    /// preserve atomicity"). Returns `true` and consumes one token if the
    /// bucket has capacity after refill, `false` (no mutation) otherwise.
    async fn try_consume_token(
        &self,
        key: &StateKey,
        capacity: u64,
        refill_per_second: f64,
    ) -> Result<bool, StateError>;

    /// Give back one token to a bucket without waiting for the next refill
    /// tick. Used to undo a reservation when a companion bucket in the same
    /// dual-bucket check turns out to be empty (spec.md §4.4 invariant:
    /// "both must succeed atomically; if any fails, no tokens are consumed
    /// from the other").
    async fn refund_token(&self, key: &StateKey, capacity: u64) -> Result<(), StateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn StateStore) {}
}
