use std::sync::Arc;

use crate::error::StateError;
use crate::key::StateKey;
use crate::store::StateStore;

/// `(capacity, tokens_per_second)` for a single bucket, as declared by a
/// route's rate-limit class (spec.md §4.4, `RateLimitClass::default_bucket_params`).
#[derive(Debug, Clone, Copy)]
pub struct BucketParams {
    pub capacity: u64,
    pub refill_per_second: f64,
}

/// Policy applied when the shared store is unavailable (spec.md §4.4: "on
/// store unavailability, fail-open is policy-configurable (default: deny)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailablePolicy {
    FailOpen,
    FailClosed,
}

impl Default for UnavailablePolicy {
    fn default() -> Self {
        Self::FailClosed
    }
}

/// The outcome of checking a dispatch against the two applicable buckets
/// (spec.md §4.4: `(community, module)` and `(community, principal)`,
/// checked atomically in sequence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { bucket_id: String },
}

/// Token-bucket rate limiter over a shared [`StateStore`] (spec.md §4.4).
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    unavailable_policy: UnavailablePolicy,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, unavailable_policy: UnavailablePolicy) -> Self {
        Self {
            store,
            unavailable_policy,
        }
    }

    /// Check both the module and principal buckets for one dispatch.
    /// Consumes one token from each only if both have capacity; rolls back
    /// the module bucket if the principal bucket turns out to be empty
    /// (spec.md §4.4 invariant).
    pub async fn check_dual(
        &self,
        module_key: &StateKey,
        module_params: BucketParams,
        principal_key: &StateKey,
        principal_params: BucketParams,
    ) -> RateLimitDecision {
        match self
            .try_check_dual(module_key, module_params, principal_key, principal_params)
            .await
        {
            Ok(decision) => decision,
            Err(_) if self.unavailable_policy == UnavailablePolicy::FailOpen => {
                RateLimitDecision::Allowed
            }
            Err(_) => RateLimitDecision::Denied {
                bucket_id: module_key.canonical(),
            },
        }
    }

    async fn try_check_dual(
        &self,
        module_key: &StateKey,
        module_params: BucketParams,
        principal_key: &StateKey,
        principal_params: BucketParams,
    ) -> Result<RateLimitDecision, StateError> {
        if !self
            .store
            .try_consume_token(module_key, module_params.capacity, module_params.refill_per_second)
            .await?
        {
            return Ok(RateLimitDecision::Denied {
                bucket_id: module_key.canonical(),
            });
        }

        if !self
            .store
            .try_consume_token(
                principal_key,
                principal_params.capacity,
                principal_params.refill_per_second,
            )
            .await?
        {
            self.store.refund_token(module_key, module_params.capacity).await?;
            return Ok(RateLimitDecision::Denied {
                bucket_id: principal_key.canonical(),
            });
        }

        Ok(RateLimitDecision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use chatrouter_core::CommunityId;

    use super::*;
    use crate::key::KeyKind;
    use crate::memory::InMemoryStateStore;

    fn params(capacity: u64) -> BucketParams {
        BucketParams {
            capacity,
            refill_per_second: 0.0,
        }
    }

    fn key(community: &str, id: &str) -> StateKey {
        StateKey::new(CommunityId::new(community), KeyKind::RateLimit, id)
    }

    #[tokio::test]
    async fn allows_within_capacity_then_denies() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let limiter = RateLimiter::new(store, UnavailablePolicy::FailClosed);
        let module_key = key("c1", "mod:weather");
        let principal_key = key("c1", "user:u1");

        for _ in 0..2 {
            let decision = limiter
                .check_dual(&module_key, params(2), &principal_key, params(2))
                .await;
            assert_eq!(decision, RateLimitDecision::Allowed);
        }

        let decision = limiter
            .check_dual(&module_key, params(2), &principal_key, params(2))
            .await;
        assert!(matches!(decision, RateLimitDecision::Denied { .. }));
    }

    #[tokio::test]
    async fn principal_exhaustion_refunds_module_bucket() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let limiter = RateLimiter::new(store.clone(), UnavailablePolicy::FailClosed);
        let module_key = key("c1", "mod:weather");
        let principal_key = key("c1", "user:u1");

        // Drain the principal bucket first so the module bucket is the one
        // left with spare capacity to prove it gets refunded.
        store.try_consume_token(&principal_key, 1, 0.0).await.unwrap();

        let decision = limiter
            .check_dual(&module_key, params(5), &principal_key, params(1))
            .await;
        assert_eq!(
            decision,
            RateLimitDecision::Denied {
                bucket_id: principal_key.canonical()
            }
        );

        // Module bucket should still have all 5 tokens since the reserved
        // one was refunded.
        for _ in 0..5 {
            assert!(store.try_consume_token(&module_key, 5, 0.0).await.unwrap());
        }
        assert!(!store.try_consume_token(&module_key, 5, 0.0).await.unwrap());
    }
}
