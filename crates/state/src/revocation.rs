use std::sync::Arc;
use std::time::Duration;

use chatrouter_core::CommunityId;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};
use crate::store::StateStore;

/// Revocation list for signed scope envelopes (spec.md §4.3: "the router
/// verifies signature, expiry, and revocation list before trust"; carried
/// forward as persisted router-owned state per SPEC_FULL.md §10.6).
pub struct RevocationList {
    store: Arc<dyn StateStore>,
}

impl RevocationList {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Revoke an envelope by its `jti`, retained until `ttl` has elapsed
    /// (normally the envelope's own remaining lifetime, so the entry can be
    /// forgotten once the token would have expired anyway).
    pub async fn revoke(
        &self,
        community: &CommunityId,
        jti: &str,
        ttl: Duration,
    ) -> Result<(), StateError> {
        self.store
            .set(&revocation_key(community, jti), "revoked", Some(ttl))
            .await
    }

    pub async fn is_revoked(&self, community: &CommunityId, jti: &str) -> Result<bool, StateError> {
        Ok(self.store.get(&revocation_key(community, jti)).await?.is_some())
    }
}

fn revocation_key(community: &CommunityId, jti: &str) -> StateKey {
    StateKey::new(community.clone(), KeyKind::ScopeRevocation, jti)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStateStore;

    #[tokio::test]
    async fn revoked_envelope_is_reported() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let list = RevocationList::new(store);
        let community = CommunityId::new("c1");

        assert!(!list.is_revoked(&community, "jti-1").await.unwrap());
        list.revoke(&community, "jti-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(list.is_revoked(&community, "jti-1").await.unwrap());
    }
}
