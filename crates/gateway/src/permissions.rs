use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use chatrouter_core::{CommunityId, ModuleId, RouterError, Scope, ScopeEnvelopeCodec, ScopeGrant};
use chatrouter_state::RevocationList;

struct GrantRecord {
    grant: ScopeGrant,
    envelope: String,
}

/// Checks that a caller's scopes satisfy a route's module requirement
/// (spec.md §4.3). Grants and their signed envelopes are read-mostly
/// admin-plane state, kept here as an in-memory snapshot; a production
/// deployment would source this from the same admin-plane feed that
/// pushes route-table versions.
pub struct PermissionGate {
    grants: RwLock<HashMap<(CommunityId, ModuleId), GrantRecord>>,
    codec: ScopeEnvelopeCodec,
    revocation: Arc<RevocationList>,
}

impl PermissionGate {
    #[must_use]
    pub fn new(codec: ScopeEnvelopeCodec, revocation: Arc<RevocationList>) -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
            codec,
            revocation,
        }
    }

    /// Install or replace the scope grant and its signed envelope for
    /// `(community, module)`. The envelope is what gets embedded in the
    /// `ExecuteRequest` built for a dispatch against this module.
    pub fn set_grant(&self, grant: ScopeGrant, envelope: impl Into<String>) {
        let key = (grant.community_id.clone(), grant.module.clone());
        self.grants
            .write()
            .expect("grants lock poisoned")
            .insert(key, GrantRecord { grant, envelope: envelope.into() });
    }

    /// Verify the module's signed scope envelope (signature, expiry,
    /// revocation) and check that its grant satisfies `required_scopes`.
    /// Returns the granted scopes and the envelope token, for inclusion in
    /// the resulting `ExecuteRequest`.
    pub async fn authorize(
        &self,
        community_id: &CommunityId,
        module: &ModuleId,
        required_scopes: &[Scope],
    ) -> Result<(Vec<Scope>, String), RouterError> {
        let envelope = {
            let grants = self.grants.read().expect("grants lock poisoned");
            let Some(record) = grants.get(&(community_id.clone(), module.clone())) else {
                return Err(RouterError::PermissionDenied {
                    module: module.to_string(),
                });
            };
            if !record.grant.satisfies(required_scopes) {
                return Err(RouterError::PermissionDenied {
                    module: module.to_string(),
                });
            }
            record.envelope.clone()
        };

        let claims = self
            .codec
            .verify(&envelope)
            .map_err(|e| RouterError::InvalidScopeEnvelope(e.to_string()))?;

        if self
            .revocation
            .is_revoked(community_id, &claims.jti)
            .await
            .map_err(|_| RouterError::StoreUnavailable)?
        {
            return Err(RouterError::InvalidScopeEnvelope("envelope revoked".into()));
        }

        Ok((claims.scopes.into_iter().map(Scope::new).collect(), envelope))
    }
}

#[cfg(test)]
mod tests {
    use chatrouter_state::{InMemoryStateStore, StateStore};
    use chrono::Utc;

    use super::*;

    fn gate_with_codec() -> (PermissionGate, ScopeEnvelopeCodec) {
        let codec = ScopeEnvelopeCodec::new(b"test-secret-test-secret-32bytes");
        let signing_codec = ScopeEnvelopeCodec::new(b"test-secret-test-secret-32bytes");
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let revocation = Arc::new(RevocationList::new(store));
        (PermissionGate::new(codec, revocation), signing_codec)
    }

    fn grant(community: &str, module: &str, scopes: Vec<&str>) -> ScopeGrant {
        ScopeGrant {
            community_id: CommunityId::new(community),
            module: ModuleId::new(module),
            scopes: scopes.into_iter().map(Scope::new).collect(),
            granted_by: "admin".into(),
            granted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn satisfied_scopes_authorize() {
        let (gate, codec) = gate_with_codec();
        let token = codec
            .sign(
                "jti-1",
                CommunityId::new("c1"),
                ModuleId::new("weather"),
                vec!["weather.read".into()],
                60,
            )
            .unwrap();
        gate.set_grant(grant("c1", "weather", vec!["weather.read"]), token.clone());

        let (scopes, envelope) = gate
            .authorize(
                &CommunityId::new("c1"),
                &ModuleId::new("weather"),
                &[Scope::new("weather.read")],
            )
            .await
            .unwrap();
        assert_eq!(scopes, vec![Scope::new("weather.read")]);
        assert_eq!(envelope, token);
    }

    #[tokio::test]
    async fn missing_grant_is_denied() {
        let (gate, _codec) = gate_with_codec();
        let err = gate
            .authorize(
                &CommunityId::new("c1"),
                &ModuleId::new("weather"),
                &[Scope::new("weather.read")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn insufficient_scopes_are_denied() {
        let (gate, codec) = gate_with_codec();
        let token = codec
            .sign(
                "jti-2",
                CommunityId::new("c1"),
                ModuleId::new("weather"),
                vec!["weather.read".into()],
                60,
            )
            .unwrap();
        gate.set_grant(grant("c1", "weather", vec!["weather.read"]), token);

        let err = gate
            .authorize(
                &CommunityId::new("c1"),
                &ModuleId::new("weather"),
                &[Scope::new("weather.write")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn revoked_envelope_is_rejected() {
        let (gate, codec) = gate_with_codec();
        let token = codec
            .sign("jti-3", CommunityId::new("c1"), ModuleId::new("weather"), vec![], 60)
            .unwrap();
        gate.set_grant(grant("c1", "weather", vec!["*"]), token);
        gate.revocation
            .revoke(&CommunityId::new("c1"), "jti-3", std::time::Duration::from_secs(60))
            .await
            .unwrap();

        let err = gate
            .authorize(&CommunityId::new("c1"), &ModuleId::new("weather"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidScopeEnvelope(_)));
    }

    #[tokio::test]
    async fn wildcard_scope_satisfies_requirement() {
        let (gate, codec) = gate_with_codec();
        let token = codec
            .sign("jti-4", CommunityId::new("c1"), ModuleId::new("weather"), vec![], 60)
            .unwrap();
        gate.set_grant(grant("c1", "weather", vec!["*"]), token);
        assert!(
            gate.authorize(
                &CommunityId::new("c1"),
                &ModuleId::new("weather"),
                &[Scope::new("anything")],
            )
            .await
            .is_ok()
        );
    }
}
