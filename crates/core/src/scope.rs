use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::types::{CommunityId, ModuleId, Scope};

/// A `(community, module) -> granted scopes` record (spec.md §3
/// `ScopeGrant`). Owned and mutated by the admin plane; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeGrant {
    pub community_id: CommunityId,
    pub module: ModuleId,
    pub scopes: Vec<Scope>,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

impl ScopeGrant {
    /// True if every scope in `required` is present in this grant, honoring
    /// the `*` wildcard (spec.md §4.3).
    #[must_use]
    pub fn satisfies(&self, required: &[Scope]) -> bool {
        if self.scopes.iter().any(Scope::is_wildcard) {
            return true;
        }
        required.iter().all(|req| self.scopes.contains(req))
    }
}

/// Claims carried in the short-lived signed scope envelope the admin plane
/// issues when a module is granted access (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeEnvelopeClaims {
    pub jti: String,
    pub community_id: CommunityId,
    pub module: ModuleId,
    pub scopes: Vec<String>,
    /// Expiry, seconds since epoch (JWT `exp` convention).
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ScopeEnvelopeError {
    #[error("envelope signature invalid or expired: {0}")]
    Invalid(String),
    #[error("envelope has been revoked")]
    Revoked,
}

/// Signs and verifies scope envelopes with a symmetric secret
/// (`SCOPE_ENVELOPE_SECRET`, spec.md §6).
pub struct ScopeEnvelopeCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl ScopeEnvelopeCodec {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a new envelope for `(community, module)` with the given scopes,
    /// expiring `ttl_seconds` from now.
    pub fn sign(
        &self,
        jti: impl Into<String>,
        community_id: CommunityId,
        module: ModuleId,
        scopes: Vec<String>,
        ttl_seconds: i64,
    ) -> Result<String, ScopeEnvelopeError> {
        let claims = ScopeEnvelopeClaims {
            jti: jti.into(),
            community_id,
            module,
            scopes,
            exp: (Utc::now().timestamp() + ttl_seconds),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ScopeEnvelopeError::Invalid(e.to_string()))
    }

    /// Verify signature and expiry, returning the decoded claims. Does not
    /// check the revocation list — callers must check `jti` against it
    /// (`StateStore::is_revoked`, see `chatrouter-state`).
    pub fn verify(&self, token: &str) -> Result<ScopeEnvelopeClaims, ScopeEnvelopeError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<ScopeEnvelopeClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| ScopeEnvelopeError::Invalid(e.to_string()))
    }
}
