use chatrouter_core::CommunityId;
use serde::{Deserialize, Serialize};

/// The kind of state being stored, mirroring the router's own owned state
/// (spec.md §3 `RateBucket`/`CacheEntry`/`CircuitState`, plus the
/// scope-envelope revocation list supplemented in SPEC_FULL.md §10.6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    RateLimit,
    ResponseCache,
    CircuitBreaker,
    ScopeRevocation,
}

impl KeyKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ResponseCache => "response_cache",
            Self::CircuitBreaker => "circuit_breaker",
            Self::ScopeRevocation => "scope_revocation",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key identifying a single piece of shared state, scoped to a
/// community so that tenants never observe each other's buckets, cache
/// entries, or breaker state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub community: CommunityId,
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    #[must_use]
    pub fn new(community: CommunityId, kind: KeyKind, id: impl Into<String>) -> Self {
        Self {
            community,
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.community, self.kind, self.id)
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_format() {
        let key = StateKey::new(CommunityId::new("c1"), KeyKind::RateLimit, "mod:weather");
        assert_eq!(key.canonical(), "c1:rate_limit:mod:weather");
    }
}
