use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ModuleId, Scope};

/// How a route's pattern is matched against a command event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutePattern {
    /// Matches the normalized leading command token exactly.
    Exact { command: String },
    /// Matches any of a set of aliases exactly.
    Alias { aliases: Vec<String> },
    /// Matches the longest registered prefix of the normalized text.
    Prefix { prefix: String },
    /// Matches a platform-event type tag (spec.md §4.2 step 4).
    EventType { event_type: String },
}

/// Named rate-limit tiers a route can declare (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitClass {
    Chatty,
    Expensive,
    Admin,
}

impl RateLimitClass {
    /// Default `(capacity, tokens_per_second)` for this class. Operators may
    /// override via configuration; these are the fallback values.
    #[must_use]
    pub fn default_bucket_params(self) -> (u64, f64) {
        match self {
            Self::Chatty => (20, 10.0 / 60.0),
            Self::Expensive => (5, 1.0 / 60.0),
            Self::Admin => (50, 5.0),
        }
    }
}

/// Caching behavior a route opts into (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicy {
    /// TTL for cache entries. `None`/zero disables caching for this route.
    #[serde(default)]
    pub ttl: Option<Duration>,
    /// Whether the fingerprint includes the principal id (open question 2
    /// in DESIGN.md: opt-in, default `false`).
    #[serde(default)]
    pub user_scoped: bool,
    /// Whether failure responses may be cached (default `false`).
    #[serde(default)]
    pub cache_failures: bool,
}

impl CachePolicy {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            ttl: None,
            user_scoped: false,
            cache_failures: false,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some_and(|ttl| !ttl.is_zero())
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// How an `ExecuteResponse`'s targets should be resolved to outbound
/// platforms. `SameAsOrigin` is the common case (reply on the platform the
/// event came from); `Explicit` lets a route hard-code a fan-out set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSelection {
    SameAsOrigin,
    Explicit { platforms: Vec<String> },
}

impl Default for TargetSelection {
    fn default() -> Self {
        Self::SameAsOrigin
    }
}

/// A binding from a matching pattern to a module (spec.md §3 `Route`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub pattern: RoutePattern,
    pub module: ModuleId,
    #[serde(default)]
    pub required_scopes: Vec<Scope>,
    pub rate_limit_class: RateLimitClass,
    #[serde(default)]
    pub cache_policy: CachePolicy,
    #[serde(default)]
    pub target_selection: TargetSelection,
    /// Higher priority routes are preferred on a matching tie (spec.md
    /// §4.2 step 3: "ties broken by route priority then by insertion
    /// order"). Lower number sorts first, mirroring the teacher's
    /// `RuleEngine::new` convention.
    #[serde(default)]
    pub priority: i32,
    /// When set, this route's side effects must run in declared order
    /// relative to other ordered routes for the same event (spec.md §4.6,
    /// §5). Unordered routes (the default) dispatch in parallel.
    #[serde(default)]
    pub ordered: bool,
}

/// The resolver's output: a route matched against a specific event, still
/// carrying enough context for the permission gate and dispatcher.
#[derive(Debug, Clone)]
pub struct RouteBinding {
    pub route: Route,
    /// The normalized command token that matched, e.g. `"weather"`; empty
    /// for platform-event bindings.
    pub matched_command: String,
    /// Text remaining after the matched command token is stripped (the
    /// "context text", e.g. "London" in "!weather London").
    pub context_text: String,
}
