use serde::{Deserialize, Serialize};

/// An egress target: either a bare platform name (reply where the event
/// came from) or an explicit override with its own entity (spec.md §6
/// `targets`: `[str | {"type": str, ...}]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EgressTarget {
    Platform(String),
    Override {
        #[serde(rename = "type")]
        platform: String,
        #[serde(flatten)]
        overrides: serde_json::Map<String, serde_json::Value>,
    },
}

impl EgressTarget {
    #[must_use]
    pub fn platform_name(&self) -> &str {
        match self {
            Self::Platform(name) => name,
            Self::Override { platform, .. } => platform,
        }
    }
}

/// The response an adapter emits after executing a request (spec.md §3
/// `ExecuteResponse`). Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub targets: Vec<EgressTarget>,
    /// Set by the adapter to opt a response out of caching even though the
    /// route declares a cache policy (spec.md §4.5's invalidation hook).
    #[serde(default)]
    pub do_not_cache: bool,
}

impl ExecuteResponse {
    #[must_use]
    pub fn success(message: impl Into<String>, targets: Vec<EgressTarget>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
            targets,
            do_not_cache: false,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
            targets: Vec::new(),
            do_not_cache: true,
        }
    }

    /// Whether this response is eligible for caching under `cache_failures`.
    #[must_use]
    pub fn is_cacheable(&self, cache_failures: bool) -> bool {
        if self.do_not_cache {
            return false;
        }
        self.success || cache_failures
    }
}

/// Status of dispatching a single target during egress fan-out (spec.md
/// §4.9, §8 S6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressResult {
    pub platform: String,
    pub status: EgressStatus,
    #[serde(default)]
    pub error: Option<String>,
}
