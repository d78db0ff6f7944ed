use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decision point an audit record captures (spec.md §4.10's fixed vocabulary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditDecision {
    Routed,
    DeniedPerm,
    DeniedRate,
    CacheHit,
    Dispatched,
    Failed,
    EgressResult,
    NoRoute,
    DeadlineExceeded,
}

/// A single append-only audit record (spec.md §4.10: "stable envelope:
/// event id, correlation id, community, route, decision, timestamps, and
/// outcome details").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub event_id: String,
    pub correlation_id: String,
    pub community_id: String,
    /// Route id this record concerns, absent for event-level records such
    /// as `no-route` or `audit-unavailable`.
    #[serde(default)]
    pub route_id: Option<String>,
    pub decision: AuditDecision,
    pub recorded_at: DateTime<Utc>,
    pub outcome_details: serde_json::Value,
}

impl AuditRecord {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        correlation_id: impl Into<String>,
        community_id: impl Into<String>,
        decision: AuditDecision,
        outcome_details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            correlation_id: correlation_id.into(),
            community_id: community_id.into(),
            route_id: None,
            decision,
            recorded_at: Utc::now(),
            outcome_details,
        }
    }

    #[must_use]
    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }
}

/// Filter parameters for querying recorded audit records (spec.md §4.10
/// mentions "later replay").
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub community_id: Option<String>,
    pub event_id: Option<String>,
    pub decision: Option<AuditDecision>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_attaches_route_id() {
        let record = AuditRecord::new(
            "evt-1",
            "corr-1",
            "c1",
            AuditDecision::Routed,
            serde_json::json!({}),
        )
        .with_route("route-1");
        assert_eq!(record.route_id.as_deref(), Some("route-1"));
    }

    #[test]
    fn effective_limit_clamps_to_range() {
        let mut query = AuditQuery::default();
        assert_eq!(query.effective_limit(), 50);
        query.limit = Some(5000);
        assert_eq!(query.effective_limit(), 1000);
        query.limit = Some(0);
        assert_eq!(query.effective_limit(), 1);
    }
}
