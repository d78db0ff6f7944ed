use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{Entity, Principal};
use crate::types::{CommunityId, ModuleId, Scope};

/// A request synthesized per dispatch and sent to an adapter (spec.md §3
/// `ExecuteRequest`). Immutable once sent; retries reuse the same `id` so
/// downstream systems can deduplicate (spec.md §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub id: String,
    pub community_id: CommunityId,
    pub principal: Principal,
    pub entity: Entity,
    pub module: ModuleId,
    /// The matched command, e.g. `"!weather"`.
    pub command: String,
    /// Text remaining after the matched token, e.g. `"London"`.
    pub context_text: String,
    /// Typed event payload, present for platform-event dispatches.
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
    pub selected_scopes: Vec<Scope>,
    /// Compact signed scope envelope, verified by the permission gate
    /// before this request was built.
    pub scope_envelope: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecuteRequest {
    /// Construct a request carrying a fresh `request_id`; a retry of the
    /// same logical dispatch should call `with_request_id` to preserve
    /// identity instead of calling this again.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        community_id: CommunityId,
        principal: Principal,
        entity: Entity,
        module: ModuleId,
        command: impl Into<String>,
        context_text: impl Into<String>,
        selected_scopes: Vec<Scope>,
        scope_envelope: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            community_id,
            principal,
            entity,
            module,
            command: command.into(),
            context_text: context_text.into(),
            event_data: None,
            selected_scopes,
            scope_envelope: scope_envelope.into(),
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// The adapter request payload on the wire (spec.md §6). `ExecuteRequest`
/// is the router's internal record; this is what crosses the transport
/// boundary to Webhook/gRPC/Lambda/etc. adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterPayload {
    pub community: AdapterCommunity,
    pub trigger: AdapterTrigger,
    pub user: Principal,
    pub entity: Entity,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterCommunity {
    pub id: CommunityId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterTrigger {
    pub command: String,
    pub context_text: String,
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
}

impl From<&ExecuteRequest> for AdapterPayload {
    fn from(req: &ExecuteRequest) -> Self {
        Self {
            community: AdapterCommunity {
                id: req.community_id.clone(),
            },
            trigger: AdapterTrigger {
                command: req.command.clone(),
                context_text: req.context_text.clone(),
                event_data: req.event_data.clone(),
            },
            user: req.principal.clone(),
            entity: req.entity.clone(),
            request_id: req.request_id.clone(),
            timestamp: req.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            id: "u1".into(),
            username: "alice".into(),
            platform_user_id: "p1".into(),
        }
    }

    #[test]
    fn payload_mirrors_request_fields() {
        let req = ExecuteRequest::new(
            CommunityId::new("c1"),
            principal(),
            Entity { id: "chan1".into() },
            ModuleId::new("weather"),
            "!weather",
            "London",
            vec![],
            "envelope-token",
        );
        let payload = AdapterPayload::from(&req);
        assert_eq!(payload.trigger.command, "!weather");
        assert_eq!(payload.trigger.context_text, "London");
        assert_eq!(payload.request_id, req.request_id);
    }
}
