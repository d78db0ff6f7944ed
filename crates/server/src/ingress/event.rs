use chrono::{DateTime, Utc};
use chatrouter_core::{CommunityId, Entity, Event, EventKind, Platform, Principal};
use serde::Deserialize;
use uuid::Uuid;

/// The wire shape events actually arrive in (spec.md §6): a flat
/// `entity_id` next to a nested `user` object, unlike the router's own
/// [`Event`], which nests `entity` the same way it nests `user`. Ingress
/// owns the translation so the rest of the pipeline never sees the
/// difference.
#[derive(Debug, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub community_id: String,
    pub platform: String,
    pub entity_id: String,
    pub user: InboundPrincipal,
    pub kind: InboundEventKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InboundPrincipal {
    pub id: String,
    pub username: String,
    pub platform_user_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundEventKind {
    Command,
    Event,
}

impl TryFrom<InboundEvent> for Event {
    type Error = String;

    fn try_from(raw: InboundEvent) -> Result<Self, Self::Error> {
        let event = Event {
            id: raw.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            community_id: CommunityId::new(raw.community_id),
            platform: Platform::new(raw.platform),
            entity: Entity {
                id: raw.entity_id.into(),
            },
            user: Principal {
                id: raw.user.id.into(),
                username: raw.user.username,
                platform_user_id: raw.user.platform_user_id,
            },
            kind: match raw.kind {
                InboundEventKind::Command => EventKind::Command,
                InboundEventKind::Event => EventKind::Event,
            },
            text: raw.text,
            event_type: raw.event_type,
            event_data: raw.event_data,
            timestamp: raw.timestamp.unwrap_or_else(Utc::now),
            correlation_id: raw.correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        };
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "community_id": "c1",
            "platform": "discord",
            "entity_id": "chan1",
            "user": { "id": "u1", "username": "alice", "platform_user_id": "p1" },
            "kind": "command",
            "text": "!weather London",
            "correlation_id": "corr-1",
        })
    }

    #[test]
    fn converts_flat_entity_id_into_nested_entity() {
        let raw: InboundEvent = serde_json::from_value(sample_json()).unwrap();
        let event = Event::try_from(raw).unwrap();
        assert_eq!(event.entity.id.as_str(), "chan1");
        assert_eq!(event.user.username, "alice");
        assert_eq!(event.correlation_id, "corr-1");
    }

    #[test]
    fn command_without_text_is_rejected() {
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("text");
        let raw: InboundEvent = serde_json::from_value(json).unwrap();
        assert!(Event::try_from(raw).is_err());
    }

    #[test]
    fn missing_id_and_timestamp_are_generated() {
        let raw: InboundEvent = serde_json::from_value(sample_json()).unwrap();
        let event = Event::try_from(raw).unwrap();
        assert!(!event.id.is_empty());
    }
}
