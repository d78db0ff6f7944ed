use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CommunityId, EntityId, Platform, PrincipalId};

/// The end user who triggered an event, scoped to a platform identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub platform_user_id: String,
}

/// A sub-container within a platform (channel, room, guild id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
}

/// Discriminates between a chat command and a generic platform event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Command,
    Event,
}

/// A normalized inbound event, as produced by a per-network ingestion
/// adapter (out of scope for this crate — only the wire shape is owned
/// here). See spec.md §6 for the wire-stable schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub community_id: CommunityId,
    pub platform: Platform,
    pub entity: Entity,
    pub user: Principal,
    pub kind: EventKind,
    /// Raw command text. Present when `kind == Command`.
    #[serde(default)]
    pub text: Option<String>,
    /// Event-type tag. Present when `kind == Event`.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Typed event payload. Present when `kind == Event`.
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
}

impl Event {
    /// Validate the structural invariants ingress must enforce before an
    /// event is accepted (spec.md §4.1): community and platform are
    /// required, and the payload matches the declared `kind`.
    pub fn validate(&self) -> Result<(), String> {
        if self.community_id.as_str().is_empty() {
            return Err("missing community_id".to_owned());
        }
        if self.platform.as_str().is_empty() {
            return Err("missing platform".to_owned());
        }
        match self.kind {
            EventKind::Command if self.text.is_none() => {
                Err("command event missing text".to_owned())
            }
            EventKind::Event if self.event_type.is_none() => {
                Err("platform event missing event_type".to_owned())
            }
            _ => Ok(()),
        }
    }

    /// Build a minimal command event, generating a fresh id and timestamp.
    /// Convenient for tests and for ingress adapters constructing events
    /// programmatically.
    #[must_use]
    pub fn new_command(
        community_id: impl Into<CommunityId>,
        platform: impl Into<Platform>,
        entity_id: impl Into<EntityId>,
        user: Principal,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            community_id: community_id.into(),
            platform: platform.into(),
            entity: Entity { id: entity_id.into() },
            user,
            kind: EventKind::Command,
            text: Some(text.into()),
            event_type: None,
            event_data: None,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }
}
