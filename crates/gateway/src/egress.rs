use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chatrouter_core::{Entity, ExecuteResponse};

/// Contract for an outbound per-network delivery adapter (spec.md §1 lists
/// these as an external collaborator; only the contract is owned here).
/// Implementations live outside this crate -- Discord send-message,
/// Twitch chat reply, and so on.
#[async_trait]
pub trait EgressSink: Send + Sync {
    /// Name matching the platform string carried in an
    /// [`chatrouter_core::EgressTarget`] (e.g. `"discord"`).
    fn platform(&self) -> &str;

    async fn send(&self, entity: &Entity, response: &ExecuteResponse) -> Result<(), String>;
}

/// Registry of outbound delivery adapters, keyed by platform name, used to
/// resolve an [`chatrouter_core::EgressTarget`] during fan-out (spec.md
/// §4.9).
#[derive(Default)]
pub struct EgressRegistry {
    sinks: HashMap<String, Arc<dyn EgressSink>>,
}

impl EgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: HashMap::new(),
        }
    }

    pub fn register(&mut self, sink: Arc<dyn EgressSink>) {
        self.sinks.insert(sink.platform().to_owned(), sink);
    }

    #[must_use]
    pub fn get(&self, platform: &str) -> Option<Arc<dyn EgressSink>> {
        self.sinks.get(platform).cloned()
    }
}
