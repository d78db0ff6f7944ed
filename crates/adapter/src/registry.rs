use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::DynAdapter;

/// Maps module names to the adapter instance that executes their dispatches
/// (spec.md §4.6 adapter selection). Built once at startup and shared
/// read-only across dispatch tasks.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn DynAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter. Its [`DynAdapter::name`] is used as the lookup
    /// key; registering the same name twice replaces the earlier adapter.
    pub fn register(&mut self, adapter: Arc<dyn DynAdapter>) {
        self.adapters.insert(adapter.name().to_owned(), adapter);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DynAdapter>> {
        self.adapters.get(name).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chatrouter_core::{EventContext, ExecuteRequest, ExecuteResponse};

    use super::*;
    use crate::adapter::Adapter;
    use crate::error::AdapterError;

    struct StubAdapter {
        stub_name: String,
    }

    impl Adapter for StubAdapter {
        fn name(&self) -> &str {
            &self.stub_name
        }

        async fn execute(
            &self,
            _request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            Ok(ExecuteResponse::success("ok", vec![]))
        }

        async fn health_check(&self) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter {
            stub_name: "webhook".into(),
        }));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("webhook").is_some());
        assert!(registry.get("lambda").is_none());
    }

    #[test]
    fn list_sorted() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter {
            stub_name: "webhook".into(),
        }));
        registry.register(Arc::new(StubAdapter {
            stub_name: "grpc".into(),
        }));
        assert_eq!(registry.list(), vec!["grpc", "webhook"]);
    }
}
