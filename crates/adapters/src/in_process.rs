use std::sync::Arc;

use async_trait::async_trait;
use chatrouter_adapter::{Adapter, AdapterError, AdapterHealthCounters, AdapterHealthSnapshot};
use chatrouter_core::{EventContext, ExecuteRequest, ExecuteResponse};

/// A module's direct-call handler (spec.md §4.7: "In-Process | direct call |
/// scope envelope only"). No transport boundary -- the handler runs in the
/// same process and address space as the dispatcher.
#[async_trait]
pub trait InProcessHandler: Send + Sync {
    async fn call(
        &self,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError>;
}

/// Wraps an [`InProcessHandler`] as an [`Adapter`], tracking health counters
/// the way every other adapter variant does.
pub struct InProcessAdapter {
    name: String,
    handler: Arc<dyn InProcessHandler>,
    counters: AdapterHealthCounters,
}

impl InProcessAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, handler: Arc<dyn InProcessHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            counters: AdapterHealthCounters::default(),
        }
    }

    #[must_use]
    pub fn health_snapshot(&self) -> AdapterHealthSnapshot {
        self.counters.snapshot(self.name.clone())
    }
}

impl Adapter for InProcessAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        match self.handler.call(request, ctx).await {
            Ok(response) => {
                self.counters.record_success();
                Ok(response)
            }
            Err(err) => {
                self.counters.record_failure(err.to_string());
                Err(err)
            }
        }
    }

    fn health_snapshot(&self) -> Option<AdapterHealthSnapshot> {
        Some(self.health_snapshot())
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chatrouter_core::{CommunityId, Entity, ModuleId, Principal};

    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl InProcessHandler for EchoHandler {
        async fn call(
            &self,
            request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            Ok(ExecuteResponse::success(request.command.clone(), vec![]))
        }
    }

    fn request() -> ExecuteRequest {
        ExecuteRequest::new(
            CommunityId::new("c1"),
            Principal {
                id: "u1".into(),
                username: "alice".into(),
                platform_user_id: "p1".into(),
            },
            Entity { id: "chan1".into() },
            ModuleId::new("weather"),
            "weather",
            "London",
            vec![],
            "token",
        )
    }

    #[tokio::test]
    async fn dispatches_to_handler_and_records_success() {
        let adapter = InProcessAdapter::new("weather-local", Arc::new(EchoHandler));
        let ctx = EventContext::with_default_deadline("corr-1");
        let resp = adapter.execute(&request(), &ctx).await.unwrap();
        assert_eq!(resp.message.as_deref(), Some("weather"));
        assert_eq!(adapter.health_snapshot().successes, 1);
    }

    struct FailingHandler;

    #[async_trait]
    impl InProcessHandler for FailingHandler {
        async fn call(
            &self,
            _request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            Err(AdapterError::Configuration("no handler registered".into()))
        }
    }

    #[tokio::test]
    async fn failure_is_propagated_and_counted() {
        let adapter = InProcessAdapter::new("broken", Arc::new(FailingHandler));
        let ctx = EventContext::with_default_deadline("corr-1");
        let err = adapter.execute(&request(), &ctx).await.unwrap_err();
        assert!(matches!(err, AdapterError::Configuration(_)));
        assert_eq!(adapter.health_snapshot().failures, 1);
    }
}
