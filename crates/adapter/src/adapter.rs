use async_trait::async_trait;
use chatrouter_core::{EventContext, ExecuteRequest, ExecuteResponse};

use crate::error::AdapterError;
use crate::health::AdapterHealthSnapshot;

/// Strongly-typed adapter trait with native `async fn` (spec.md §4.6:
/// "Adapters are a capability interface, not an inheritance hierarchy").
///
/// Not object-safe, since native `async fn` methods desugar to opaque
/// `impl Future` return types. For dynamic dispatch behind
/// `Arc<dyn DynAdapter>`, use [`DynAdapter`] -- every `Adapter` automatically
/// implements it via the blanket impl below.
pub trait Adapter: Send + Sync {
    /// Unique name of this adapter instance, used in circuit-breaker keys
    /// and audit records.
    fn name(&self) -> &str;

    /// Execute the given request under the supplied event context and
    /// return the adapter's response.
    fn execute(
        &self,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> impl std::future::Future<Output = Result<ExecuteResponse, AdapterError>> + Send;

    /// Perform a health check against the adapter's target.
    fn health_check(
        &self,
    ) -> impl std::future::Future<Output = Result<(), AdapterError>> + Send;

    /// Rolling health counters for `/healthz` reporting (spec.md §4.7).
    /// `None` for adapters that don't track a rolling window.
    fn health_snapshot(&self) -> Option<AdapterHealthSnapshot> {
        None
    }
}

/// Object-safe adapter trait for use behind `Arc<dyn DynAdapter>`.
///
/// You generally should not implement this trait directly -- implement
/// [`Adapter`] and rely on the blanket implementation.
#[async_trait]
pub trait DynAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError>;

    async fn health_check(&self) -> Result<(), AdapterError>;

    fn health_snapshot(&self) -> Option<AdapterHealthSnapshot>;
}

#[async_trait]
impl<T: Adapter + Sync> DynAdapter for T {
    fn name(&self) -> &str {
        Adapter::name(self)
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        Adapter::execute(self, request, ctx).await
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        Adapter::health_check(self).await
    }

    fn health_snapshot(&self) -> Option<AdapterHealthSnapshot> {
        Adapter::health_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatrouter_core::{CommunityId, Entity, ModuleId, Principal};

    use super::*;

    struct MockAdapter {
        adapter_name: String,
        should_fail: bool,
    }

    impl Adapter for MockAdapter {
        fn name(&self) -> &str {
            &self.adapter_name
        }

        async fn execute(
            &self,
            _request: &ExecuteRequest,
            _ctx: &EventContext,
        ) -> Result<ExecuteResponse, AdapterError> {
            if self.should_fail {
                return Err(AdapterError::Http(500));
            }
            Ok(ExecuteResponse::success("ok", vec![]))
        }

        async fn health_check(&self) -> Result<(), AdapterError> {
            if self.should_fail {
                return Err(AdapterError::Connection("mock unhealthy".into()));
            }
            Ok(())
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
            "!weather",
            "London",
            vec![],
            "token",
        )
    }

    #[tokio::test]
    async fn adapter_execute_success() {
        let adapter = MockAdapter {
            adapter_name: "test".into(),
            should_fail: false,
        };
        let ctx = EventContext::with_default_deadline("corr-1");
        let resp = Adapter::execute(&adapter, &request(), &ctx).await.unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn blanket_dyn_adapter_impl() {
        let adapter: Arc<dyn DynAdapter> = Arc::new(MockAdapter {
            adapter_name: "dyn-test".into(),
            should_fail: false,
        });
        assert_eq!(adapter.name(), "dyn-test");
        let ctx = EventContext::with_default_deadline("corr-1");
        let resp = adapter.execute(&request(), &ctx).await.unwrap();
        assert!(resp.success);
        adapter.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn dyn_adapter_propagates_failure() {
        let adapter: Arc<dyn DynAdapter> = Arc::new(MockAdapter {
            adapter_name: "sick".into(),
            should_fail: true,
        });
        let ctx = EventContext::with_default_deadline("corr-1");
        let err = adapter.execute(&request(), &ctx).await.unwrap_err();
        assert!(matches!(err, AdapterError::Http(500)));
    }
}
