use async_trait::async_trait;
use chatrouter_adapter::{Adapter, AdapterError, AdapterHealthCounters, AdapterHealthSnapshot};
use chatrouter_core::{EventContext, ExecuteRequest, ExecuteResponse};
use tonic::transport::Channel;

/// The unary RPC call itself (spec.md §4.7: "protobuf message mirroring JSON
/// schema"). Kept as a capability contract rather than a concrete generated
/// stub: the protobuf schema a module exposes is its own concern, not the
/// router's. Implementors wrap their `tonic`-generated client around the
/// [`Channel`] this adapter connects.
#[async_trait]
pub trait GrpcExecuteService: Send + Sync {
    async fn call(
        &self,
        channel: Channel,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError>;
}

fn classify_status(status: &tonic::Status) -> AdapterError {
    use tonic::Code;
    match status.code() {
        Code::DeadlineExceeded => AdapterError::Timeout,
        Code::ResourceExhausted | Code::Unavailable => AdapterError::Throttled,
        Code::Unauthenticated | Code::PermissionDenied => {
            AdapterError::SignatureMismatch
        }
        Code::NotFound => AdapterError::NotFound(status.message().to_owned()),
        Code::InvalidArgument | Code::FailedPrecondition => {
            AdapterError::Configuration(status.message().to_owned())
        }
        _ => AdapterError::Connection(status.message().to_owned()),
    }
}

/// Adapter variant that calls a module over a `tonic` unary RPC (spec.md
/// §4.7 gRPC row).
pub struct GrpcAdapter {
    name: String,
    channel: Channel,
    service: std::sync::Arc<dyn GrpcExecuteService>,
    counters: AdapterHealthCounters,
}

impl GrpcAdapter {
    pub async fn connect(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        service: std::sync::Arc<dyn GrpcExecuteService>,
        timeout: std::time::Duration,
    ) -> Result<Self, AdapterError> {
        let endpoint = endpoint.into();
        let channel = Channel::from_shared(endpoint)
            .map_err(|e| AdapterError::Configuration(e.to_string()))?
            .timeout(timeout)
            .connect()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            channel,
            service,
            counters: AdapterHealthCounters::default(),
        })
    }

    #[must_use]
    pub fn health_snapshot(&self) -> AdapterHealthSnapshot {
        self.counters.snapshot(self.name.clone())
    }
}

impl Adapter for GrpcAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        match self.service.call(self.channel.clone(), request, ctx).await {
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
        // `Channel` lazily connects per-call; cloning it is cheap and does
        // not itself probe the endpoint, so health is advisory only here --
        // real liveness comes from the execute-path failure counters.
        let _ = self.channel.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_deadline_exceeded_maps_to_timeout() {
        let status = tonic::Status::deadline_exceeded("too slow");
        assert!(matches!(classify_status(&status), AdapterError::Timeout));
    }

    #[test]
    fn status_resource_exhausted_maps_to_throttled() {
        let status = tonic::Status::resource_exhausted("quota");
        assert!(matches!(classify_status(&status), AdapterError::Throttled));
    }

    #[test]
    fn status_unauthenticated_maps_to_signature_mismatch() {
        let status = tonic::Status::unauthenticated("bad token");
        assert!(matches!(
            classify_status(&status),
            AdapterError::SignatureMismatch
        ));
    }

    #[test]
    fn status_not_found_preserves_message() {
        let status = tonic::Status::not_found("no such function");
        match classify_status(&status) {
            AdapterError::NotFound(msg) => assert_eq!(msg, "no such function"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
