use aws_config::BehaviorVersion;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType as SdkInvocationType;
use chatrouter_adapter::{Adapter, AdapterError, AdapterHealthCounters, AdapterHealthSnapshot};
use chatrouter_core::{AdapterPayload, EventContext, ExecuteRequest, ExecuteResponse};
use tracing::{debug, error};

/// Whether a Lambda invoke waits for the function's result or returns as
/// soon as the invocation is enqueued (spec.md §4.7 Lambda row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    Sync,
    Async,
}

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub region: String,
    pub function_name: String,
    pub qualifier: Option<String>,
    pub mode: InvocationMode,
}

impl LambdaConfig {
    #[must_use]
    pub fn new(region: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            function_name: function_name.into(),
            qualifier: None,
            mode: InvocationMode::Sync,
        }
    }

    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Adapter variant that invokes an AWS Lambda function, synchronously or
/// fire-and-forget (spec.md §4.7 Lambda row).
pub struct LambdaAdapter {
    name: String,
    config: LambdaConfig,
    client: aws_sdk_lambda::Client,
    counters: AdapterHealthCounters,
}

impl LambdaAdapter {
    pub async fn new(name: impl Into<String>, config: LambdaConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;
        let client = aws_sdk_lambda::Client::new(&sdk_config);
        Self {
            name: name.into(),
            config,
            client,
            counters: AdapterHealthCounters::default(),
        }
    }

    /// For tests: inject a pre-built client against a local Lambda endpoint.
    #[must_use]
    pub fn with_client(
        name: impl Into<String>,
        config: LambdaConfig,
        client: aws_sdk_lambda::Client,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            client,
            counters: AdapterHealthCounters::default(),
        }
    }

    #[must_use]
    pub fn health_snapshot(&self) -> AdapterHealthSnapshot {
        self.counters.snapshot(self.name.clone())
    }
}

fn classify_lambda_error(message: &str) -> AdapterError {
    let lower = message.to_lowercase();
    if lower.contains("throttl") || lower.contains("toomanyrequests") {
        AdapterError::Throttled
    } else if lower.contains("timeout") {
        AdapterError::Timeout
    } else if lower.contains("resourcenotfound") {
        AdapterError::NotFound(message.to_owned())
    } else {
        AdapterError::Connection(message.to_owned())
    }
}

impl Adapter for LambdaAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &ExecuteRequest,
        _ctx: &EventContext,
    ) -> Result<ExecuteResponse, AdapterError> {
        let payload = AdapterPayload::from(request);
        let body = serde_json::to_vec(&payload)
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;

        let invocation_type = match self.config.mode {
            InvocationMode::Sync => SdkInvocationType::RequestResponse,
            InvocationMode::Async => SdkInvocationType::Event,
        };

        debug!(
            function_name = %self.config.function_name,
            mode = ?self.config.mode,
            "invoking Lambda adapter"
        );

        let mut invoke = self
            .client
            .invoke()
            .function_name(&self.config.function_name)
            .invocation_type(invocation_type)
            .payload(Blob::new(body));
        if let Some(qualifier) = &self.config.qualifier {
            invoke = invoke.qualifier(qualifier);
        }

        let result = invoke.send().await.map_err(|e| {
            let message = e.to_string();
            error!(error = %message, "Lambda invoke failed");
            classify_lambda_error(&message)
        })?;

        if self.config.mode == InvocationMode::Async {
            self.counters.record_success();
            return Ok(ExecuteResponse::success("enqueued", vec![]));
        }

        if let Some(function_error) = result.function_error() {
            self.counters.record_failure(function_error.to_owned());
            return Err(AdapterError::Configuration(format!(
                "Lambda function error: {function_error}"
            )));
        }

        let response_payload = result
            .payload()
            .and_then(|blob| serde_json::from_slice::<serde_json::Value>(blob.as_ref()).ok())
            .unwrap_or(serde_json::Value::Null);

        let response: ExecuteResponse = serde_json::from_value(response_payload)
            .map_err(|e| AdapterError::Serialization(e.to_string()))?;

        if response.success {
            self.counters.record_success();
        } else {
            self.counters.record_failure("lambda reported failure");
        }
        Ok(response)
    }

    fn health_snapshot(&self) -> Option<AdapterHealthSnapshot> {
        Some(self.health_snapshot())
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.client
            .get_function()
            .function_name(&self.config.function_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }
}
