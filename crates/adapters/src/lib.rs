pub mod gcp_function;
pub mod grpc;
pub mod in_process;
pub mod lambda;
pub mod openwhisk;
pub mod webhook;

pub use gcp_function::{GcpFunctionAdapter, GcpFunctionConfig};
pub use grpc::{GrpcAdapter, GrpcExecuteService};
pub use in_process::{InProcessAdapter, InProcessHandler};
pub use lambda::{InvocationMode, LambdaAdapter, LambdaConfig};
pub use openwhisk::{OpenWhiskAdapter, OpenWhiskConfig};
pub use webhook::{WebhookAdapter, WebhookConfig};
