pub mod builder;
pub mod circuit_breaker;
pub mod dispatcher;
pub mod egress;
pub mod error;
pub mod permissions;
pub mod retry;

pub use builder::GatewayBuilder;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, Permit};
pub use dispatcher::Dispatcher;
pub use egress::{EgressRegistry, EgressSink};
pub use error::GatewayError;
pub use permissions::PermissionGate;
pub use retry::{retry_with_backoff, FailureClass, RetryPolicy};
