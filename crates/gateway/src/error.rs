use thiserror::Error;

/// Errors constructing a [`crate::builder::GatewayBuilder`] into a running
/// [`crate::dispatcher::Dispatcher`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid gateway configuration: {0}")]
    Configuration(String),
}
