pub mod adapter;
pub mod error;
pub mod health;
pub mod registry;

pub use adapter::{Adapter, DynAdapter};
pub use error::AdapterError;
pub use health::{AdapterHealthCounters, AdapterHealthSnapshot};
pub use registry::AdapterRegistry;
