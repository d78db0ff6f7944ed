pub mod circuit;
pub mod context;
pub mod error;
pub mod event;
pub mod request;
pub mod response;
pub mod route;
pub mod scope;
pub mod types;

pub use circuit::{CircuitBreakerConfig, CircuitState, HealthStatus};
pub use context::{EventContext, DEFAULT_DEADLINE};
pub use error::RouterError;
pub use event::{Entity, Event, EventKind, Principal};
pub use request::{AdapterCommunity, AdapterPayload, AdapterTrigger, ExecuteRequest};
pub use response::{EgressResult, EgressStatus, EgressTarget, ExecuteResponse};
pub use route::{CachePolicy, RateLimitClass, Route, RouteBinding, RoutePattern, TargetSelection};
pub use scope::{ScopeEnvelopeClaims, ScopeEnvelopeCodec, ScopeEnvelopeError, ScopeGrant};
pub use types::{CommunityId, EntityId, ModuleId, Platform, PrincipalId, Scope};
