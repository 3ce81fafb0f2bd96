//! Tower middleware for the endpoint pipeline.
//!
//! Provides the resilience and observability layers plus the functions
//! that compose them into server and client endpoints.

pub mod circuit_breaker;
pub mod instrumenting;
pub mod rate_limiter;
pub mod stack;
pub mod tracing;

pub use circuit_breaker::{CircuitBreakerLayer, CircuitBreakerService};
pub use instrumenting::{InstrumentingLayer, InstrumentingService};
pub use rate_limiter::{RateLimiterLayer, RateLimiterService};
pub use stack::{GET_TOKEN, client_endpoint, server_endpoint};
pub use self::tracing::{SpanKind, TracingLayer, TracingService};
