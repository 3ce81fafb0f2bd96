//! Shared library for cross-cutting concerns in the token front-end services.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - Circuit breaker pattern for resilience
//! - Token-bucket rate limiting for outbound calls
//! - Tracing subscriber initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod error;
pub mod rate_limiter;
pub mod tracing_config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::PlatformError;
pub use rate_limiter::{RateLimitDecision, RateLimiter, RateLimiterConfig};
pub use tracing_config::{TracingConfig, init_tracing, init_tracing_with};
