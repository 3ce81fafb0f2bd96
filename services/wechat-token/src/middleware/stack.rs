//! Endpoint pipelines.
//!
//! The server pipeline wraps the core service; the client pipeline wraps a
//! wire transport. Both produce the same boxed [`Endpoint`] type.

use std::sync::Arc;

use rust_common::{CircuitBreaker, RateLimiter};
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder};

use super::{CircuitBreakerLayer, InstrumentingLayer, RateLimiterLayer, TracingLayer};
use crate::endpoint::{Endpoint, GetTokenEndpoint, GetTokenResponse, Invocation};
use crate::error::TokenServiceError;
use crate::observability::Metrics;
use crate::service::TokenService;

/// Operation name used for spans, metrics and the breaker.
pub const GET_TOKEN: &str = "GetToken";

/// Server pipeline: instrumentation, tracing, circuit breaker, then the
/// core service.
#[must_use]
pub fn server_endpoint(
    service: Arc<dyn TokenService>,
    metrics: &Metrics,
    breaker: Arc<CircuitBreaker>,
    tracing_enabled: bool,
) -> Endpoint {
    let svc = ServiceBuilder::new()
        .layer(InstrumentingLayer::new(
            GET_TOKEN,
            metrics.request_duration.clone(),
        ))
        .layer(TracingLayer::server(GET_TOKEN).enabled(tracing_enabled))
        .layer(
            CircuitBreakerLayer::new(breaker)
                .with_state_gauge(metrics.circuit_breaker_state.clone()),
        )
        .service(GetTokenEndpoint::new(service));

    BoxCloneService::new(svc)
}

/// Client pipeline: rate limiter, circuit breaker, tracing, then `wire`.
///
/// A rate-limited call never reaches the breaker or the wire.
pub fn client_endpoint<W>(
    wire: W,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    tracing_enabled: bool,
) -> Endpoint
where
    W: Service<Invocation, Response = GetTokenResponse> + Clone + Send + 'static,
    W::Error: Into<TokenServiceError> + Send + 'static,
    W::Future: Send + 'static,
{
    let svc = ServiceBuilder::new()
        .layer(RateLimiterLayer::new(limiter))
        .layer(CircuitBreakerLayer::new(breaker))
        .layer(TracingLayer::client(GET_TOKEN).enabled(tracing_enabled))
        .service(wire);

    BoxCloneService::new(svc)
}
