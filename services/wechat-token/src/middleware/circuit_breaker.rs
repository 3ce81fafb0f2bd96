//! Circuit breaker Tower Layer
//!
//! Fails fast with `CircuitOpen` while the shared breaker is open. Calls
//! that error, or whose response carries a failure, count against the
//! breaker; everything else counts as a success.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use prometheus::IntGaugeVec;
use rust_common::CircuitBreaker;
use tower::{Layer, Service};

use crate::endpoint::Failer;
use crate::error::TokenServiceError;

/// Circuit breaker layer for Tower
#[derive(Clone)]
pub struct CircuitBreakerLayer {
    breaker: Arc<CircuitBreaker>,
    state_gauge: Option<IntGaugeVec>,
}

impl CircuitBreakerLayer {
    /// Guards the inner service with `breaker`.
    #[must_use]
    pub const fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            breaker,
            state_gauge: None,
        }
    }

    /// Publish the breaker state on `gauge` (label `circuit`).
    #[must_use]
    pub fn with_state_gauge(mut self, gauge: IntGaugeVec) -> Self {
        self.state_gauge = Some(gauge);
        self
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: Arc::clone(&self.breaker),
            state_gauge: self.state_gauge.clone(),
        }
    }
}

/// Circuit breaker service wrapper
#[derive(Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: Arc<CircuitBreaker>,
    state_gauge: Option<IntGaugeVec>,
}

async fn publish_state(breaker: &CircuitBreaker, gauge: Option<&IntGaugeVec>) {
    if let Some(gauge) = gauge {
        gauge
            .with_label_values(&[breaker.name()])
            .set(breaker.state().await.as_gauge());
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Failer + Send + 'static,
    S::Error: Into<TokenServiceError> + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = TokenServiceError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = Arc::clone(&self.breaker);
        let gauge = self.state_gauge.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Err(rejected) = breaker.acquire().await {
                publish_state(&breaker, gauge.as_ref()).await;
                return Err(rejected.into());
            }

            let result = inner.call(req).await.map_err(Into::into);
            let failed = match &result {
                Ok(resp) => resp.failed().is_some(),
                Err(_) => true,
            };
            if failed {
                breaker.record_failure().await;
            } else {
                breaker.record_success().await;
            }
            publish_state(&breaker, gauge.as_ref()).await;

            result
        })
    }
}
