//! Rate Limiter Tower Layer
//!
//! Erroring token bucket: an empty bucket rejects the call with
//! `RateLimited` without invoking the inner service.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use rust_common::RateLimiter;
use tower::{Layer, Service};
use tracing::debug;

use crate::error::TokenServiceError;

/// Rate limiter layer for Tower
#[derive(Clone)]
pub struct RateLimiterLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimiterLayer {
    /// Creates a new rate limiter layer over a shared bucket
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiterService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Rate limiter service wrapper
#[derive(Clone)]
pub struct RateLimiterService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S, Req> Service<Req> for RateLimiterService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
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
        if let Err(denied) = self.limiter.acquire() {
            debug!(retry_after = ?denied.retry_after(), "Rate limit exceeded");
            return Box::pin(futures::future::ready(Err(denied.into())));
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await.map_err(Into::into) })
    }
}
