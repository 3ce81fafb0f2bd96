//! Latency instrumentation Tower Layer
//!
//! Observes the duration of every call, labelled by method and by whether
//! the call succeeded (no error and no failure inside the response).

use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use prometheus::HistogramVec;
use tower::{Layer, Service};

use crate::endpoint::Failer;
use crate::error::TokenServiceError;

/// Instrumentation layer for Tower
#[derive(Clone)]
pub struct InstrumentingLayer {
    method: &'static str,
    duration: HistogramVec,
}

impl InstrumentingLayer {
    /// Creates a layer observing into `duration` (labels `method`, `success`).
    #[must_use]
    pub const fn new(method: &'static str, duration: HistogramVec) -> Self {
        Self { method, duration }
    }
}

impl<S> Layer<S> for InstrumentingLayer {
    type Service = InstrumentingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentingService {
            inner,
            method: self.method,
            duration: self.duration.clone(),
        }
    }
}

/// Instrumentation service wrapper
#[derive(Clone)]
pub struct InstrumentingService<S> {
    inner: S,
    method: &'static str,
    duration: HistogramVec,
}

impl<S, Req> Service<Req> for InstrumentingService<S>
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
        let mut inner = self.inner.clone();
        let method = self.method;
        let duration = self.duration.clone();

        Box::pin(async move {
            let begin = Instant::now();
            let result = inner.call(req).await.map_err(Into::into);

            let success = matches!(&result, Ok(resp) if resp.failed().is_none());
            duration
                .with_label_values(&[method, if success { "true" } else { "false" }])
                .observe(begin.elapsed().as_secs_f64());

            result
        })
    }
}
