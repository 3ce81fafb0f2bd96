//! Tracing Tower Layer with W3C trace context
//!
//! Opens one span per call named after the operation. The span continues
//! the trace found in the request context (or starts a new one) and the
//! context handed to the inner service carries the new span, so an outbound
//! call propagates it.

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{Instrument, field, info_span};

use crate::context::TraceContext;
use crate::endpoint::{Failer, Invocation};
use crate::error::TokenServiceError;

/// Which side of the wire a span describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Handling an inbound call
    Server,
    /// Making an outbound call
    Client,
}

impl SpanKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

/// Tracing layer for Tower
#[derive(Debug, Clone)]
pub struct TracingLayer {
    operation: &'static str,
    kind: SpanKind,
    enabled: bool,
}

impl TracingLayer {
    /// Server-side spans for `operation`.
    #[must_use]
    pub const fn server(operation: &'static str) -> Self {
        Self {
            operation,
            kind: SpanKind::Server,
            enabled: true,
        }
    }

    /// Client-side spans for `operation`.
    #[must_use]
    pub const fn client(operation: &'static str) -> Self {
        Self {
            operation,
            kind: SpanKind::Client,
            enabled: true,
        }
    }

    /// Turn the layer into a pass-through when `enabled` is false.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Tracing service wrapper
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    layer: TracingLayer,
}

impl<S> Service<Invocation> for TracingService<S>
where
    S: Service<Invocation> + Clone + Send + 'static,
    S::Response: Failer + Send + 'static,
    S::Error: Into<TokenServiceError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = TokenServiceError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut inv: Invocation) -> Self::Future {
        let mut inner = self.inner.clone();

        if !self.layer.enabled {
            return Box::pin(async move { inner.call(inv).await.map_err(Into::into) });
        }

        let trace = inv
            .ctx
            .trace()
            .map_or_else(TraceContext::new_root, TraceContext::child);

        let span = info_span!(
            "endpoint",
            otel.name = self.layer.operation,
            otel.kind = self.layer.kind.as_str(),
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            parent_span_id = field::Empty,
            app_id = %inv.request.app_id,
            error = field::Empty,
        );
        if let Some(parent) = trace.parent_span_id() {
            span.record("parent_span_id", parent);
        }

        inv.ctx = inv.ctx.with_trace(trace);

        Box::pin(
            async move {
                let result = inner.call(inv).await.map_err(Into::into);

                let failure = match &result {
                    Ok(resp) => resp.failed().map(ToString::to_string),
                    Err(err) => Some(err.to_string()),
                };
                if let Some(message) = failure {
                    tracing::Span::current().record("error", message.as_str());
                }

                result
            }
            .instrument(span),
        )
    }
}
