//! Service decorators.

use std::time::Instant;

use async_trait::async_trait;
use prometheus::IntCounterVec;
use tracing::{info, warn};

use super::TokenService;
use crate::context::RequestContext;
use crate::error::TokenServiceError;

/// Characters of a secret kept in logs.
const REDACT_KEEP: usize = 4;

/// Mask a secret for logging: the first four characters followed by `***`.
#[must_use]
pub fn redact(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let kept: String = value.chars().take(REDACT_KEEP).collect();
    format!("{kept}***")
}

/// Emits one structured record per call.
pub struct LoggingMiddleware<S> {
    next: S,
}

impl<S> LoggingMiddleware<S> {
    /// Wraps `next`.
    pub const fn new(next: S) -> Self {
        Self { next }
    }
}

#[async_trait]
impl<S: TokenService> TokenService for LoggingMiddleware<S> {
    async fn get_token(
        &self,
        ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError> {
        let begin = Instant::now();
        let result = self.next.get_token(ctx, app_id, app_secret).await;
        let took = begin.elapsed();

        match &result {
            Ok(token) => info!(
                method = "GetToken",
                app_id,
                app_secret = %redact(app_secret),
                token = %redact(token),
                took = ?took,
                "GetToken"
            ),
            Err(err) => warn!(
                method = "GetToken",
                app_id,
                app_secret = %redact(app_secret),
                token = "",
                error = %err,
                took = ?took,
                "GetToken"
            ),
        }

        result
    }
}

/// Counts calls per application id, whatever their outcome.
pub struct CountingMiddleware<S> {
    next: S,
    invoke_count: IntCounterVec,
}

impl<S> CountingMiddleware<S> {
    /// Wraps `next`, counting into `invoke_count` (label `appid`).
    pub const fn new(next: S, invoke_count: IntCounterVec) -> Self {
        Self { next, invoke_count }
    }
}

#[async_trait]
impl<S: TokenService> TokenService for CountingMiddleware<S> {
    async fn get_token(
        &self,
        ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError> {
        let result = self.next.get_token(ctx, app_id, app_secret).await;
        self.invoke_count.with_label_values(&[app_id]).inc();
        result
    }
}
