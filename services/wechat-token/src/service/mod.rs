//! Core `GetToken` service.
//!
//! The service is a thin pass-through to the token provider. Logging and
//! invocation counting wrap it as [`TokenService`] decorators.

pub mod middleware;

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::IntCounterVec;

use crate::context::RequestContext;
use crate::error::TokenServiceError;
use crate::provider::TokenProvider;

pub use middleware::{CountingMiddleware, LoggingMiddleware, redact};

/// The business operation exposed by every transport.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Acquire the access token of an application.
    async fn get_token(
        &self,
        ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError>;
}

#[async_trait]
impl<T> TokenService for Arc<T>
where
    T: TokenService + ?Sized,
{
    async fn get_token(
        &self,
        ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError> {
        (**self).get_token(ctx, app_id, app_secret).await
    }
}

/// Delegates straight to the provider.
pub struct BasicService {
    provider: Arc<dyn TokenProvider>,
}

impl BasicService {
    /// Creates the undecorated service.
    #[must_use]
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenService for BasicService {
    async fn get_token(
        &self,
        _ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError> {
        Ok(self.provider.get_token(app_id, app_secret).await?)
    }
}

/// Builds the service with logging outermost and counting inside it.
#[must_use]
pub fn new(provider: Arc<dyn TokenProvider>, invoke_count: IntCounterVec) -> Arc<dyn TokenService> {
    Arc::new(LoggingMiddleware::new(CountingMiddleware::new(
        BasicService::new(provider),
        invoke_count,
    )))
}
