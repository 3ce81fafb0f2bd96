//! Endpoint layer.
//!
//! Turns the core service into a uniform tower [`Service`] over
//! [`Invocation`]s. Transports only ever talk to an [`Endpoint`], so the
//! resilience layers apply identically to HTTP and gRPC calls.

use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

use crate::context::RequestContext;
use crate::error::TokenServiceError;
use crate::provider::ProviderError;
use crate::service::TokenService;

/// Canonical `GetToken` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetTokenRequest {
    /// Application id
    #[serde(rename = "AppID", alias = "appid", alias = "AppId", alias = "appId", alias = "app_id")]
    pub app_id: String,
    /// Application secret
    #[serde(
        rename = "AppSecret",
        alias = "appsecret",
        alias = "appSecret",
        alias = "app_secret"
    )]
    pub app_secret: String,
}

impl GetTokenRequest {
    /// Creates a request.
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }
}

/// Reports a business failure carried inside a response.
pub trait Failer {
    /// The failure, if the call failed.
    fn failed(&self) -> Option<&TokenServiceError>;
}

/// Canonical `GetToken` response: a non-empty token or a failure.
#[derive(Debug)]
pub struct GetTokenResponse {
    token: String,
    failure: Option<TokenServiceError>,
}

impl GetTokenResponse {
    /// A successful response. An empty token is reported as a failure.
    pub fn success(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            return Self::failure(ProviderError::EmptyToken.into());
        }
        Self {
            token,
            failure: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub const fn failure(err: TokenServiceError) -> Self {
        Self {
            token: String::new(),
            failure: Some(err),
        }
    }

    /// Build from a service result.
    #[must_use]
    pub fn from_result(result: Result<String, TokenServiceError>) -> Self {
        match result {
            Ok(token) => Self::success(token),
            Err(err) => Self::failure(err),
        }
    }

    /// The token, empty on failure.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Convert into the service result.
    ///
    /// # Errors
    ///
    /// Returns the carried failure.
    pub fn into_result(self) -> Result<String, TokenServiceError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.token),
        }
    }
}

impl Failer for GetTokenResponse {
    fn failed(&self) -> Option<&TokenServiceError> {
        self.failure.as_ref()
    }
}

/// One call travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Request-scoped context
    pub ctx: RequestContext,
    /// Decoded request
    pub request: GetTokenRequest,
}

impl Invocation {
    /// Pairs a request with its context.
    #[must_use]
    pub const fn new(ctx: RequestContext, request: GetTokenRequest) -> Self {
        Self { ctx, request }
    }
}

/// The uniform call primitive shared by all transports.
pub type Endpoint = BoxCloneService<Invocation, GetTokenResponse, TokenServiceError>;

/// Innermost endpoint: calls the core service.
///
/// The service call runs on its own task. When the context is canceled or
/// its deadline passes first, the endpoint returns at once and the task's
/// result is discarded.
#[derive(Clone)]
pub struct GetTokenEndpoint {
    service: Arc<dyn TokenService>,
}

impl GetTokenEndpoint {
    /// Wraps the core service.
    #[must_use]
    pub fn new(service: Arc<dyn TokenService>) -> Self {
        Self { service }
    }
}

impl Service<Invocation> for GetTokenEndpoint {
    type Response = GetTokenResponse;
    type Error = TokenServiceError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        let service = Arc::clone(&self.service);

        Box::pin(async move {
            let Invocation { ctx, request } = inv;
            let call_ctx = ctx.clone();
            let call = tokio::spawn(async move {
                service
                    .get_token(&call_ctx, &request.app_id, &request.app_secret)
                    .await
            });

            tokio::select! {
                joined = call => match joined {
                    Ok(result) => Ok(GetTokenResponse::from_result(result)),
                    Err(e) => Err(TokenServiceError::Internal(anyhow::Error::new(e))),
                },
                err = ctx.done() => Err(err),
            }
        })
    }
}

/// Endpoints of the service.
///
/// The boxed pipeline is `Send` but not `Sync`; it sits behind a mutex that
/// is held only long enough to clone it for one call.
#[derive(Clone)]
pub struct Endpoints {
    get_token: Arc<Mutex<Endpoint>>,
}

impl Endpoints {
    /// Wraps an already composed pipeline.
    #[must_use]
    pub fn new(get_token: Endpoint) -> Self {
        Self {
            get_token: Arc::new(Mutex::new(get_token)),
        }
    }

    /// Run one call through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns failures raised by the pipeline layers themselves; provider
    /// failures arrive inside the response.
    pub async fn invoke(
        &self,
        ctx: RequestContext,
        request: GetTokenRequest,
    ) -> Result<GetTokenResponse, TokenServiceError> {
        let endpoint = self.get_token.lock().clone();
        endpoint.oneshot(Invocation::new(ctx, request)).await
    }
}

#[async_trait]
impl TokenService for Endpoints {
    async fn get_token(
        &self,
        ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError> {
        self.invoke(ctx.clone(), GetTokenRequest::new(app_id, app_secret))
            .await?
            .into_result()
    }
}
