//! gRPC transport.
//!
//! The server adapts `pb.WechatToken/GetToken` onto the endpoint pipeline.
//! Every outcome is sent as a reply with `code`, `token` and `err`; gRPC
//! status codes stay reserved for transport problems. The client runs the
//! client pipeline over a tonic channel and implements [`TokenService`].

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rust_common::{CircuitBreaker, CircuitBreakerConfig, RateLimiter, RateLimiterConfig};
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tower::Service;
use tracing::warn;

use crate::context::{RequestContext, TRACEPARENT, TraceContext};
use crate::endpoint::{Endpoints, Failer, GetTokenRequest, GetTokenResponse, Invocation};
use crate::error::TokenServiceError;
use crate::middleware::{GET_TOKEN, client_endpoint};
use crate::pb;
use crate::pb::wechat_token_client::WechatTokenClient;
use crate::pb::wechat_token_server::{WechatToken, WechatTokenServer};
use crate::service::TokenService;

/// Wire request to canonical request.
#[must_use]
pub fn decode_request(req: pb::GetTokenRequest) -> GetTokenRequest {
    GetTokenRequest::new(req.appid, req.appsecret)
}

/// Canonical request to wire request.
#[must_use]
pub fn encode_request(req: &GetTokenRequest) -> pb::GetTokenRequest {
    pb::GetTokenRequest {
        appid: req.app_id.clone(),
        appsecret: req.app_secret.clone(),
    }
}

/// Pipeline outcome to wire reply: a token with code 0, or an error string
/// with a nonzero code. Never both.
#[must_use]
pub fn encode_reply(result: Result<GetTokenResponse, TokenServiceError>) -> pb::GetTokenReply {
    let err = match result {
        Ok(resp) => match resp.into_result() {
            Ok(token) => {
                return pb::GetTokenReply {
                    code: 0,
                    token,
                    err: String::new(),
                };
            }
            Err(err) => err,
        },
        Err(err) => err,
    };

    pb::GetTokenReply {
        code: err.rpc_code(),
        token: String::new(),
        err: err.to_string(),
    }
}

/// Wire reply to canonical response. A nonempty `err` or a nonzero `code`
/// marks a failure reported by the server.
#[must_use]
pub fn decode_reply(reply: pb::GetTokenReply) -> GetTokenResponse {
    if reply.err.is_empty() && reply.code == 0 {
        return GetTokenResponse::success(reply.token);
    }

    let message = if reply.err.is_empty() {
        format!("remote error code {}", reply.code)
    } else {
        reply.err
    };
    GetTokenResponse::failure(TokenServiceError::Remote {
        code: reply.code,
        message,
    })
}

fn inbound_trace(metadata: &MetadataMap) -> Option<TraceContext> {
    metadata
        .get(TRACEPARENT)
        .and_then(|value| value.to_str().ok())
        .and_then(TraceContext::parse)
}

/// `pb.WechatToken` server backed by the endpoint pipeline.
pub struct GrpcServer {
    endpoints: Endpoints,
    request_timeout: Duration,
}

impl GrpcServer {
    /// Creates the server adapter.
    #[must_use]
    pub const fn new(endpoints: Endpoints, request_timeout: Duration) -> Self {
        Self {
            endpoints,
            request_timeout,
        }
    }

    /// Wraps the adapter in the generated tonic service.
    #[must_use]
    pub fn into_service(self) -> WechatTokenServer<Self> {
        WechatTokenServer::new(self)
    }
}

#[async_trait]
impl WechatToken for GrpcServer {
    async fn get_token(
        &self,
        request: Request<pb::GetTokenRequest>,
    ) -> Result<Response<pb::GetTokenReply>, Status> {
        let mut ctx = RequestContext::new().with_timeout(self.request_timeout);
        if let Some(trace) = inbound_trace(request.metadata()) {
            ctx = ctx.with_trace(trace);
        }

        let result = self
            .endpoints
            .invoke(ctx, decode_request(request.into_inner()))
            .await;

        match &result {
            Ok(resp) => {
                if let Some(err) = resp.failed() {
                    warn!(transport = "grpc", error = %err, "GetToken failed");
                }
            }
            Err(err) => warn!(transport = "grpc", error = %err, "GetToken failed"),
        }

        Ok(Response::new(encode_reply(result)))
    }
}

/// Outbound wire call: the innermost service of the client pipeline.
#[derive(Clone)]
pub struct GrpcWire {
    client: WechatTokenClient<Channel>,
}

impl GrpcWire {
    /// Creates the wire over `channel`.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            client: WechatTokenClient::new(channel),
        }
    }
}

impl Service<Invocation> for GrpcWire {
    type Response = GetTokenResponse;
    type Error = TokenServiceError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        let mut client = self.client.clone();

        Box::pin(async move {
            let Invocation { ctx, request } = inv;

            let mut req = Request::new(encode_request(&request));
            if let Some(remaining) = ctx.remaining() {
                req.set_timeout(remaining);
            }
            if let Some(trace) = ctx.trace() {
                if let Ok(value) = trace.to_header().parse::<AsciiMetadataValue>() {
                    req.metadata_mut().insert(TRACEPARENT, value);
                }
            }

            tokio::select! {
                reply = client.get_token(req) => match reply {
                    Ok(reply) => Ok(decode_reply(reply.into_inner())),
                    Err(status) => Err(status.into()),
                },
                err = ctx.done() => Err(err),
            }
        })
    }
}

/// Client pipeline settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Token bucket in front of the wire
    pub rate: RateLimiterConfig,
    /// Client-side breaker
    pub breaker: CircuitBreakerConfig,
    /// Include the client tracing layer
    pub tracing: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            rate: RateLimiterConfig::default(),
            breaker: CircuitBreakerConfig::default().with_timeout(Duration::from_secs(30)),
            tracing: true,
        }
    }
}

/// `GetToken` client with the same interface as the core service.
#[derive(Clone)]
pub struct GrpcClient {
    endpoints: Endpoints,
}

impl GrpcClient {
    /// Client over an established channel.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the rate limit settings are zero.
    pub fn new(channel: Channel, options: ClientOptions) -> Result<Self, TokenServiceError> {
        Self::with_wire(GrpcWire::new(channel), options)
    }

    /// Client that connects to `addr` on first use. A bare `host:port` is
    /// dialed over plain HTTP/2.
    ///
    /// # Errors
    ///
    /// Returns `Transport` when `addr` is not a valid URI.
    pub fn connect_lazy(addr: &str, options: ClientOptions) -> Result<Self, TokenServiceError> {
        let uri = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };
        let channel = tonic::transport::Endpoint::from_shared(uri)
            .map_err(|e| TokenServiceError::Transport {
                reason: e.to_string(),
            })?
            .connect_lazy();
        Self::new(channel, options)
    }

    /// Client pipeline over an arbitrary wire service.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the rate limit settings are zero.
    pub fn with_wire<W>(wire: W, options: ClientOptions) -> Result<Self, TokenServiceError>
    where
        W: Service<Invocation, Response = GetTokenResponse> + Clone + Send + 'static,
        W::Error: Into<TokenServiceError> + Send + 'static,
        W::Future: Send + 'static,
    {
        let limiter = Arc::new(RateLimiter::new(options.rate)?);
        let breaker = Arc::new(CircuitBreaker::new(GET_TOKEN, options.breaker));
        let endpoint = client_endpoint(wire, limiter, breaker, options.tracing);
        Ok(Self {
            endpoints: Endpoints::new(endpoint),
        })
    }

    /// The client pipeline.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait]
impl TokenService for GrpcClient {
    async fn get_token(
        &self,
        ctx: &RequestContext,
        app_id: &str,
        app_secret: &str,
    ) -> Result<String, TokenServiceError> {
        self.endpoints.get_token(ctx, app_id, app_secret).await
    }
}
