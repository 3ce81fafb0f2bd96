//! `GrpcClient` tests: against a live server and over a counting wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rust_common::{CircuitBreakerConfig, RateLimiterConfig};
use tower::service_fn;
use wechat_token::endpoint::Invocation;
use wechat_token::transport::grpc::ClientOptions;
use wechat_token::{
    GetTokenResponse, GrpcClient, RequestContext, TokenService, TokenServiceError,
};

use crate::support::{ScriptedProvider, start};

#[tokio::test]
async fn test_client_gets_token_from_server() {
    let running = start(ScriptedProvider::new(Ok("TOKEN_ABC"))).await;
    let client =
        GrpcClient::connect_lazy(&running.addrs.grpc.to_string(), ClientOptions::default()).unwrap();

    let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
    let token = client.get_token(&ctx, "wx123", "secretA").await.unwrap();
    assert_eq!(token, "TOKEN_ABC");
}

#[tokio::test]
async fn test_client_surfaces_server_failure() {
    let running = start(ScriptedProvider::new(Err("invalid credentials"))).await;
    let client =
        GrpcClient::connect_lazy(&running.addrs.grpc.to_string(), ClientOptions::default()).unwrap();

    let err = client
        .get_token(&RequestContext::new(), "wx123", "secretA")
        .await
        .unwrap_err();
    assert!(matches!(err, TokenServiceError::Remote { .. }));
    assert_eq!(err.to_string(), "invalid credentials");
}

#[tokio::test]
async fn test_exhausted_bucket_skips_the_wire() {
    let wire_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wire_calls);
    let wire = service_fn(move |_inv: Invocation| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, TokenServiceError>(GetTokenResponse::success("TOKEN_ABC")) }
    });

    let client = GrpcClient::with_wire(
        wire,
        ClientOptions {
            rate: RateLimiterConfig {
                per_second: 1,
                burst: 2,
            },
            ..ClientOptions::default()
        },
    )
    .unwrap();

    let ctx = RequestContext::new();
    assert_eq!(client.get_token(&ctx, "wx123", "secretA").await.unwrap(), "TOKEN_ABC");
    assert_eq!(client.get_token(&ctx, "wx123", "secretA").await.unwrap(), "TOKEN_ABC");

    let err = client.get_token(&ctx, "wx123", "secretA").await.unwrap_err();
    assert!(matches!(err, TokenServiceError::RateLimited { .. }));
    assert_eq!(wire_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_breaker_opens_on_transport_errors() {
    let wire_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wire_calls);
    let wire = service_fn(move |_inv: Invocation| {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            Err::<GetTokenResponse, _>(TokenServiceError::Transport {
                reason: "Unavailable: connection refused".to_string(),
            })
        }
    });

    let client = GrpcClient::with_wire(
        wire,
        ClientOptions {
            breaker: CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_timeout(Duration::from_secs(30)),
            ..ClientOptions::default()
        },
    )
    .unwrap();

    let ctx = RequestContext::new();
    for _ in 0..2 {
        let err = client.get_token(&ctx, "wx123", "secretA").await.unwrap_err();
        assert!(matches!(err, TokenServiceError::Transport { .. }));
    }
    let err = client.get_token(&ctx, "wx123", "secretA").await.unwrap_err();
    assert!(matches!(err, TokenServiceError::CircuitOpen { .. }));
    assert_eq!(wire_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_propagates_trace_to_wire() {
    let wire = service_fn(|inv: Invocation| async move {
        let header = inv
            .ctx
            .trace()
            .map(wechat_token::TraceContext::to_header)
            .unwrap_or_default();
        Ok::<_, TokenServiceError>(GetTokenResponse::success(header))
    });
    let client = GrpcClient::with_wire(wire, ClientOptions::default()).unwrap();

    let token = client
        .get_token(&RequestContext::new(), "wx123", "secretA")
        .await
        .unwrap();
    assert!(wechat_token::TraceContext::parse(&token).is_some());
}
