//! Server pipeline tests over a fake provider.

use std::time::Duration;

use wechat_token::observability::render;
use wechat_token::{Application, GetTokenRequest, RequestContext, TokenServiceError};

use crate::support::{FakeProvider, config};

fn request() -> GetTokenRequest {
    GetTokenRequest::new("wx123", "secretA")
}

#[tokio::test]
async fn test_success_carries_token_only() {
    let provider = FakeProvider::token("TOKEN_ABC");
    let app = Application::new(&config(&[]), provider.clone()).unwrap();

    let resp = app
        .endpoints()
        .invoke(RequestContext::new(), request())
        .await
        .unwrap();

    assert_eq!(resp.token(), "TOKEN_ABC");
    assert!(resp.into_result().is_ok());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_provider_failure_travels_in_response() {
    let app = Application::new(&config(&[]), FakeProvider::failing("invalid credentials")).unwrap();

    let resp = app
        .endpoints()
        .invoke(RequestContext::new(), request())
        .await
        .unwrap();

    assert!(resp.token().is_empty());
    assert_eq!(resp.into_result().unwrap_err().to_string(), "invalid credentials");
}

#[tokio::test]
async fn test_breaker_opens_after_five_failures() {
    let provider = FakeProvider::failing("upstream down");
    let app = Application::new(&config(&[]), provider.clone()).unwrap();

    for _ in 0..5 {
        let resp = app
            .endpoints()
            .invoke(RequestContext::new(), request())
            .await
            .unwrap();
        assert!(resp.into_result().is_err());
    }

    let err = app
        .endpoints()
        .invoke(RequestContext::new(), request())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenServiceError::CircuitOpen { .. }));
    assert_eq!(err.to_string(), "circuit open for GetToken");
    assert_eq!(provider.calls(), 5);

    let metrics = render(app.registry()).unwrap();
    assert!(metrics.contains(r#"wechat_token_circuit_breaker_state{circuit="GetToken"} 1"#));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_admits_trial_after_timeout() {
    let provider = FakeProvider::recovering("TOKEN_ABC", 5);
    let app = Application::new(&config(&[("CB_TIMEOUT", "60")]), provider.clone()).unwrap();

    for _ in 0..5 {
        let resp = app
            .endpoints()
            .invoke(RequestContext::new(), request())
            .await
            .unwrap();
        assert!(resp.into_result().is_err());
    }
    let err = app
        .endpoints()
        .invoke(RequestContext::new(), request())
        .await
        .unwrap_err();
    assert!(matches!(err, TokenServiceError::CircuitOpen { .. }));

    tokio::time::advance(Duration::from_secs(60)).await;

    let resp = app
        .endpoints()
        .invoke(RequestContext::new(), request())
        .await
        .unwrap();
    assert_eq!(resp.into_result().unwrap(), "TOKEN_ABC");
    assert_eq!(provider.calls(), 6);

    let metrics = render(app.registry()).unwrap();
    assert!(metrics.contains(r#"wechat_token_circuit_breaker_state{circuit="GetToken"} 0"#));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_returns_before_provider() {
    let provider = FakeProvider::slow("TOKEN_ABC", Duration::from_secs(10));
    let app = Application::new(&config(&[]), provider.clone()).unwrap();

    let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
    let err = app.endpoints().invoke(ctx, request()).await.unwrap_err();

    assert!(matches!(err, TokenServiceError::DeadlineExceeded));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_returns_canceled() {
    let app = Application::new(
        &config(&[]),
        FakeProvider::slow("TOKEN_ABC", Duration::from_secs(10)),
    )
    .unwrap();

    let ctx = RequestContext::new();
    let canceler = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceler.cancel();
    });

    let err = app.endpoints().invoke(ctx, request()).await.unwrap_err();
    assert!(matches!(err, TokenServiceError::Canceled));
}

#[tokio::test]
async fn test_metrics_record_calls() {
    let app = Application::new(&config(&[("TRACING_ENABLED", "false")]), FakeProvider::token("TOKEN_ABC")).unwrap();
    app.endpoints()
        .invoke(RequestContext::new(), request())
        .await
        .unwrap();

    let metrics = render(app.registry()).unwrap();
    assert!(metrics.contains(r#"wechat_token_invoke_count{appid="wx123"} 1"#));
    assert!(metrics.contains(r#"method="GetToken",success="true""#));
}
