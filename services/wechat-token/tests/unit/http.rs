//! HTTP adapter tests through the router.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wechat_token::Application;
use wechat_token::transport::http::router;

use crate::support::{FakeProvider, config};

async fn post(app: &Application, body: &str) -> (StatusCode, Value) {
    let response = router(app.endpoints().clone(), Duration::from_secs(5))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/get-token")
                .header(header::CONTENT_TYPE, "application/json")
                .header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_success_is_200_with_token() {
    let app = Application::new(&config(&[]), FakeProvider::token("TOKEN_ABC")).unwrap();
    let (status, body) = post(&app, r#"{"AppID":"wx123","AppSecret":"secretA"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"token": "TOKEN_ABC"}));
}

#[tokio::test]
async fn test_provider_failure_is_400() {
    let app = Application::new(&config(&[]), FakeProvider::failing("invalid credentials")).unwrap();
    let (status, body) = post(&app, r#"{"AppID":"wx123","AppSecret":"secretA"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "invalid credentials"}));
}

#[tokio::test]
async fn test_malformed_body_never_reaches_provider() {
    let provider = FakeProvider::token("TOKEN_ABC");
    let app = Application::new(&config(&[]), provider.clone()).unwrap();
    let (status, body) = post(&app, "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid request"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_get_is_not_routed() {
    let app = Application::new(&config(&[]), FakeProvider::token("TOKEN_ABC")).unwrap();
    let response = router(app.endpoints().clone(), Duration::from_secs(5))
        .oneshot(Request::builder().uri("/get-token").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
