//! Core service decorator tests.

use prometheus::{IntCounterVec, Opts};
use wechat_token::service;
use wechat_token::{ProviderError, RequestContext, TokenService, TokenServiceError};

use crate::support::FakeProvider;

fn counter() -> IntCounterVec {
    IntCounterVec::new(Opts::new("invoke_count", "GetToken invocations"), &["appid"]).unwrap()
}

#[tokio::test]
async fn test_service_passes_token_through() {
    let invoke_count = counter();
    let svc = service::new(FakeProvider::token("TOKEN_ABC"), invoke_count.clone());

    let token = svc
        .get_token(&RequestContext::new(), "wx123", "secretA")
        .await
        .unwrap();

    assert_eq!(token, "TOKEN_ABC");
    assert_eq!(invoke_count.with_label_values(&["wx123"]).get(), 1);
}

#[tokio::test]
async fn test_failures_are_counted_and_unchanged() {
    let invoke_count = counter();
    let svc = service::new(FakeProvider::failing("invalid credentials"), invoke_count.clone());

    for _ in 0..3 {
        let err = svc
            .get_token(&RequestContext::new(), "wx456", "secretB")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TokenServiceError::Provider(ProviderError::Message(ref m)) if m == "invalid credentials"
        ));
    }

    assert_eq!(invoke_count.with_label_values(&["wx456"]).get(), 3);
    assert_eq!(invoke_count.with_label_values(&["wx123"]).get(), 0);
}
