//! The end-to-end scenarios: success, provider failure, open circuit and
//! signal shutdown.

use std::time::Duration;

use serde_json::{Value, json};
use wechat_token::pb::GetTokenRequest;
use wechat_token::pb::wechat_token_client::WechatTokenClient;
use wechat_token::{GroupError, Signal};

use crate::support::{ScriptedProvider, start};

async fn post_http(addr: std::net::SocketAddr, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/get-token"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

fn rpc_request() -> GetTokenRequest {
    GetTokenRequest {
        appid: "wx123".to_string(),
        appsecret: "secretA".to_string(),
    }
}

#[tokio::test]
async fn test_token_over_both_transports() {
    let running = start(ScriptedProvider::new(Ok("TOKEN_ABC"))).await;

    let (status, body) = post_http(
        running.addrs.http,
        json!({"AppID": "wx123", "AppSecret": "secretA"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"token": "TOKEN_ABC"}));

    let mut client = WechatTokenClient::connect(format!("http://{}", running.addrs.grpc))
        .await
        .unwrap();
    let reply = client.get_token(rpc_request()).await.unwrap().into_inner();
    assert_eq!(reply.code, 0);
    assert_eq!(reply.token, "TOKEN_ABC");
    assert!(reply.err.is_empty());

    let metrics = reqwest::get(format!("http://{}/metrics", running.addrs.debug))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains(r#"wechat_token_invoke_count{appid="wx123"} 2"#));
}

#[tokio::test]
async fn test_provider_failure_over_both_transports() {
    let running = start(ScriptedProvider::new(Err("invalid credentials"))).await;

    let (status, body) = post_http(
        running.addrs.http,
        json!({"AppID": "wx123", "AppSecret": "secretA"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "invalid credentials"}));

    let mut client = WechatTokenClient::connect(format!("http://{}", running.addrs.grpc))
        .await
        .unwrap();
    let reply = client.get_token(rpc_request()).await.unwrap().into_inner();
    assert!(reply.token.is_empty());
    assert_eq!(reply.err, "invalid credentials");
    assert_ne!(reply.code, 0);
}

#[tokio::test]
async fn test_sixth_call_hits_open_circuit() {
    let provider = ScriptedProvider::new(Err("upstream down"));
    let running = start(provider.clone()).await;

    for _ in 0..5 {
        let (status, _) = post_http(
            running.addrs.http,
            json!({"AppID": "wx123", "AppSecret": "secretA"}),
        )
        .await;
        assert_eq!(status, 400);
    }

    let (status, body) = post_http(
        running.addrs.http,
        json!({"AppID": "wx123", "AppSecret": "secretA"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "circuit open for GetToken"}));
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn test_terminate_signal_stops_every_listener() {
    let running = start(ScriptedProvider::new(Ok("TOKEN_ABC"))).await;

    running.signals.send(Signal::Terminate).await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(10), running.group)
        .await
        .unwrap()
        .unwrap();

    let err = outcome.unwrap_err();
    assert!(matches!(err, GroupError::Signal(Signal::Terminate)));
    assert_eq!(err.to_string(), "received signal terminated");

    for addr in [running.addrs.debug, running.addrs.http, running.addrs.grpc] {
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
