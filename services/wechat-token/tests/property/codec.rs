//! Transport encoding properties.
//!
//! Both transports report the same outcome for the same pipeline result,
//! and the gRPC reply decodes back to an equivalent response.

use std::time::Duration;

use http_body_util::BodyExt;
use proptest::prelude::*;
use serde_json::Value;
use wechat_token::endpoint::Failer;
use wechat_token::transport::{grpc, http};
use wechat_token::{GetTokenResponse, ProviderError, TokenServiceError};

fn pipeline_result() -> impl Strategy<Value = Result<GetTokenResponse, TokenServiceError>> {
    prop_oneof![
        "[A-Za-z0-9_-]{1,32}".prop_map(|t| Ok::<_, TokenServiceError>(GetTokenResponse::success(t))),
        "[a-z ]{1,24}".prop_map(|m| Ok::<_, TokenServiceError>(GetTokenResponse::failure(
            ProviderError::Message(m).into()
        ))),
        (0u64..120).prop_map(|s| Err::<GetTokenResponse, _>(TokenServiceError::CircuitOpen {
            service: "GetToken".to_string(),
            retry_after: Duration::from_secs(s),
        })),
        Just(()).prop_map(|()| Err::<GetTokenResponse, _>(TokenServiceError::DeadlineExceeded)),
        Just(()).prop_map(|()| Err::<GetTokenResponse, _>(TokenServiceError::Canceled)),
    ]
}

fn describe(result: &Result<GetTokenResponse, TokenServiceError>) -> Result<String, String> {
    match result {
        Ok(resp) => match resp.failed() {
            None => Ok(resp.token().to_string()),
            Some(err) => Err(err.to_string()),
        },
        Err(err) => Err(err.to_string()),
    }
}

fn replay(result: &Result<GetTokenResponse, TokenServiceError>) -> Result<GetTokenResponse, TokenServiceError> {
    match describe(result) {
        Ok(token) => Ok(GetTokenResponse::success(token)),
        Err(message) => Ok(GetTokenResponse::failure(ProviderError::Message(message).into())),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn grpc_reply_round_trips_outcome(result in pipeline_result()) {
        let expected = describe(&result);
        let code = match &result {
            Ok(resp) => resp.failed().map_or(0, TokenServiceError::rpc_code),
            Err(err) => err.rpc_code(),
        };

        let reply = grpc::encode_reply(result);
        prop_assert_eq!(reply.code, code);
        prop_assert!(reply.token.is_empty() != reply.err.is_empty());

        let decoded = grpc::decode_reply(reply);
        let actual = match decoded.failed() {
            None => Ok(decoded.token().to_string()),
            Some(err) => {
                prop_assert_eq!(err.rpc_code(), code);
                Err(err.to_string())
            }
        };
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn http_and_grpc_agree(result in pipeline_result()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let twin = replay(&result);
        let reply = grpc::encode_reply(twin);

        let response = http::encode_response(result);
        let ok = response.status().is_success();
        let bytes = rt
            .block_on(response.into_body().collect())
            .unwrap()
            .to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        if ok {
            prop_assert_eq!(body["token"].as_str(), Some(reply.token.as_str()));
        } else {
            prop_assert_eq!(body["error"].as_str(), Some(reply.err.as_str()));
        }
    }
}
