//! Response shape properties.
//!
//! Whatever the provider answers, a call yields either a non-empty token
//! without failure or an empty token with a failure.

use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use wechat_token::config::Config;
use wechat_token::{Application, GetTokenRequest, ProviderError, RequestContext, TokenProvider};

struct ScriptedProvider(Result<String, String>);

#[async_trait]
impl TokenProvider for ScriptedProvider {
    async fn get_token(&self, _app_id: &str, _app_secret: &str) -> Result<String, ProviderError> {
        self.0.clone().map_err(ProviderError::Message)
    }
}

fn outcome() -> impl Strategy<Value = Result<String, String>> {
    prop_oneof![
        "[A-Za-z0-9_-]{0,32}".prop_map(Ok::<String, String>),
        "[a-z ]{1,24}".prop_map(Err::<String, String>),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn response_has_token_xor_failure(
        outcome in outcome(),
        app_id in "wx[0-9a-f]{4,16}",
        app_secret in "[a-zA-Z0-9]{0,32}",
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = Config::from_lookup(|_| None).unwrap();
            let app = Application::new(&config, Arc::new(ScriptedProvider(outcome))).unwrap();

            let resp = app
                .endpoints()
                .invoke(RequestContext::new(), GetTokenRequest::new(app_id, app_secret))
                .await
                .unwrap();

            let has_token = !resp.token().is_empty();
            let token = resp.token().to_string();
            match resp.into_result() {
                Ok(t) => {
                    prop_assert!(has_token);
                    prop_assert_eq!(t, token);
                }
                Err(_) => prop_assert!(!has_token),
            }
            Ok(())
        })?;
    }
}
