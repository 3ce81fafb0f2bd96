//! Token providers.
//!
//! A [`TokenProvider`] turns an `(appid, appsecret)` pair into an access
//! token. The production provider talks to the WeChat API and caches tokens
//! in memory or Redis.

pub mod cache;
pub mod wechat;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CacheBackend, Config};

pub use cache::{MemoryCache, RedisCache, TokenCache};
pub use wechat::WechatProvider;

/// Errors raised while acquiring a token.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// WeChat answered with a non-zero `errcode`
    #[error("get access_token error: errcode={code}, errmsg={message}")]
    Api {
        /// Upstream `errcode`
        code: i64,
        /// Upstream `errmsg`
        message: String,
    },

    /// HTTP request to the upstream failed
    #[error("access_token request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream body was not a token response
    #[error("invalid access_token response: {0}")]
    Decode(String),

    /// Token cache backend failed
    #[error("token cache error: {0}")]
    Cache(String),

    /// Provider reported success without a token
    #[error("provider returned an empty token")]
    EmptyToken,

    /// Free-form failure
    #[error("{0}")]
    Message(String),
}

impl From<redis::RedisError> for ProviderError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

/// External credential provider.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Resolve the access token for the given application credentials.
    async fn get_token(&self, app_id: &str, app_secret: &str) -> Result<String, ProviderError>;
}

/// Build the WeChat provider with the cache backend selected in `config`.
///
/// # Errors
///
/// Fails when the HTTP client cannot be built or Redis is unreachable.
pub async fn build_provider(config: &Config) -> Result<Arc<dyn TokenProvider>, ProviderError> {
    let cache: Arc<dyn TokenCache> = match config.token_cache {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Redis => Arc::new(
            RedisCache::connect(
                &config.redis_addr,
                &config.redis_password,
                config.redis_db,
            )
            .await?,
        ),
    };

    let provider = WechatProvider::new(
        config.wechat_api_base.clone(),
        config.upstream_timeout(),
        cache,
    )?;
    Ok(Arc::new(provider))
}
