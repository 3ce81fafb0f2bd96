//! WeChat access-token provider with cache and per-app serialized refresh
//!
//! Implements the upstream contract:
//! - `GET {base}/cgi-bin/token?grant_type=client_credential&appid=..&secret=..`
//! - tokens are cached under `access_token_{appid}` a little shorter than they live
//! - concurrent misses for one appid refresh once; later callers re-check the cache first
//! - refreshes for different appids never wait on each other

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

use super::{ProviderError, TokenCache, TokenProvider};

/// Seconds shaved off `expires_in` before caching.
const EXPIRY_MARGIN_SECS: i64 = 1500;
/// Lower bound for the cache lifetime of a token.
const MIN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Upstream token endpoint reply. Success and failure share one shape.
#[derive(Debug, Default, Deserialize)]
struct TokenReply {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Provider backed by the WeChat `cgi-bin/token` API.
pub struct WechatProvider {
    http_client: reqwest::Client,
    token_url: Url,
    cache: Arc<dyn TokenCache>,
    refresh_locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WechatProvider {
    /// Creates a provider for the API rooted at `base`.
    ///
    /// # Errors
    ///
    /// Fails when the base URL cannot be joined or the HTTP client cannot be built.
    pub fn new(
        base: Url,
        timeout: Duration,
        cache: Arc<dyn TokenCache>,
    ) -> Result<Self, ProviderError> {
        let token_url = base
            .join("/cgi-bin/token")
            .map_err(|e| ProviderError::Message(format!("invalid WeChat API base {base}: {e}")))?;

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            token_url,
            cache,
            refresh_locks: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Cache key holding the token of `app_id`.
    #[must_use]
    pub fn cache_key(app_id: &str) -> String {
        format!("access_token_{app_id}")
    }

    /// How long a token that lives `expires_in` seconds stays cached.
    #[must_use]
    pub fn cache_ttl(expires_in: i64) -> Duration {
        u64::try_from(expires_in.saturating_sub(EXPIRY_MARGIN_SECS))
            .map_or(MIN_CACHE_TTL, Duration::from_secs)
            .max(MIN_CACHE_TTL)
    }

    fn refresh_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    async fn fetch(&self, app_id: &str, app_secret: &str) -> Result<TokenReply, ProviderError> {
        let response = self
            .http_client
            .get(self.token_url.clone())
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", app_id),
                ("secret", app_secret),
            ])
            .send()
            .await?
            .error_for_status()?;

        let reply: TokenReply = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if reply.errcode != 0 {
            return Err(ProviderError::Api {
                code: reply.errcode,
                message: reply.errmsg,
            });
        }
        if reply.access_token.is_empty() {
            return Err(ProviderError::EmptyToken);
        }
        Ok(reply)
    }
}

#[async_trait]
impl TokenProvider for WechatProvider {
    #[instrument(skip_all, fields(app_id = %app_id))]
    async fn get_token(&self, app_id: &str, app_secret: &str) -> Result<String, ProviderError> {
        let key = Self::cache_key(app_id);
        if let Some(token) = self.cache.get(&key).await? {
            return Ok(token);
        }

        let lock = self.refresh_lock(&key);
        let _refresh = lock.lock().await;
        if let Some(token) = self.cache.get(&key).await? {
            debug!("Token refreshed by a concurrent caller");
            return Ok(token);
        }

        let reply = self.fetch(app_id, app_secret).await?;
        let ttl = Self::cache_ttl(reply.expires_in);
        self.cache.set(&key, &reply.access_token, ttl).await?;
        info!(expires_in = reply.expires_in, ttl_secs = ttl.as_secs(), "Access token refreshed");

        Ok(reply.access_token)
    }
}
