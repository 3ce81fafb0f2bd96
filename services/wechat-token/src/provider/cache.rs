//! Token cache backends.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::time::Instant;
use tracing::info;
use url::Url;

use super::ProviderError;

/// Key/value store for tokens with per-entry expiry.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Read a live entry.
    async fn get(&self, key: &str) -> Result<Option<String>, ProviderError>;

    /// Store an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProviderError>;
}

/// In-process cache. Expired entries are dropped on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ProviderError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let live = entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone());
        if live.is_none() {
            entries.remove(key);
        }
        Ok(live)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProviderError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}

/// Redis-backed cache shared between replicas.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connects to `addr` (`host:port`) and selects database `db`.
    ///
    /// # Errors
    ///
    /// Returns `Cache` when the address is invalid or the server is unreachable.
    pub async fn connect(addr: &str, password: &str, db: i64) -> Result<Self, ProviderError> {
        let url = Self::connection_url(addr, password, db)?;
        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        info!(addr, db, "Connected to redis token cache");
        Ok(Self { conn })
    }

    /// Builds a `redis://` URL, percent-encoding the password.
    ///
    /// # Errors
    ///
    /// Returns `Cache` when the address does not form a valid URL.
    pub fn connection_url(addr: &str, password: &str, db: i64) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("redis://{addr}/{db}"))
            .map_err(|e| ProviderError::Cache(format!("invalid redis address {addr}: {e}")))?;
        if !password.is_empty() {
            url.set_password(Some(password))
                .map_err(|()| ProviderError::Cache("redis url cannot carry a password".into()))?;
        }
        Ok(url)
    }
}

#[async_trait]
impl TokenCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ProviderError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProviderError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}
