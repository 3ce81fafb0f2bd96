//! Type-Safe Configuration with Validation
//!
//! Reads the service configuration from environment variables (and a `.env`
//! file when present), applies defaults and validates the result.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_common::{CircuitBreakerConfig, RateLimiterConfig, TracingConfig};
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable name
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid threshold value
    #[error("Invalid {field}: must be greater than 0")]
    NotPositive {
        /// Offending setting
        field: &'static str,
    },

    /// Value outside the accepted set
    #[error("Invalid {field}: {value:?} (expected one of {expected})")]
    UnknownValue {
        /// Offending setting
        field: &'static str,
        /// Value found
        value: String,
        /// Accepted values
        expected: &'static str,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Token cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-process map
    Memory,
    /// Shared Redis instance
    Redis,
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(ConfigError::UnknownValue {
                field: "TOKEN_CACHE",
                value: s.to_string(),
                expected: "memory, redis",
            }),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable lines
    Text,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            _ => Err(ConfigError::UnknownValue {
                field: "LOG_FORMAT",
                value: s.to_string(),
                expected: "json, text",
            }),
        }
    }
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Debug/metrics listen address
    pub debug_addr: String,
    /// Application HTTP listen address
    pub http_addr: String,
    /// Application gRPC listen address
    pub grpc_addr: String,
    /// Token cache backend
    pub token_cache: CacheBackend,
    /// Redis `host:port`
    pub redis_addr: String,
    /// Redis password, empty for none
    pub redis_password: String,
    /// Redis database index
    pub redis_db: i64,
    /// WeChat API base URL
    pub wechat_api_base: Url,
    /// Upstream HTTP timeout in seconds
    pub upstream_timeout_secs: u64,
    /// Circuit breaker failure threshold (must be > 0)
    pub circuit_breaker_failure_threshold: u32,
    /// Circuit breaker timeout in seconds
    pub circuit_breaker_timeout_seconds: u64,
    /// Per-call deadline in seconds
    pub request_timeout_secs: u64,
    /// Client-side bucket refill rate
    pub client_rate_per_sec: u32,
    /// Client-side bucket capacity
    pub client_rate_burst: u32,
    /// Whether the tracing layer is part of the pipeline
    pub tracing_enabled: bool,
    /// OTLP endpoint URL
    pub otlp_endpoint: Url,
    /// Default log filter
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns the first variable that fails to parse or validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns the first variable that fails to parse or validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let config = Self {
            debug_addr: env.addr("DEBUG_ADDR", "0.0.0.0:8080"),
            http_addr: env.addr("HTTP_ADDR", "0.0.0.0:8081"),
            grpc_addr: env.addr("GRPC_ADDR", "0.0.0.0:8082"),
            token_cache: env.parse("TOKEN_CACHE", CacheBackend::Memory)?,
            redis_addr: env.string("REDIS_ADDR", "localhost:6379"),
            redis_password: env.string("REDIS_PASSWORD", ""),
            redis_db: env.parse("REDIS_DB", 0)?,
            wechat_api_base: env.url("WECHAT_API_BASE", "https://api.weixin.qq.com")?,
            upstream_timeout_secs: env.parse("UPSTREAM_TIMEOUT", 10)?,
            circuit_breaker_failure_threshold: env.parse("CB_FAILURE_THRESHOLD", 5)?,
            circuit_breaker_timeout_seconds: env.parse("CB_TIMEOUT", 60)?,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT", 30)?,
            client_rate_per_sec: env.parse("CLIENT_RATE_PER_SEC", 1)?,
            client_rate_burst: env.parse("CLIENT_RATE_BURST", 100)?,
            tracing_enabled: env.parse("TRACING_ENABLED", true)?,
            otlp_endpoint: env.url("OTLP_ENDPOINT", "http://localhost:4317")?,
            log_level: env.string("LOG_LEVEL", "info"),
            log_format: env.parse("LOG_FORMAT", LogFormat::Json)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Rejects empty addresses and zero thresholds, timeouts or rates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, addr) in [
            ("DEBUG_ADDR", &self.debug_addr),
            ("HTTP_ADDR", &self.http_addr),
            ("GRPC_ADDR", &self.grpc_addr),
        ] {
            if addr.is_empty() {
                return Err(ConfigError::MissingRequired(field));
            }
        }
        if self.token_cache == CacheBackend::Redis && self.redis_addr.is_empty() {
            return Err(ConfigError::MissingRequired("REDIS_ADDR"));
        }
        let positive = [
            ("CB_FAILURE_THRESHOLD", u64::from(self.circuit_breaker_failure_threshold)),
            ("CB_TIMEOUT", self.circuit_breaker_timeout_seconds),
            ("REQUEST_TIMEOUT", self.request_timeout_secs),
            ("UPSTREAM_TIMEOUT", self.upstream_timeout_secs),
            ("CLIENT_RATE_PER_SEC", u64::from(self.client_rate_per_sec)),
            ("CLIENT_RATE_BURST", u64::from(self.client_rate_burst)),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::NotPositive { field });
        }
        Ok(())
    }

    /// Per-call deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Upstream HTTP timeout.
    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Server-side circuit breaker settings.
    #[must_use]
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
            .with_failure_threshold(self.circuit_breaker_failure_threshold)
            .with_timeout(Duration::from_secs(self.circuit_breaker_timeout_seconds))
    }

    /// Client-side token bucket settings.
    #[must_use]
    pub const fn client_rate_limit(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            per_second: self.client_rate_per_sec,
            burst: self.client_rate_burst,
        }
    }

    /// Subscriber settings for this service.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig::default()
            .with_service_name("wechat-token-service")
            .with_log_level(self.log_level.clone())
            .with_json_output(self.log_format == LogFormat::Json)
    }

    /// Gets the OTLP endpoint URL as a string.
    #[must_use]
    pub fn otlp_endpoint_str(&self) -> &str {
        self.otlp_endpoint.as_str()
    }
}

/// Typed access to a variable lookup.
struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_string())
    }

    /// Listen address; a bare `:port` binds every interface.
    fn addr(&self, name: &str, default: &str) -> String {
        match (self.0)(name) {
            Some(addr) if addr.starts_with(':') => format!("0.0.0.0{addr}"),
            Some(addr) => addr,
            None => default.to_string(),
        }
    }

    /// Parse a variable with a default value.
    fn parse<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(name) {
            Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Parse a URL variable with a default value.
    fn url(&self, name: &str, default: &str) -> Result<Url, ConfigError> {
        let raw = (self.0)(name).unwrap_or_else(|| default.to_string());
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            field: name.to_string(),
            reason: e.to_string(),
        })
    }
}
