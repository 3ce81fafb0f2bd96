//! Tracing subscriber initialization.
//!
//! Installs the process-wide `tracing` subscriber once at start-up: an
//! `EnvFilter` (`RUST_LOG` wins over the configured level), a JSON or text
//! formatter, and an optional extra layer such as an OpenTelemetry exporter.

use tracing_subscriber::layer::{Identity, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::PlatformError;

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for tracing
    pub service_name: String,
    /// Log level filter
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "rust-service".to_string(),
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Initialize tracing with the given configuration.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), PlatformError> {
    init_tracing_with(config, Identity::new())
}

/// Initialize tracing with an additional layer stacked under the formatter.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing_with<L>(config: &TracingConfig, extra: L) -> Result<(), PlatformError>
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let json = config.json_output.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
    });
    let text = (!config.json_output).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(extra)
        .with(config.filter())
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| PlatformError::Internal(format!("tracing init failed: {e}")))
}
