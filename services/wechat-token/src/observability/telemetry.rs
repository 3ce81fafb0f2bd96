//! Telemetry initialization
//!
//! Installs the global `tracing` subscriber. With the `otel` feature and
//! tracing enabled, spans are also exported over OTLP with W3C trace
//! context propagation.

use anyhow::Context as _;

use crate::config::Config;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces
    pub service_name: String,
    /// OTLP endpoint URL
    pub otlp_endpoint: String,
    /// Export spans over OTLP
    pub export_spans: bool,
    /// Subscriber settings
    pub tracing: rust_common::TracingConfig,
}

impl TelemetryConfig {
    /// Telemetry settings derived from the service configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            service_name: "wechat-token-service".to_string(),
            otlp_endpoint: config.otlp_endpoint_str().to_string(),
            export_spans: config.tracing_enabled,
            tracing: config.tracing_config(),
        }
    }
}

/// Initializes the global subscriber.
///
/// # Errors
///
/// Fails when a subscriber is already installed or the exporter cannot be built.
#[cfg(not(feature = "otel"))]
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    rust_common::init_tracing(&config.tracing).context("installing tracing subscriber")
}

/// Initializes the global subscriber with an OTLP span exporter.
///
/// # Errors
///
/// Fails when a subscriber is already installed or the exporter cannot be built.
#[cfg(feature = "otel")]
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{Resource, runtime, trace::TracerProvider};

    if !config.export_spans {
        return rust_common::init_tracing(&config.tracing).context("installing tracing subscriber");
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .context("building OTLP span exporter")?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build();

    let tracer = provider.tracer("wechat-token-service");
    opentelemetry::global::set_tracer_provider(provider);

    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    rust_common::init_tracing_with(&config.tracing, otel_layer)
        .context("installing tracing subscriber")
}

/// Flushes and shuts down span export.
pub fn shutdown_telemetry() {
    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();
}
