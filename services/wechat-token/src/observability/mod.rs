//! Observability Module
//!
//! Prometheus metrics and tracing subscriber setup.

pub mod metrics;
pub mod telemetry;

pub use metrics::{Metrics, render};
pub use telemetry::{TelemetryConfig, init_telemetry, shutdown_telemetry};
