//! Service and Circuit Breaker Metrics
//!
//! Provides Prometheus metrics registered on an explicitly constructed
//! registry owned by the application.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

const NAMESPACE: &str = "wechat_token";

/// Metrics of the `GetToken` service and pipeline
#[derive(Clone)]
pub struct Metrics {
    /// Calls per application id
    pub invoke_count: IntCounterVec,
    /// Pipeline latency by method and outcome
    pub request_duration: HistogramVec,
    /// Current breaker state (0=closed, 1=open, 2=half-open)
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    /// Creates and registers the metrics on `registry`.
    ///
    /// # Errors
    ///
    /// Fails when a metric is already registered on `registry`.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let invoke_count = IntCounterVec::new(
            Opts::new("invoke_count", "Total count of GetToken invocations")
                .namespace(NAMESPACE),
            &["appid"],
        )?;
        registry.register(Box::new(invoke_count.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "GetToken pipeline latency in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "success"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new("circuit_breaker_state", "Current circuit breaker state")
                .namespace(NAMESPACE),
            &["circuit"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            invoke_count,
            request_duration,
            circuit_breaker_state,
        })
    }
}

/// Renders `registry` in the Prometheus text exposition format.
///
/// # Errors
///
/// Fails when a metric family cannot be encoded.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
