//! Circuit breaker implementation for resilience.
//!
//! Protects callers from cascading failures when a downstream dependency is
//! unhealthy. State is keyed by the breaker's name; one breaker instance
//! guards one logical operation.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::PlatformError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, limited requests are allowed to test recovery
    HalfOpen,
}

impl CircuitState {
    /// Lower-case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Numeric encoding for gauges (0 closed, 1 open, 2 half-open).
    #[must_use]
    pub const fn as_gauge(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of consecutive successes in half-open state to close the circuit
    pub success_threshold: u32,
    /// Time to wait before transitioning from open to half-open
    pub timeout: Duration,
    /// Maximum requests allowed in half-open state
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            timeout: Duration::from_secs(60),
            half_open_max_requests: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with custom failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Create a new config with custom success threshold.
    #[must_use]
    pub const fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Create a new config with custom timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a new config with a custom half-open admission limit.
    #[must_use]
    pub const fn with_half_open_max_requests(mut self, max: u32) -> Self {
        self.half_open_max_requests = max;
        self
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
    half_open_requests: u32,
    trial_started_at: Option<Instant>,
}

impl Inner {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            opened_at: None,
            half_open_requests: 0,
            trial_started_at: None,
        }
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.successes = 0;
        self.half_open_requests = 0;
        self.trial_started_at = None;
    }

    fn start_trial(&mut self) {
        self.state = CircuitState::HalfOpen;
        self.successes = 0;
        self.half_open_requests = 1;
        self.trial_started_at = Some(Instant::now());
    }
}

/// Circuit breaker for protecting external services.
///
/// Implements the circuit breaker pattern with three states:
/// - Closed: Normal operation, consecutive failures are counted
/// - Open: Failure threshold reached, requests are rejected until the timeout elapses
/// - Half-Open: Testing recovery, a limited number of trial requests are allowed
///
/// All transitions happen under one lock, so concurrent callers observe a
/// consistent state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::closed()),
        }
    }

    /// Create a circuit breaker with default configuration.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Returns the circuit breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration this breaker was built with.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check if a request is allowed.
    ///
    /// Returns `true` if the request should proceed, `false` if it should be rejected.
    /// An open circuit whose timeout has elapsed moves to half-open and admits
    /// the caller as a trial request. A half-open window whose trials never
    /// reported back within `timeout` admits a fresh trial.
    pub async fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.timeout);
                if elapsed {
                    inner.start_trial();
                    info!(circuit = %self.name, "Circuit transitioning to half-open");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_requests < self.config.half_open_max_requests {
                    inner.half_open_requests += 1;
                    true
                } else if inner
                    .trial_started_at
                    .is_some_and(|at| at.elapsed() >= self.config.timeout)
                {
                    inner.start_trial();
                    warn!(circuit = %self.name, "Half-open trial abandoned, admitting a new one");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Admit a request or fail with [`PlatformError::CircuitOpen`].
    ///
    /// # Errors
    ///
    /// Returns `CircuitOpen` carrying the remaining open time when the
    /// circuit rejects the request.
    pub async fn acquire(&self) -> Result<(), PlatformError> {
        if self.allow_request().await {
            return Ok(());
        }
        Err(PlatformError::circuit_open(
            self.name.clone(),
            self.retry_after().await,
        ))
    }

    /// Record a successful request.
    ///
    /// In half-open state, consecutive successes will close the circuit.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    *inner = Inner::closed();
                    info!(circuit = %self.name, "Circuit closed after recovery");
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    /// Record a failed request.
    ///
    /// Consecutive failures open the circuit; any failure during half-open
    /// re-opens it immediately.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    let failures = inner.failures;
                    inner.trip();
                    warn!(circuit = %self.name, failures, "Circuit opened due to failures");
                }
            }
            CircuitState::HalfOpen => {
                inner.trip();
                warn!(circuit = %self.name, "Circuit re-opened from half-open");
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current circuit state.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Get the current consecutive failure count.
    pub async fn failure_count(&self) -> u32 {
        self.inner.lock().await.failures
    }

    /// Time left before an open circuit admits a trial request.
    pub async fn retry_after(&self) -> Duration {
        let inner = self.inner.lock().await;
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) => self.config.timeout.saturating_sub(at.elapsed()),
            _ => Duration::ZERO,
        }
    }

    /// Reset the circuit breaker to closed state.
    pub async fn reset(&self) {
        *self.inner.lock().await = Inner::closed();
    }
}
