//! Centralized error type for the shared primitives.
//!
//! Errors are classified as retryable or not, which helps callers decide
//! whether a failed operation is worth attempting again later.

use std::time::Duration;

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Circuit breaker is open for the specified service
    #[error("circuit breaker open for {service}")]
    CircuitOpen {
        /// The service name that has an open circuit
        service: String,
        /// Time left before the circuit admits a trial call
        retry_after: Duration,
    },

    /// Local rate limit budget exhausted
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the next token is available
        retry_after: Duration,
    },

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use rust_common::PlatformError;
    ///
    /// let err = PlatformError::RateLimited { retry_after: Duration::from_secs(1) };
    /// assert!(err.is_retryable());
    ///
    /// let err = PlatformError::InvalidInput("burst".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::RateLimited { .. })
    }

    /// Suggested wait before retrying, when the error carries one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } | Self::RateLimited { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// Create a circuit open error for the given service.
    #[must_use]
    pub fn circuit_open(service: impl Into<String>, retry_after: Duration) -> Self {
        Self::CircuitOpen {
            service: service.into(),
            retry_after,
        }
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
