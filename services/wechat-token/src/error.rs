//! Error handling module with type-safe, non-exhaustive error types
//!
//! Every failure a `GetToken` call can produce is a [`TokenServiceError`].
//! Provider failures pass through the pipeline unchanged; the remaining
//! variants are produced by the pipeline layers or the transports.

use std::time::Duration;

use axum::http::StatusCode;
use rust_common::PlatformError;
use thiserror::Error;
use tonic::Code;

use crate::provider::ProviderError;

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TokenServiceError {
    /// The token provider failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Circuit breaker is open
    #[error("circuit open for {service}")]
    CircuitOpen {
        /// Name of the guarded operation
        service: String,
        /// When the circuit admits a trial request
        retry_after: Duration,
    },

    /// Client-side rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited {
        /// When a token is available again
        retry_after: Duration,
    },

    /// Request could not be decoded
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Decoder message
        reason: String,
    },

    /// The caller canceled the request
    #[error("context canceled")]
    Canceled,

    /// The request deadline passed before the provider answered
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Wire-level failure on the client path
    #[error("transport error: {reason}")]
    Transport {
        /// Description from the RPC stack
        reason: String,
    },

    /// Failure reported by a remote server in its reply
    #[error("{message}")]
    Remote {
        /// Reply code sent by the server
        code: i32,
        /// Error string sent by the server
        message: String,
    },

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Stable error codes shared by both transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Provider failure
    Provider,
    /// Circuit open
    CircuitOpen,
    /// Rate limited
    RateLimited,
    /// Undecodable request
    InvalidRequest,
    /// Canceled by the caller
    Canceled,
    /// Deadline exceeded
    DeadlineExceeded,
    /// Client transport failure
    Transport,
    /// Internal failure
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "PROVIDER_ERROR",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Canceled => "CANCELED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Numeric code carried in the RPC reply. Zero means success.
    #[must_use]
    pub const fn rpc_code(self) -> i32 {
        match self {
            Self::Provider => 1,
            Self::CircuitOpen => 2,
            Self::RateLimited => 3,
            Self::InvalidRequest => 4,
            Self::Canceled => 5,
            Self::DeadlineExceeded => 6,
            Self::Transport => 7,
            Self::Internal => 8,
        }
    }

    /// Inverse of [`ErrorCode::rpc_code`].
    #[must_use]
    pub const fn from_rpc_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Provider),
            2 => Some(Self::CircuitOpen),
            3 => Some(Self::RateLimited),
            4 => Some(Self::InvalidRequest),
            5 => Some(Self::Canceled),
            6 => Some(Self::DeadlineExceeded),
            7 => Some(Self::Transport),
            8 => Some(Self::Internal),
            _ => None,
        }
    }

    /// HTTP status for a failed call.
    ///
    /// Every failure maps to 400 so existing HTTP callers keep working.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl TokenServiceError {
    /// Get the error code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Provider(_) => ErrorCode::Provider,
            Self::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::Canceled => ErrorCode::Canceled,
            Self::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Remote { code, .. } => ErrorCode::from_rpc_code(*code).unwrap_or(ErrorCode::Internal),
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Code written into an RPC reply for this error.
    ///
    /// Remote failures relay the code they arrived with.
    #[must_use]
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Remote { code, .. } if *code != 0 => *code,
            _ => self.code().rpc_code(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        self.code().http_status()
    }

    /// Check if this error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. }
                | Self::RateLimited { .. }
                | Self::DeadlineExceeded
                | Self::Transport { .. }
        )
    }

    /// Get retry-after duration if applicable
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } | Self::RateLimited { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }
}

impl From<PlatformError> for TokenServiceError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::CircuitOpen {
                service,
                retry_after,
            } => Self::CircuitOpen {
                service,
                retry_after,
            },
            PlatformError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            PlatformError::InvalidInput(reason) => Self::InvalidRequest { reason },
            PlatformError::Internal(message) => Self::Internal(anyhow::anyhow!(message)),
        }
    }
}

impl From<tonic::Status> for TokenServiceError {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            Code::Cancelled => Self::Canceled,
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            code => Self::Transport {
                reason: format!("{code}: {}", status.message()),
            },
        }
    }
}
