//! Token-bucket rate limiting for outbound calls.
//!
//! Wraps the `governor` crate's direct (un-keyed) limiter. The bucket
//! refills at `per_second` tokens per second up to `burst` tokens; callers
//! consult it before each call and never wait on it.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota};

use crate::error::PlatformError;

/// Rate limit decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request allowed, one token consumed
    Allowed,
    /// Request denied with retry-after duration
    Denied {
        /// Time until the bucket holds a token again
        retry_after: Duration,
    },
}

/// Token bucket configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Refill rate in tokens per second
    pub per_second: u32,
    /// Bucket capacity
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            burst: 100,
        }
    }
}

/// Erroring token-bucket limiter.
#[derive(Debug)]
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    clock: DefaultClock,
    replenish_interval: Duration,
}

impl RateLimiter {
    /// Build a limiter from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when the rate or the burst is zero.
    pub fn new(config: RateLimiterConfig) -> Result<Self, PlatformError> {
        let per_second = NonZeroU32::new(config.per_second)
            .ok_or_else(|| PlatformError::invalid_input("rate limit per_second must be > 0"))?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| PlatformError::invalid_input("rate limit burst must be > 0"))?;

        let quota = Quota::per_second(per_second).allow_burst(burst);
        Ok(Self {
            limiter: DefaultDirectRateLimiter::direct(quota),
            clock: DefaultClock::default(),
            replenish_interval: quota.replenish_interval(),
        })
    }

    /// Consume one token if available.
    pub fn check(&self) -> RateLimitDecision {
        match self.limiter.check() {
            Ok(()) => RateLimitDecision::Allowed,
            Err(not_until) => RateLimitDecision::Denied {
                retry_after: not_until
                    .wait_time_from(self.clock.now())
                    .min(self.replenish_interval),
            },
        }
    }

    /// Consume one token or fail with [`PlatformError::RateLimited`].
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when the bucket is empty.
    pub fn acquire(&self) -> Result<(), PlatformError> {
        match self.check() {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Denied { retry_after } => {
                Err(PlatformError::RateLimited { retry_after })
            }
        }
    }
}
