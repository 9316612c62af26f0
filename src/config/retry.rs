//! Backoff policy for connection attempts.
//!
//! The delay before retry `n` (zero-based) is
//! `min(min_timeout * factor^n, max_timeout)`. With the defaults
//! (10 retries, factor 2, 1s, 8s) the schedule is
//! `1s, 2s, 4s, 8s, 8s, 8s, 8s, 8s, 8s, 8s`.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use resilient_ws::RetryPolicy;
//!
//! let policy = RetryPolicy::new()
//!     .with_retries(3)
//!     .with_min_timeout(Duration::from_millis(250));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 10;

/// Default exponential factor.
pub const DEFAULT_FACTOR: f64 = 2.0;

/// Default delay before the first retry.
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default upper bound on any delay.
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(8);

// ============================================================================
// RetryPolicy
// ============================================================================

/// Exponential backoff policy.
///
/// Applies to attempts that never reached the open state. A connection that
/// was established and later dropped restarts with a fresh budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub retries: u32,

    /// Growth factor between consecutive delays.
    pub factor: f64,

    /// Delay before the first retry.
    #[serde(with = "super::millis")]
    pub min_timeout: Duration,

    /// Upper bound on any delay.
    #[serde(with = "super::millis")]
    pub max_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RetryPolicy {
    /// Creates the default policy.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            factor: DEFAULT_FACTOR,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            max_timeout: DEFAULT_MAX_TIMEOUT,
        }
    }

    /// Creates a policy that never retries.
    #[inline]
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            retries: 0,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RetryPolicy {
    /// Sets the number of retries.
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the exponential factor.
    #[inline]
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Sets the minimum delay.
    #[inline]
    #[must_use]
    pub fn with_min_timeout(mut self, timeout: Duration) -> Self {
        self.min_timeout = timeout;
        self
    }

    /// Sets the maximum delay.
    #[inline]
    #[must_use]
    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = timeout;
        self
    }
}

// ============================================================================
// Schedule
// ============================================================================

impl RetryPolicy {
    /// Returns the delay before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let scaled = self.min_timeout.as_secs_f64() * self.factor.powi(exponent);
        let capped = scaled.min(self.max_timeout.as_secs_f64());

        Duration::from_millis((capped * 1000.0).round() as u64)
    }

    /// Returns the full delay schedule, one entry per retry.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.retries).map(|retry| self.delay(retry))
    }

    /// Checks the policy for values that would produce a nonsensical schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `factor` is below 1 or not finite,
    /// `max_timeout` is zero, or `min_timeout` exceeds `max_timeout`.
    pub fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(Error::config(format!(
                "retry factor must be a finite number >= 1, got {}",
                self.factor
            )));
        }

        if self.max_timeout.is_zero() {
            return Err(Error::config("retry maxTimeout must be greater than zero"));
        }

        if self.min_timeout > self.max_timeout {
            return Err(Error::config(format!(
                "retry minTimeout ({}ms) exceeds maxTimeout ({}ms)",
                self.min_timeout.as_millis(),
                self.max_timeout.as_millis()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
