//! Retry bookkeeping for one attempt sequence.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::config::RetryPolicy;

// ============================================================================
// RetryOperation
// ============================================================================

/// Tracks attempts against a [`RetryPolicy`].
///
/// Created when an attempt sequence starts; the first attempt is counted
/// immediately. Discarded (never reset) when the sequence restarts.
#[derive(Debug, Clone)]
pub(crate) struct RetryOperation {
    policy: RetryPolicy,
    attempts: u32,
    stopped: bool,
}

impl RetryOperation {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 1,
            stopped: false,
        }
    }

    /// Number of attempts started so far, including the current one.
    #[inline]
    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retries still available.
    pub(crate) fn retries_left(&self) -> u32 {
        if self.stopped {
            return 0;
        }
        self.policy.retries.saturating_sub(self.attempts - 1)
    }

    /// Consumes one retry and returns the delay before the next attempt.
    ///
    /// Returns `None` once the budget is spent or the operation is stopped.
    pub(crate) fn retry(&mut self) -> Option<Duration> {
        if self.retries_left() == 0 {
            return None;
        }

        let delay = self.policy.delay(self.attempts - 1);
        self.attempts += 1;
        Some(delay)
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }
}

// ============================================================================
// Tests
// ============================================================================
