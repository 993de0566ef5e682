//! Reconnect delay policy.

use std::time::Duration;

/// Reconnect delay, 5 seconds by default.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Delay schedule between sessions.
///
/// Attempts are never capped; the policy only decides how long to wait.
/// A fixed policy returns the same delay forever, an exponential one
/// doubles it up to `max` and starts over after [`reset`](Self::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial: Duration,
    max: Duration,
    multiplier: u32,
    current: Duration,
}

impl RetryPolicy {
    /// Waits `delay` before every attempt.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1,
            current: delay,
        }
    }

    /// Doubles the delay after each failure, starting at `initial` and
    /// capped at `max`.
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: 2,
            current: initial,
        }
    }

    /// Returns the delay to wait now and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .saturating_mul(self.multiplier)
            .min(self.max);
        delay
    }

    /// Restarts the schedule after a healthy session.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}
