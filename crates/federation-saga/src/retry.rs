use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * 2^(retry - 1)`
    #[default]
    Exponential,
    /// `base * retry`
    Linear,
    Fixed,
}

/// Bounded retry schedule for compensating actions.
///
/// `max_attempts` is the total number of invocations, not the number of
/// retries: with 3, a compensation is tried three times and reported as
/// exhausted after the third failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    strategy: BackoffStrategy,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strategy: BackoffStrategy::default(),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts every invocation, the first one included, and
    /// is at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        strategy: BackoffStrategy,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            strategy,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// No waiting between attempts. Handy in tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(
            max_attempts,
            BackoffStrategy::Fixed,
            Duration::ZERO,
            Duration::ZERO,
        )
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before the `retry`-th retry (1-based), capped at `max_delay`.
    /// Retry 0 is the first attempt and never waits.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let delay = match self.strategy {
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(retry),
            BackoffStrategy::Fixed => self.base_delay,
        };
        delay.min(self.max_delay)
    }
}
