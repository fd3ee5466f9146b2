use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COMPENSATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    step_timeout: Duration,
    compensation_timeout: Duration,
    compensation_retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            compensation_timeout: DEFAULT_COMPENSATION_TIMEOUT,
            compensation_retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn new(
        step_timeout: Duration,
        compensation_timeout: Duration,
        compensation_retry: RetryPolicy,
    ) -> Self {
        Self {
            step_timeout,
            compensation_timeout,
            compensation_retry,
        }
    }

    /// Bound on one forward action. Expiry counts as a step failure.
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Bound on one compensation attempt.
    #[must_use]
    pub fn compensation_timeout(&self) -> Duration {
        self.compensation_timeout
    }

    #[must_use]
    pub fn compensation_retry(&self) -> &RetryPolicy {
        &self.compensation_retry
    }

    #[must_use]
    pub fn with_compensation_retry(mut self, policy: RetryPolicy) -> Self {
        self.compensation_retry = policy;
        self
    }

    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }
}
