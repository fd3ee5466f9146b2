use std::time::Duration;

/// Default bound on waiting for a single entity lock.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl LockConfig {
    /// A zero timeout means "never wait": a held key fails immediately with
    /// [`LockError::Conflict`](crate::LockError::Conflict).
    #[must_use]
    pub fn new(acquire_timeout: Duration) -> Self {
        Self { acquire_timeout }
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    #[must_use]
    pub fn is_no_wait(&self) -> bool {
        self.acquire_timeout.is_zero()
    }
}
