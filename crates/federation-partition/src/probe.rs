use async_trait::async_trait;

use crate::error::ProbeError;

/// Lightweight reachability check exposed by one participating store.
///
/// Implementations should be cheap; the monitor bounds every call with its
/// own timeout regardless.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ProbeError::Unreachable`] when the store can't be reached.
    async fn ping(&self) -> Result<(), ProbeError>;
}
