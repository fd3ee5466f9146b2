use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use federation_core::{Action, StoreRef, TransactionId};
use serde_json::Value;
use thiserror::Error;

/// Failure of a single forward or compensating action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The store answered and refused the action.
    #[error("rejected by store: {0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// A failure read back from the transaction log after a restart.
    #[error("{0}")]
    Recorded(String),
}

/// Identity of one action invocation, handed to every adapter call.
///
/// `idempotency_key` is stable across retries and across a crash and resume,
/// so a store can recognise an action it already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub transaction_id: TransactionId,
    pub step_index: usize,
    /// 1-based. Anything above 1 may be a repeat of an applied action.
    pub attempt: u32,
    pub idempotency_key: String,
}

impl StepContext {
    #[must_use]
    pub fn new(transaction_id: TransactionId, step_index: usize, attempt: u32) -> Self {
        Self {
            transaction_id,
            step_index,
            attempt,
            idempotency_key: format!("{transaction_id}:{step_index}"),
        }
    }
}

impl fmt::Display for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (attempt {})", self.idempotency_key, self.attempt)
    }
}

/// Runs forward actions against one kind of store.
#[async_trait]
pub trait ForwardExecutable: Send + Sync {
    /// Applies `action` to `store` and returns its result payload.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the store refuses the action or can't be
    /// reached.
    async fn execute(
        &self,
        store: &StoreRef,
        action: &Action,
        ctx: &StepContext,
    ) -> Result<Value, ActionError>;
}

/// Runs compensating actions against one kind of store.
#[async_trait]
pub trait CompensatingExecutable: Send + Sync {
    /// Undoes a forward action. `forward_result` is the payload the forward
    /// action returned, which carries any pre-image the undo needs.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the undo could not be applied.
    async fn compensate(
        &self,
        store: &StoreRef,
        action: &Action,
        forward_result: Option<&Value>,
        ctx: &StepContext,
    ) -> Result<(), ActionError>;
}

/// Both capabilities; what the registry hands out.
pub trait StoreAdapter: ForwardExecutable + CompensatingExecutable {}

impl<T: ForwardExecutable + CompensatingExecutable> StoreAdapter for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_across_attempts() {
        let id = TransactionId::new();

        let first = StepContext::new(id, 2, 1);
        let retry = StepContext::new(id, 2, 3);

        assert_eq!(first.idempotency_key, retry.idempotency_key);
        assert_eq!(first.idempotency_key, format!("{id}:2"));
    }

    #[test]
    fn distinct_steps_get_distinct_keys() {
        let id = TransactionId::new();

        assert_ne!(
            StepContext::new(id, 0, 1).idempotency_key,
            StepContext::new(id, 1, 1).idempotency_key
        );
    }
}
