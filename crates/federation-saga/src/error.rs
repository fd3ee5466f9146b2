use federation_core::{CoreError, ErrorKind, StoreRef, TransactionId};
use federation_lock::LockError;
use federation_txlog::LogError;
use thiserror::Error;

use crate::adapter::ActionError;

/// A compensation that ran out of retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("compensation of step {step_index} on {store} failed after {attempts} attempt(s)")]
pub struct CompensationError {
    pub step_index: usize,
    pub store: StoreRef,
    /// What the compensation was trying to do, e.g. `deleteOrder`.
    pub description: String,
    pub attempts: u32,
    #[source]
    pub error: ActionError,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A forward action failed; every earlier step was compensated.
    #[error("step {step_index} on {store} failed")]
    StepFailed {
        step_index: usize,
        store: StoreRef,
        #[source]
        source: ActionError,
    },

    /// The target store was unreachable, so the step was never attempted.
    #[error("store {store} is unreachable; step {step_index} was not attempted")]
    PartitionDetected { step_index: usize, store: StoreRef },

    /// A step started before a crash has no recorded outcome and its store
    /// is unreachable. The record stays PENDING until the store answers.
    #[error("outcome of step {step_index} is in doubt: {store} is unreachable")]
    StepInDoubt {
        transaction_id: TransactionId,
        step_index: usize,
        store: StoreRef,
    },

    /// Compensation is waiting for an unreachable store. The record stays
    /// COMPENSATING and recovery retries it.
    #[error("compensation of step {step_index} is blocked: {store} is unreachable")]
    CompensationBlocked {
        transaction_id: TransactionId,
        step_index: usize,
        store: StoreRef,
    },

    /// At least one compensation exhausted its retries. The record is FAILED
    /// and the stores may hold partial effects.
    #[error(
        "transaction {transaction_id} failed ({cause}) and {} compensation(s) could not be applied",
        failures.len()
    )]
    CompensationFailed {
        transaction_id: TransactionId,
        cause: String,
        failures: Vec<CompensationError>,
    },

    #[error("transaction log write failed")]
    Log(#[from] LogError),

    #[error("invalid step list")]
    InvalidStep(#[from] CoreError),

    #[error("no adapter registered for {store}")]
    UnknownAdapter { store: StoreRef },

    /// A recovered record with no recorded cause for its rollback.
    #[error("transaction {transaction_id} was interrupted")]
    Interrupted { transaction_id: TransactionId },
}

impl SagaError {
    /// This error and its sources, joined with `": "`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// Whether the transaction is still incomplete and a later resume can
    /// finish it.
    #[must_use]
    pub fn awaits_recovery(&self) -> bool {
        matches!(
            self,
            Self::Lock(_) | Self::StepInDoubt { .. } | Self::CompensationBlocked { .. }
        )
    }

    /// The external error category for this failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Lock(LockError::Timeout { .. }) => ErrorKind::LockTimeout,
            Self::Lock(LockError::Conflict { .. }) => ErrorKind::LockConflict,
            Self::StepFailed { .. } | Self::Interrupted { .. } => ErrorKind::StepExecution,
            Self::PartitionDetected { .. } | Self::StepInDoubt { .. } => {
                ErrorKind::PartitionDetected
            }
            Self::CompensationBlocked { .. } => ErrorKind::CompensationBlocked,
            Self::CompensationFailed { .. } => ErrorKind::CompensationFailed,
            Self::Log(_) => ErrorKind::TransactionLog,
            Self::InvalidStep(_) | Self::UnknownAdapter { .. } => ErrorKind::Resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use federation_core::EntityKey;

    use super::*;

    #[test]
    fn lock_errors_map_to_their_own_kinds() {
        let timeout = SagaError::Lock(LockError::Timeout {
            store: StoreRef::local("orders"),
            entity_key: EntityKey::new("Order", "1"),
            waited: Duration::from_secs(5),
        });
        let conflict = SagaError::Lock(LockError::Conflict {
            store: StoreRef::local("orders"),
            entity_key: EntityKey::new("Order", "1"),
        });

        assert_eq!(timeout.kind(), ErrorKind::LockTimeout);
        assert_eq!(conflict.kind(), ErrorKind::LockConflict);
    }

    #[test]
    fn in_doubt_step_is_left_for_recovery() {
        let err = SagaError::StepInDoubt {
            transaction_id: TransactionId::new(),
            step_index: 1,
            store: StoreRef::subgraph("users"),
        };

        assert!(err.awaits_recovery());
        assert_eq!(err.kind(), ErrorKind::PartitionDetected);
        assert!(!SagaError::PartitionDetected {
            step_index: 1,
            store: StoreRef::subgraph("users"),
        }
        .awaits_recovery());
    }

    #[test]
    fn exhausted_compensation_is_an_incident() {
        let err = SagaError::CompensationFailed {
            transaction_id: TransactionId::new(),
            cause: "step 2 failed".to_string(),
            failures: Vec::new(),
        };

        assert!(err.kind().is_incident());
    }

    #[test]
    fn step_failure_keeps_action_error_as_source() {
        let err = SagaError::StepFailed {
            step_index: 1,
            store: StoreRef::subgraph("billing"),
            source: ActionError::Rejected("card declined".to_string()),
        };

        let source = std::error::Error::source(&err).expect("has source");

        assert_eq!(source.to_string(), "rejected by store: card declined");
        assert_eq!(
            err.describe(),
            "step 1 on subgraph:billing failed: rejected by store: card declined"
        );
    }
}
