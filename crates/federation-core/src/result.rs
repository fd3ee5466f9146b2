use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::TransactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Resolution,
    LockTimeout,
    LockConflict,
    StepExecution,
    PartitionDetected,
    /// Compensation is waiting for an unreachable store; recovery retries it.
    CompensationBlocked,
    /// Compensation exhausted its retries; partial effects may remain.
    CompensationFailed,
    TransactionLog,
}

impl ErrorKind {
    /// Whether this failure needs an operator, as opposed to an ordinary
    /// rejected mutation.
    #[must_use]
    pub fn is_incident(self) -> bool {
        matches!(self, Self::CompensationFailed | Self::TransactionLog)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolution => "resolution",
            Self::LockTimeout => "lock_timeout",
            Self::LockConflict => "lock_conflict",
            Self::StepExecution => "step_execution",
            Self::PartitionDetected => "partition_detected",
            Self::CompensationBlocked => "compensation_blocked",
            Self::CompensationFailed => "compensation_failed",
            Self::TransactionLog => "transaction_log",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationError {
    pub kind: ErrorKind,
    pub message: String,
    pub transaction_id: Option<TransactionId>,
}

/// What the mutation execution layer receives back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<MutationError>,
}

impl MutationResult {
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(
        kind: ErrorKind,
        message: impl Into<String>,
        transaction_id: Option<TransactionId>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(MutationError {
                kind,
                message: message.into(),
                transaction_id,
            }),
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
