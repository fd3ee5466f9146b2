use std::path::PathBuf;

use federation_core::{TransactionId, TransactionState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open transaction log '{path}'")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write transaction log '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compact transaction log '{path}'")]
    Compact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt entry on line {line} of transaction log '{path}'")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize log entry")]
    Serialize(#[source] serde_json::Error),

    #[error("transaction {0} is not in the log")]
    NotFound(TransactionId),

    #[error("transaction {0} is already in the log")]
    AlreadyExists(TransactionId),

    #[error("transaction {transaction_id} is {state} and can no longer change")]
    Terminal {
        transaction_id: TransactionId,
        state: TransactionState,
    },

    #[error("transaction {transaction_id} has no step {step_index}")]
    StepOutOfRange {
        transaction_id: TransactionId,
        step_index: usize,
    },

    #[error("transaction log unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, LogError>;
