use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("step {step_index} ('{operation}') has no compensating action but is not a read")]
    MissingCompensation { step_index: usize, operation: String },

    #[error("transaction has no steps")]
    NoSteps,

    #[error("step {step_index} declares no entity keys")]
    NoEntityKeys { step_index: usize },

    #[error("step list is not contiguous: expected index {expected}, found {found}")]
    StepOrder { expected: usize, found: usize },

    #[error("invalid transaction id '{0}'")]
    InvalidTransactionId(String),

    #[error("unknown transaction state '{0}'")]
    UnknownState(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
