use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("probe did not answer within {0:?}")]
    Timeout(Duration),

    #[error("no health probe registered")]
    NotRegistered,
}
