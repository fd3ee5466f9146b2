use std::path::PathBuf;

use federation_core::{CoreError, TransactionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("transaction log error")]
    Log(#[from] federation_txlog::LogError),

    #[error("configuration error")]
    Config(#[from] federation_coordinator::ConfigError),

    #[error("invalid argument")]
    Argument(#[from] CoreError),

    #[error("no transaction log at '{0}'")]
    MissingLog(PathBuf),

    #[error("transaction {0} not found")]
    NotFound(TransactionId),

    #[error("failed to render transaction record")]
    Render(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
