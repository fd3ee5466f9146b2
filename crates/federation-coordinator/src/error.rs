use std::path::PathBuf;

use federation_txlog::LogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("TOML parse error")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transaction log unavailable")]
    Log(#[from] LogError),

    #[error("background task panicked")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
