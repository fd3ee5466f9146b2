mod check_config;
mod cleanup;
mod list;
mod show;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use federation_coordinator::{CoordinatorConfig, DEFAULT_LOG_PATH};
use federation_core::TransactionState;
use federation_txlog::FileTransactionLog;
use tracing::debug;

use crate::error::{CliError, Result};

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List transactions in the log
    List {
        /// Only show transactions in this state
        #[arg(long, value_enum)]
        state: Option<TransactionState>,
    },
    /// List transactions a restarted coordinator still has to finish
    Incomplete,
    /// Print one transaction record as JSON
    Show {
        /// Transaction id (UUID)
        transaction_id: String,
    },
    /// Purge committed and compensated transactions older than a threshold
    Cleanup {
        /// Age in hours past which finished transactions are purged
        #[arg(long, default_value_t = 24)]
        older_than_hours: u32,
    },
    /// Parse and validate a coordinator config file
    CheckConfig {
        /// Path to the TOML config file
        path: PathBuf,
    },
}

impl Commands {
    pub(crate) fn execute(self, context: &Context) -> Result<()> {
        match self {
            Self::List { state } => list::run(context, state),
            Self::Incomplete => list::run_incomplete(context),
            Self::Show { transaction_id } => show::run(context, &transaction_id),
            Self::Cleanup { older_than_hours } => cleanup::run(context, older_than_hours),
            Self::CheckConfig { path } => check_config::run(&path),
        }
    }
}

/// Where the log lives, resolved from the global flags.
pub(crate) struct Context {
    log: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl Context {
    pub(crate) fn new(log: Option<PathBuf>, config: Option<PathBuf>) -> Self {
        Self { log, config }
    }

    /// `--log` wins over the config file, which wins over the default path.
    pub(crate) fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log {
            return Ok(path.clone());
        }
        if let Some(config) = &self.config {
            let config = CoordinatorConfig::load(config)?;
            return Ok(config.log_path().to_path_buf());
        }
        Ok(PathBuf::from(DEFAULT_LOG_PATH))
    }

    /// Opens an existing log. Opening never creates one, so a mistyped path
    /// is reported instead of leaving an empty file behind.
    pub(crate) fn open_log(&self) -> Result<FileTransactionLog> {
        let path = self.log_path()?;
        if !Path::new(&path).is_file() {
            return Err(CliError::MissingLog(path));
        }
        debug!(path = %path.display(), "opening transaction log");
        Ok(FileTransactionLog::open(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::Context;
    use crate::error::CliError;

    #[test]
    fn explicit_log_path_wins() -> anyhow::Result<()> {
        let context = Context::new(
            Some(PathBuf::from("/tmp/explicit.log")),
            Some(PathBuf::from("/does/not/exist.toml")),
        );

        assert_eq!(context.log_path()?, PathBuf::from("/tmp/explicit.log"));
        Ok(())
    }

    #[test]
    fn log_path_comes_from_config() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = dir.path().join("coordinator.toml");
        fs::write(&config, "[log]\npath = \"/srv/federation/tx.log\"\n")?;

        let context = Context::new(None, Some(config));

        assert_eq!(context.log_path()?, PathBuf::from("/srv/federation/tx.log"));
        Ok(())
    }

    #[test]
    fn default_log_path_without_flags() -> anyhow::Result<()> {
        let context = Context::new(None, None);

        assert_eq!(
            context.log_path()?,
            PathBuf::from("federation-transactions.log")
        );
        Ok(())
    }

    #[test]
    fn missing_log_is_not_created() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("absent.log");
        let context = Context::new(Some(path.clone()), None);

        let err = context.open_log().expect_err("log is missing");

        assert!(matches!(err, CliError::MissingLog(p) if p == path));
        assert!(!path.exists());
        Ok(())
    }
}
