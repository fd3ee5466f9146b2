//! Federated mutation transaction coordinator.
//!
//! Ties the pieces together: a mutation is resolved into steps, its entities
//! are locked, and the steps run as a saga against their stores while a
//! partition monitor guards every store access. On startup, and then
//! periodically, transactions a crash left behind are found in the durable
//! log and driven to a terminal state.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = CoordinatorConfig::load(Path::new("coordinator.toml"))?;
//! let log = Arc::new(FileTransactionLog::open(config.log_path())?);
//! let coordinator = TransactionCoordinator::from_config(&config, registry, log);
//! let handle = coordinator.start().await?;
//!
//! let result = coordinator.execute_mutation(&request, &map).await;
//!
//! handle.shutdown().await?;
//! ```

mod background;
mod config;
mod coordinator;
mod error;
mod recovery;
mod settings;

pub use background::RecoveryLoop;
pub use config::{CoordinatorConfig, RecoveryConfig};
pub use coordinator::{CoordinatorHandle, TransactionCoordinator};
pub use error::{ConfigError, CoordinatorError, Result};
pub use recovery::{RecoveryManager, RecoveryMetrics, RecoveryReport};

pub const DEFAULT_LOG_PATH: &str = "federation-transactions.log";
