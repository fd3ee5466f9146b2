use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use federation_lock::{LockConfig, LockCoordinator};
use federation_partition::{MonitorConfig, PartitionMonitor};
use federation_saga::{ExecutorConfig, RetryPolicy, SagaExecutor, StoreRegistry};
use federation_txlog::TransactionLog;

use crate::error::ConfigError;
use crate::settings::{
    CompensationSection, ConfigFile, ExecutorSection, LocksSection, PartitionSection,
    RecoverySection,
};

pub const DEFAULT_RECOVERY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECOVERY_ATTEMPTS: u32 = 5;
pub const DEFAULT_STALE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryConfig {
    interval: Duration,
    max_attempts: u32,
    stale_age: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECOVERY_INTERVAL,
            max_attempts: DEFAULT_RECOVERY_ATTEMPTS,
            stale_age: DEFAULT_STALE_AGE,
        }
    }
}

impl RecoveryConfig {
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32, stale_age: Duration) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            stale_age,
        }
    }

    /// Pause between background recovery passes.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How many times one transaction is re-driven before recovery gives up
    /// on it and leaves it to an operator.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Age past which COMMITTED and COMPENSATED records are purged.
    #[must_use]
    pub fn stale_age(&self) -> Duration {
        self.stale_age
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    locks: LockConfig,
    executor: ExecutorConfig,
    partition: MonitorConfig,
    recovery: RecoveryConfig,
    log_path: PathBuf,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            locks: LockConfig::default(),
            executor: ExecutorConfig::default(),
            partition: MonitorConfig::default(),
            recovery: RecoveryConfig::default(),
            log_path: PathBuf::from(crate::DEFAULT_LOG_PATH),
        }
    }
}

impl CoordinatorConfig {
    /// Reads and validates the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when the file
    /// can't be loaded, or [`ConfigError::Invalid`] for an out-of-range value.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_file(file)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed input or
    /// [`ConfigError::Invalid`] for an out-of-range value.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            locks: build_lock_config(&file.locks),
            executor: build_executor_config(&file.executor, &file.compensation)?,
            partition: build_monitor_config(&file.partition)?,
            recovery: build_recovery_config(&file.recovery)?,
            log_path: file.log.path.unwrap_or(defaults.log_path),
        })
    }

    #[must_use]
    pub fn locks(&self) -> &LockConfig {
        &self.locks
    }

    #[must_use]
    pub fn executor(&self) -> &ExecutorConfig {
        &self.executor
    }

    #[must_use]
    pub fn partition(&self) -> &MonitorConfig {
        &self.partition
    }

    #[must_use]
    pub fn recovery(&self) -> &RecoveryConfig {
        &self.recovery
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// An executor wired with this config's lock, partition and retry
    /// settings. Probes are registered on the returned executor's monitor.
    #[must_use]
    pub fn build_executor(
        &self,
        registry: StoreRegistry,
        log: Arc<dyn TransactionLog>,
    ) -> SagaExecutor {
        let monitor = Arc::new(PartitionMonitor::new(self.partition));
        SagaExecutor::new(registry, log, monitor)
            .with_locks(LockCoordinator::new(self.locks))
            .with_config(self.executor)
    }
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn non_zero(field: &'static str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn build_lock_config(section: &LocksSection) -> LockConfig {
    let defaults = LockConfig::default();
    LockConfig::new(millis(
        section.acquire_timeout_ms,
        defaults.acquire_timeout(),
    ))
}

fn build_executor_config(
    executor: &ExecutorSection,
    compensation: &CompensationSection,
) -> Result<ExecutorConfig, ConfigError> {
    let defaults = ExecutorConfig::default();
    let retry_defaults = RetryPolicy::default();

    let max_attempts = compensation
        .max_attempts
        .unwrap_or(retry_defaults.max_attempts());
    if max_attempts == 0 {
        return Err(ConfigError::Invalid {
            field: "compensation.max-attempts",
            reason: "must be at least 1".to_string(),
        });
    }
    let base_delay = millis(compensation.base_delay_ms, retry_defaults.base_delay());
    let max_delay = millis(compensation.max_delay_ms, retry_defaults.max_delay());
    if max_delay < base_delay {
        return Err(ConfigError::Invalid {
            field: "compensation.max-delay-ms",
            reason: format!(
                "{}ms is below base-delay-ms {}ms",
                max_delay.as_millis(),
                base_delay.as_millis()
            ),
        });
    }
    let retry = RetryPolicy::new(
        max_attempts,
        compensation.strategy.unwrap_or(retry_defaults.strategy()),
        base_delay,
        max_delay,
    );

    Ok(ExecutorConfig::new(
        non_zero(
            "executor.step-timeout-ms",
            millis(executor.step_timeout_ms, defaults.step_timeout()),
        )?,
        non_zero(
            "executor.compensation-timeout-ms",
            millis(
                executor.compensation_timeout_ms,
                defaults.compensation_timeout(),
            ),
        )?,
        retry,
    ))
}

fn build_monitor_config(section: &PartitionSection) -> Result<MonitorConfig, ConfigError> {
    let defaults = MonitorConfig::default();
    let probe_interval = non_zero(
        "partition.probe-interval-ms",
        millis(section.probe_interval_ms, defaults.probe_interval()),
    )?;
    let probe_timeout = non_zero(
        "partition.probe-timeout-ms",
        millis(section.probe_timeout_ms, defaults.probe_timeout()),
    )?;
    let staleness_window = millis(section.staleness_window_ms, defaults.staleness_window());
    if staleness_window < probe_interval {
        return Err(ConfigError::Invalid {
            field: "partition.staleness-window-ms",
            reason: format!(
                "{}ms is shorter than probe-interval-ms {}ms",
                staleness_window.as_millis(),
                probe_interval.as_millis()
            ),
        });
    }
    Ok(MonitorConfig::new(
        probe_interval,
        probe_timeout,
        staleness_window,
    ))
}

fn build_recovery_config(section: &RecoverySection) -> Result<RecoveryConfig, ConfigError> {
    let defaults = RecoveryConfig::default();
    let max_attempts = section.max_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        return Err(ConfigError::Invalid {
            field: "recovery.max-attempts",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(RecoveryConfig::new(
        non_zero(
            "recovery.interval-ms",
            millis(section.interval_ms, defaults.interval),
        )?,
        max_attempts,
        section
            .stale_age_hours
            .map_or(defaults.stale_age, |hours| {
                Duration::from_secs(hours.saturating_mul(60 * 60))
            }),
    ))
}
