use std::path::PathBuf;

use federation_saga::BackoffStrategy;
use serde::Deserialize;

/// On-disk shape of the coordinator config. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ConfigFile {
    pub(crate) locks: LocksSection,
    pub(crate) executor: ExecutorSection,
    pub(crate) compensation: CompensationSection,
    pub(crate) partition: PartitionSection,
    pub(crate) recovery: RecoverySection,
    pub(crate) log: LogSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct LocksSection {
    pub(crate) acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct ExecutorSection {
    pub(crate) step_timeout_ms: Option<u64>,
    pub(crate) compensation_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct CompensationSection {
    /// Total invocations per compensation, the first one included.
    pub(crate) max_attempts: Option<u32>,
    pub(crate) strategy: Option<BackoffStrategy>,
    pub(crate) base_delay_ms: Option<u64>,
    pub(crate) max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct PartitionSection {
    pub(crate) probe_interval_ms: Option<u64>,
    pub(crate) probe_timeout_ms: Option<u64>,
    pub(crate) staleness_window_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct RecoverySection {
    pub(crate) interval_ms: Option<u64>,
    pub(crate) max_attempts: Option<u32>,
    pub(crate) stale_age_hours: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LogSection {
    pub(crate) path: Option<PathBuf>,
}
