use std::time::Duration;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    probe_interval: Duration,
    probe_timeout: Duration,
    staleness_window: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            staleness_window: DEFAULT_STALENESS_WINDOW,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn new(probe_interval: Duration, probe_timeout: Duration, staleness_window: Duration) -> Self {
        Self {
            probe_interval,
            probe_timeout,
            staleness_window,
        }
    }

    /// How often the heartbeat probes every registered store.
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        self.probe_interval
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// How long a successful probe keeps a store reachable.
    #[must_use]
    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }
}
