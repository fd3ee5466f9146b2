use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use federation_core::StoreRef;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::ProbeError;
use crate::probe::HealthProbe;

#[derive(Debug, Default)]
struct HealthState {
    last_success: Option<Instant>,
    /// Outcome of the most recent probe. A failure always wins over an older
    /// success, however fresh that success is.
    last_ok: bool,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl HealthState {
    fn is_reachable(&self, staleness_window: Duration) -> bool {
        self.last_ok
            && self
                .last_success
                .is_some_and(|at| at.elapsed() <= staleness_window)
    }
}

/// Point-in-time health of one store, for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHealth {
    pub store: StoreRef,
    pub reachable: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub since_last_success: Option<Duration>,
}

/// Tracks reachability of every registered store.
///
/// Stores without a registered probe, or whose last successful probe has
/// aged out of the staleness window, are never reported reachable.
pub struct PartitionMonitor {
    probes: DashMap<StoreRef, Arc<dyn HealthProbe>>,
    health: DashMap<StoreRef, HealthState>,
    config: MonitorConfig,
}

impl Default for PartitionMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl std::fmt::Debug for PartitionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionMonitor")
            .field("stores", &self.probes.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PartitionMonitor {
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            probes: DashMap::new(),
            health: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn register(&self, store: StoreRef, probe: Arc<dyn HealthProbe>) {
        debug!(store = %store, "registered health probe");
        self.probes.insert(store, probe);
    }

    pub fn deregister(&self, store: &StoreRef) {
        self.probes.remove(store);
        self.health.remove(store);
    }

    /// Cached reachability. Never probes.
    #[must_use]
    pub fn is_reachable(&self, store: &StoreRef) -> bool {
        self.health
            .get(store)
            .is_some_and(|state| state.is_reachable(self.config.staleness_window()))
    }

    /// Reachability as the executor needs it: the cached answer when it is
    /// fresh, otherwise a probe made right now.
    pub async fn check(&self, store: &StoreRef) -> bool {
        if self.is_reachable(store) {
            return true;
        }
        self.probe(store).await.is_ok()
    }

    /// Probes `store` once, bounded by the configured probe timeout, and
    /// records the outcome.
    ///
    /// # Errors
    ///
    /// Returns the probe's error, [`ProbeError::Timeout`] when it does not
    /// answer in time, or [`ProbeError::NotRegistered`].
    pub async fn probe(&self, store: &StoreRef) -> Result<(), ProbeError> {
        let Some(probe) = self.probes.get(store).map(|p| Arc::clone(p.value())) else {
            return Err(ProbeError::NotRegistered);
        };

        let timeout = self.config.probe_timeout();
        let result = match tokio::time::timeout(timeout, probe.ping()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };
        self.record(store, &result);
        result
    }

    /// Probes every registered store; returns how many are unreachable.
    pub async fn probe_all(&self) -> usize {
        let stores: Vec<StoreRef> = self.probes.iter().map(|e| e.key().clone()).collect();
        let mut unreachable = 0;
        for store in &stores {
            if self.probe(store).await.is_err() {
                unreachable += 1;
            }
        }
        unreachable
    }

    fn record(&self, store: &StoreRef, result: &Result<(), ProbeError>) {
        let mut state = self.health.entry(store.clone()).or_default();
        match result {
            Ok(()) => {
                if state.consecutive_failures > 0 {
                    info!(
                        store = %store,
                        failures = state.consecutive_failures,
                        "store reachable again"
                    );
                }
                state.last_success = Some(Instant::now());
                state.last_ok = true;
                state.consecutive_failures = 0;
                state.last_error = None;
            }
            Err(err) => {
                if state.last_ok {
                    warn!(store = %store, error = %err, "store became unreachable");
                }
                state.last_ok = false;
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_error = Some(err.to_string());
            }
        }
    }

    /// Health of every registered store, ordered by store.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StoreHealth> {
        let window = self.config.staleness_window();
        let mut out: Vec<StoreHealth> = self
            .probes
            .iter()
            .map(|entry| {
                let store = entry.key().clone();
                match self.health.get(&store) {
                    Some(state) => StoreHealth {
                        reachable: state.is_reachable(window),
                        consecutive_failures: state.consecutive_failures,
                        last_error: state.last_error.clone(),
                        since_last_success: state.last_success.map(|at| at.elapsed()),
                        store,
                    },
                    None => StoreHealth {
                        store,
                        reachable: false,
                        consecutive_failures: 0,
                        last_error: None,
                        since_last_success: None,
                    },
                }
            })
            .collect();
        out.sort_by(|a, b| a.store.cmp(&b.store));
        out
    }

    /// Probes all stores every `probe_interval` until `shutdown` flips to
    /// `true` or its sender is dropped.
    pub fn spawn_heartbeat(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.probe_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let unreachable = monitor.probe_all().await;
                        if unreachable > 0 {
                            debug!(unreachable, "heartbeat found unreachable stores");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("partition heartbeat stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToggleProbe;

    fn monitor_with(store: &StoreRef, probe: &Arc<ToggleProbe>) -> PartitionMonitor {
        let monitor = PartitionMonitor::default();
        monitor.register(store.clone(), Arc::clone(probe) as Arc<dyn HealthProbe>);
        monitor
    }

    #[tokio::test]
    async fn unknown_store_is_unreachable() {
        let monitor = PartitionMonitor::default();
        let store = StoreRef::local("orders");

        assert!(!monitor.is_reachable(&store));
        assert!(!monitor.check(&store).await);
        assert_eq!(monitor.probe(&store).await, Err(ProbeError::NotRegistered));
    }

    #[tokio::test]
    async fn registered_store_is_unreachable_until_probed() {
        let store = StoreRef::local("orders");
        let probe = Arc::new(ToggleProbe::up());
        let monitor = monitor_with(&store, &probe);

        assert!(!monitor.is_reachable(&store));
        assert!(monitor.check(&store).await);
        assert!(monitor.is_reachable(&store));
        assert_eq!(probe.pings(), 1);
    }

    #[tokio::test]
    async fn fresh_answer_is_served_from_cache() {
        let store = StoreRef::local("orders");
        let probe = Arc::new(ToggleProbe::up());
        let monitor = monitor_with(&store, &probe);

        monitor.probe(&store).await.expect("up");
        assert!(monitor.check(&store).await);
        assert!(monitor.check(&store).await);

        assert_eq!(probe.pings(), 1);
    }

    #[tokio::test]
    async fn failure_overrides_recent_success() {
        let store = StoreRef::subgraph("users");
        let probe = Arc::new(ToggleProbe::up());
        let monitor = monitor_with(&store, &probe);
        monitor.probe(&store).await.expect("up");

        probe.set_up(false);
        let err = monitor.probe(&store).await.expect_err("down");

        assert!(matches!(err, ProbeError::Unreachable(_)));
        assert!(!monitor.is_reachable(&store));
    }

    #[tokio::test(start_paused = true)]
    async fn success_goes_stale_after_window() {
        let store = StoreRef::local("orders");
        let probe = Arc::new(ToggleProbe::up());
        let monitor = monitor_with(&store, &probe);
        monitor.probe(&store).await.expect("up");

        tokio::time::advance(Duration::from_secs(4)).await;

        assert!(!monitor.is_reachable(&store));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_times_out() {
        let store = StoreRef::local("orders");
        let probe = Arc::new(ToggleProbe::up());
        probe.set_hang(true);
        let monitor = monitor_with(&store, &probe);

        let err = monitor.probe(&store).await.expect_err("hangs");

        assert_eq!(err, ProbeError::Timeout(Duration::from_millis(500)));
        assert!(!monitor.is_reachable(&store));
    }

    #[tokio::test]
    async fn snapshot_counts_consecutive_failures() {
        let store = StoreRef::local("orders");
        let probe = Arc::new(ToggleProbe::down());
        let monitor = monitor_with(&store, &probe);

        let _ = monitor.probe(&store).await;
        let _ = monitor.probe(&store).await;
        let snapshot = monitor.snapshot();

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].reachable);
        assert_eq!(snapshot[0].consecutive_failures, 2);
        assert!(snapshot[0].last_error.is_some());
        assert_eq!(snapshot[0].since_last_success, None);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_tracks_store_until_shutdown() {
        let store = StoreRef::local("orders");
        let probe = Arc::new(ToggleProbe::up());
        let monitor = Arc::new(monitor_with(&store, &probe));
        let (tx, rx) = watch::channel(false);

        let heartbeat = monitor.spawn_heartbeat(rx);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(monitor.is_reachable(&store));

        probe.set_up(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!monitor.is_reachable(&store));

        probe.set_up(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(monitor.is_reachable(&store));

        tx.send(true).expect("heartbeat listening");
        heartbeat.await.expect("heartbeat exits cleanly");
        let pings = probe.pings();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.pings(), pings);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_when_sender_is_dropped() {
        let monitor = Arc::new(PartitionMonitor::default());
        let (tx, rx) = watch::channel(false);

        let heartbeat = monitor.spawn_heartbeat(rx);
        drop(tx);

        heartbeat.await.expect("heartbeat exits cleanly");
    }
}
