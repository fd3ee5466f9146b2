use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::recovery::RecoveryManager;

/// Periodic recovery and cleanup, run until shutdown.
pub struct RecoveryLoop;

impl RecoveryLoop {
    /// Runs a recovery pass and a stale-record cleanup every `interval` of
    /// the manager's config, starting one interval from now. A failing pass
    /// is logged and the loop carries on.
    #[must_use]
    pub fn spawn(
        manager: Arc<RecoveryManager>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = manager.config().interval();
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = manager.recover_incomplete().await {
                            error!(error = %err, "recovery pass failed");
                        }
                        if let Err(err) = manager.cleanup_stale() {
                            error!(error = %err, "stale record cleanup failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("recovery loop stopped");
        })
    }
}
