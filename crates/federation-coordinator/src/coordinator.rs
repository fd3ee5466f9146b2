use std::sync::Arc;

use federation_core::{ErrorKind, MutationResult, TransactionId};
use federation_resolver::{FederationMap, MutationRequest, resolve};
use federation_saga::{SagaExecutor, StoreRegistry};
use federation_txlog::TransactionLog;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::background::RecoveryLoop;
use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::recovery::{RecoveryManager, RecoveryReport};

/// Entry point for the mutation execution layer.
///
/// Each call to [`execute_mutation`](Self::execute_mutation) resolves the
/// request, runs it as one saga, and blocks until the transaction is
/// committed, rolled back, or left for recovery.
#[derive(Debug)]
pub struct TransactionCoordinator {
    executor: Arc<SagaExecutor>,
    recovery: Arc<RecoveryManager>,
}

impl TransactionCoordinator {
    #[must_use]
    pub fn new(config: &CoordinatorConfig, executor: SagaExecutor) -> Self {
        let executor = Arc::new(executor);
        let recovery = Arc::new(RecoveryManager::new(
            Arc::clone(&executor),
            *config.recovery(),
        ));
        Self { executor, recovery }
    }

    /// A coordinator whose executor is built from `config`.
    #[must_use]
    pub fn from_config(
        config: &CoordinatorConfig,
        registry: StoreRegistry,
        log: Arc<dyn TransactionLog>,
    ) -> Self {
        Self::new(config, config.build_executor(registry, log))
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<SagaExecutor> {
        &self.executor
    }

    #[must_use]
    pub fn recovery(&self) -> &Arc<RecoveryManager> {
        &self.recovery
    }

    pub async fn execute_mutation(
        &self,
        request: &MutationRequest,
        map: &FederationMap,
    ) -> MutationResult {
        let steps = match resolve(request, map) {
            Ok(steps) => steps,
            Err(err) => {
                debug!(error = %err, "mutation rejected during resolution");
                return MutationResult::failure(ErrorKind::Resolution, err.to_string(), None);
            }
        };

        let transaction_id = TransactionId::new();
        match self.executor.execute(transaction_id, steps).await {
            Ok(data) => MutationResult::success(data),
            Err(err) => {
                let kind = err.kind();
                // Lock and validation failures happen before any record exists.
                let recorded = !matches!(
                    kind,
                    ErrorKind::Resolution | ErrorKind::LockTimeout | ErrorKind::LockConflict
                );
                if kind.is_incident() {
                    warn!(
                        transaction_id = %transaction_id,
                        kind = %kind,
                        "mutation failed and needs operator attention"
                    );
                }
                MutationResult::failure(kind, err.describe(), recorded.then_some(transaction_id))
            }
        }
    }

    /// Re-drives every transaction a previous process left incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Log`](crate::CoordinatorError::Log) if the
    /// log can't be read.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        self.recovery.recover_incomplete().await
    }

    /// Probes every store, recovers incomplete transactions, then starts the
    /// partition heartbeat and the periodic recovery loop.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Log`](crate::CoordinatorError::Log) if
    /// startup recovery can't read the log. Nothing is spawned in that case.
    pub async fn start(&self) -> Result<CoordinatorHandle> {
        let unreachable = self.executor.monitor().probe_all().await;
        let report = self.recover().await?;
        info!(
            unreachable_stores = unreachable,
            recovered = report.total(),
            "coordinator started"
        );

        let (shutdown, signal) = watch::channel(false);
        let heartbeat = self.executor.monitor().spawn_heartbeat(signal.clone());
        let recovery = RecoveryLoop::spawn(Arc::clone(&self.recovery), signal);

        Ok(CoordinatorHandle {
            startup: report,
            shutdown,
            heartbeat,
            recovery,
        })
    }
}

/// Owns the coordinator's background tasks.
#[derive(Debug)]
pub struct CoordinatorHandle {
    startup: RecoveryReport,
    shutdown: watch::Sender<bool>,
    heartbeat: JoinHandle<()>,
    recovery: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// What startup recovery did.
    #[must_use]
    pub fn startup_report(&self) -> &RecoveryReport {
        &self.startup
    }

    /// Stops the heartbeat and recovery loop and waits for both. A recovery
    /// pass already running finishes first.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Join`](crate::CoordinatorError::Join) if
    /// either task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.heartbeat.await?;
        self.recovery.await?;
        info!("coordinator stopped");
        Ok(())
    }
}
