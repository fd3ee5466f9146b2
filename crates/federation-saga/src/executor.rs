use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use federation_core::{
    Action, StepDescriptor, StepOutcome, StepStatus, TransactionId, TransactionRecord,
    TransactionState,
};
use federation_lock::{LockCoordinator, LockSet};
use federation_partition::PartitionMonitor;
use federation_txlog::{LogEntry, TransactionLog};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{ActionError, StepContext};
use crate::alert::{AlertSink, CompensationAlert, TracingAlertSink};
use crate::audit::SagaAuditLog;
use crate::config::ExecutorConfig;
use crate::error::{CompensationError, SagaError};
use crate::registry::StoreRegistry;

/// How one step's compensation ended.
enum Compensation {
    Done { attempts: u32 },
    Blocked { attempts: u32 },
    Exhausted { attempts: u32, error: ActionError },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs federated transactions as sagas.
///
/// A transaction's entity locks are held from before the record is created
/// until it reaches COMMITTED, COMPENSATED or FAILED. A run that leaves the
/// record PENDING or COMPENSATING keeps its locks parked in the executor, and
/// the resume that finishes the record releases them. Every state change is
/// appended to the transaction log before the next action is invoked.
pub struct SagaExecutor {
    registry: StoreRegistry,
    locks: LockCoordinator,
    monitor: Arc<PartitionMonitor>,
    log: Arc<dyn TransactionLog>,
    alerts: Arc<dyn AlertSink>,
    config: ExecutorConfig,
    parked: Mutex<HashMap<TransactionId, LockSet>>,
}

impl std::fmt::Debug for SagaExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaExecutor")
            .field("registry", &self.registry)
            .field("locks", &self.locks)
            .field("monitor", &self.monitor)
            .field("config", &self.config)
            .field("parked", &lock(&self.parked).len())
            .finish_non_exhaustive()
    }
}

impl SagaExecutor {
    #[must_use]
    pub fn new(
        registry: StoreRegistry,
        log: Arc<dyn TransactionLog>,
        monitor: Arc<PartitionMonitor>,
    ) -> Self {
        Self {
            registry,
            locks: LockCoordinator::default(),
            monitor,
            log,
            alerts: Arc::new(TracingAlertSink),
            config: ExecutorConfig::default(),
            parked: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_locks(mut self, locks: LockCoordinator) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    #[must_use]
    pub fn log(&self) -> &Arc<dyn TransactionLog> {
        &self.log
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<PartitionMonitor> {
        &self.monitor
    }

    #[must_use]
    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Whether the locks of an unfinished transaction are held here, waiting
    /// for a resume.
    #[must_use]
    pub fn holds_locks_for(&self, transaction_id: TransactionId) -> bool {
        lock(&self.parked).contains_key(&transaction_id)
    }

    /// Runs `steps` as one transaction and returns the merged result
    /// payloads, keyed by each step's response key.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Lock` if the entity locks can't be taken (no
    /// record is created), `StepFailed` or `PartitionDetected` once every
    /// earlier step has been compensated, `CompensationBlocked` when an
    /// unreachable store stops the rollback, `CompensationFailed` when a
    /// compensation exhausts its retries, and `Log` if a write to the
    /// transaction log fails.
    pub async fn execute(
        &self,
        transaction_id: TransactionId,
        steps: Vec<StepDescriptor>,
    ) -> Result<Value, SagaError> {
        let (result, _audit) = self.execute_with_audit(transaction_id, steps).await;
        result
    }

    /// Like [`execute`](Self::execute), also returning what happened to each
    /// step during this run.
    pub async fn execute_with_audit(
        &self,
        transaction_id: TransactionId,
        steps: Vec<StepDescriptor>,
    ) -> (Result<Value, SagaError>, SagaAuditLog) {
        let mut audit = SagaAuditLog::new();
        let result = self.execute_internal(transaction_id, steps, &mut audit).await;
        (result, audit)
    }

    async fn execute_internal(
        &self,
        transaction_id: TransactionId,
        steps: Vec<StepDescriptor>,
        audit: &mut SagaAuditLog,
    ) -> Result<Value, SagaError> {
        StepDescriptor::validate_sequence(&steps)?;
        for step in &steps {
            self.registry.adapter_for(&step.target_store)?;
        }

        let mut locks = self.locks.acquire(transaction_id, &steps).await?;

        let mut record = TransactionRecord::new(transaction_id, steps);
        if let Err(err) = self.log.begin(&record) {
            locks.release();
            return Err(err.into());
        }
        info!(
            transaction_id = %transaction_id,
            steps = record.steps.len(),
            "transaction started"
        );

        let result = self.drive(&mut record, audit).await;
        self.settle_locks(&record, locks);
        result
    }

    /// Re-drives a record recovered from the transaction log: continues the
    /// forward phase at the first step without a recorded outcome, or resumes
    /// compensation at the latest uncompensated step. Steps already SUCCEEDED
    /// or compensated are never invoked again.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute).
    pub async fn resume(&self, record: TransactionRecord) -> Result<Value, SagaError> {
        let (result, _audit) = self.resume_with_audit(record).await;
        result
    }

    pub async fn resume_with_audit(
        &self,
        mut record: TransactionRecord,
    ) -> (Result<Value, SagaError>, SagaAuditLog) {
        let mut audit = SagaAuditLog::new();
        let result = self.resume_internal(&mut record, &mut audit).await;
        (result, audit)
    }

    async fn resume_internal(
        &self,
        record: &mut TransactionRecord,
        audit: &mut SagaAuditLog,
    ) -> Result<Value, SagaError> {
        if record.state.is_sealed() {
            return self.drive(record, audit).await;
        }
        for step in &record.descriptors {
            self.registry.adapter_for(&step.target_store)?;
        }

        info!(
            transaction_id = %record.transaction_id,
            state = %record.state,
            in_flight = ?record.in_flight,
            "resuming transaction"
        );
        let resumed_from = record.state;
        let parked = lock(&self.parked).remove(&record.transaction_id);
        let locks = match parked {
            Some(locks) => locks,
            None => {
                self.locks
                    .acquire(record.transaction_id, &record.descriptors)
                    .await?
            }
        };

        // The owner may have finished the transaction while we waited on
        // its locks.
        let result = match self.log.load(record.transaction_id) {
            Ok(Some(latest)) => {
                *record = latest;
                if resumed_from.is_incomplete() && record.state == TransactionState::Failed {
                    debug!(
                        transaction_id = %record.transaction_id,
                        "transaction failed while waiting for its locks"
                    );
                    Err(recorded_compensation_failure(record))
                } else {
                    self.drive(record, audit).await
                }
            }
            Ok(None) => self.drive(record, audit).await,
            Err(err) => Err(err.into()),
        };
        self.settle_locks(record, locks);
        result
    }

    /// Releases `locks` once the record is finished, otherwise parks them
    /// until a resume finishes it.
    fn settle_locks(&self, record: &TransactionRecord, mut locks: LockSet) {
        if record.state.is_incomplete() {
            debug!(
                transaction_id = %record.transaction_id,
                state = %record.state,
                "holding entity locks until recovery finishes the transaction"
            );
            lock(&self.parked).insert(record.transaction_id, locks);
        } else {
            locks.release();
        }
    }

    async fn drive(
        &self,
        record: &mut TransactionRecord,
        audit: &mut SagaAuditLog,
    ) -> Result<Value, SagaError> {
        let failure = match record.state {
            TransactionState::Committed => return Ok(record.merged_payload()),
            TransactionState::Compensated => return Err(recorded_failure(record)),
            TransactionState::Pending => {
                let Some(failure) = self.run_forward(record, audit).await? else {
                    self.apply(record, LogEntry::state(TransactionState::Committed))?;
                    info!(transaction_id = %record.transaction_id, "transaction committed");
                    return Ok(record.merged_payload());
                };
                self.apply(
                    record,
                    LogEntry::StateChanged {
                        state: TransactionState::Compensating,
                        error: Some(failure.describe()),
                    },
                )?;
                failure
            }
            TransactionState::Compensating => recorded_failure(record),
            TransactionState::Failed => {
                self.apply(record, LogEntry::state(TransactionState::Compensating))?;
                recorded_failure(record)
            }
        };

        let outcome = self.run_compensation(record, audit, failure).await;
        Err(outcome.unwrap_or_else(|err| err))
    }

    /// Runs forward actions until one fails or none remain. Returns the
    /// failure that ends the forward phase, if any.
    async fn run_forward(
        &self,
        record: &mut TransactionRecord,
        audit: &mut SagaAuditLog,
    ) -> Result<Option<SagaError>, SagaError> {
        if record.forward_failure().is_some() {
            return Ok(Some(recorded_failure(record)));
        }

        while let Some(index) = record.next_forward_step() {
            let step = record.descriptors[index].clone();
            let store = &step.target_store;

            if !self.monitor.check(store).await {
                // Its effect may have landed; only the store can tell.
                if record.in_flight == Some(index) {
                    warn!(
                        transaction_id = %record.transaction_id,
                        step_index = index,
                        store = %store,
                        "store unreachable; step outcome still in doubt"
                    );
                    return Err(SagaError::StepInDoubt {
                        transaction_id: record.transaction_id,
                        step_index: index,
                        store: store.clone(),
                    });
                }
                warn!(
                    transaction_id = %record.transaction_id,
                    step_index = index,
                    store = %store,
                    "store unreachable; refusing step"
                );
                self.apply(
                    record,
                    LogEntry::StepRecorded {
                        outcome: StepOutcome::refused(index, format!("store {store} is unreachable")),
                    },
                )?;
                audit.record_refused(&step);
                return Ok(Some(SagaError::PartitionDetected {
                    step_index: index,
                    store: store.clone(),
                }));
            }

            let attempt = if record.in_flight == Some(index) { 2 } else { 1 };
            self.apply(record, LogEntry::StepStarted { step_index: index })?;
            audit.record_start(&step);

            let ctx = StepContext::new(record.transaction_id, index, attempt);
            let adapter = self.registry.adapter_for(store)?;
            let timeout = self.config.step_timeout();
            let result =
                match tokio::time::timeout(timeout, adapter.execute(store, &step.forward_action, &ctx))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ActionError::Timeout(timeout)),
                };

            match result {
                Ok(payload) => {
                    self.apply(
                        record,
                        LogEntry::StepRecorded {
                            outcome: StepOutcome::succeeded(index, payload),
                        },
                    )?;
                    audit.record_success(&step);
                    debug!(
                        transaction_id = %record.transaction_id,
                        step_index = index,
                        operation = %step.forward_action.operation,
                        store = %store,
                        "step succeeded"
                    );
                }
                Err(err) => {
                    warn!(
                        transaction_id = %record.transaction_id,
                        step_index = index,
                        store = %store,
                        error = %err,
                        "step failed"
                    );
                    self.apply(
                        record,
                        LogEntry::StepRecorded {
                            outcome: StepOutcome::failed(index, err.to_string()),
                        },
                    )?;
                    audit.record_failure(&step);
                    return Ok(Some(SagaError::StepFailed {
                        step_index: index,
                        store: store.clone(),
                        source: err,
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Compensates every succeeded step, latest first. `Ok` carries the error
    /// to hand back to the caller; `Err` means the log itself failed.
    async fn run_compensation(
        &self,
        record: &mut TransactionRecord,
        audit: &mut SagaAuditLog,
        failure: SagaError,
    ) -> Result<SagaError, SagaError> {
        let transaction_id = record.transaction_id;
        let mut failures = Vec::new();

        for index in record.pending_compensations() {
            let step = record.descriptors[index].clone();
            let Some(action) = step.compensating_action.clone() else {
                self.apply(
                    record,
                    LogEntry::CompensationRecorded {
                        step_index: index,
                        attempts: 0,
                    },
                )?;
                audit.record_compensated(&step, 0);
                continue;
            };

            match self.compensate_step(record, &step, &action).await? {
                Compensation::Done { attempts } => {
                    self.apply(
                        record,
                        LogEntry::CompensationRecorded {
                            step_index: index,
                            attempts,
                        },
                    )?;
                    audit.record_compensated(&step, attempts);
                    debug!(
                        transaction_id = %transaction_id,
                        step_index = index,
                        operation = %action.operation,
                        attempts,
                        "step compensated"
                    );
                }
                Compensation::Blocked { attempts } => {
                    warn!(
                        transaction_id = %transaction_id,
                        step_index = index,
                        store = %step.target_store,
                        "compensation blocked by unreachable store; leaving for recovery"
                    );
                    self.apply(
                        record,
                        LogEntry::CompensationBlocked {
                            step_index: index,
                            reason: format!("store {} is unreachable", step.target_store),
                        },
                    )?;
                    audit.record_compensation_blocked(&step, attempts);
                    return Ok(SagaError::CompensationBlocked {
                        transaction_id,
                        step_index: index,
                        store: step.target_store,
                    });
                }
                Compensation::Exhausted { attempts, error } => {
                    self.apply(
                        record,
                        LogEntry::CompensationExhausted {
                            step_index: index,
                            attempts,
                            error: error.to_string(),
                        },
                    )?;
                    audit.record_compensation_failed(&step, attempts);
                    self.alerts.compensation_exhausted(&CompensationAlert {
                        transaction_id,
                        step_index: index,
                        store: step.target_store.clone(),
                        attempts,
                        error: error.to_string(),
                    });
                    failures.push(CompensationError {
                        step_index: index,
                        store: step.target_store,
                        description: action.operation,
                        attempts,
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            self.apply(record, LogEntry::state(TransactionState::Compensated))?;
            info!(transaction_id = %transaction_id, "transaction compensated");
            return Ok(failure);
        }

        self.apply(
            record,
            LogEntry::StateChanged {
                state: TransactionState::Failed,
                error: Some(format!(
                    "{} compensation(s) exhausted their retries",
                    failures.len()
                )),
            },
        )?;
        Ok(SagaError::CompensationFailed {
            transaction_id,
            cause: failure.describe(),
            failures,
        })
    }

    /// Retries one compensation under the configured policy, re-checking the
    /// store's reachability before every attempt.
    async fn compensate_step(
        &self,
        record: &TransactionRecord,
        step: &StepDescriptor,
        action: &Action,
    ) -> Result<Compensation, SagaError> {
        let policy = *self.config.compensation_retry();
        let timeout = self.config.compensation_timeout();
        let store = &step.target_store;
        let adapter = self.registry.adapter_for(store)?;
        let outcome = &record.steps[step.step_index];
        let forward_result = outcome.result_payload.as_ref();
        let prior = outcome.compensation_attempts;

        let mut invoked = 0;
        let mut blocked = false;
        let mut last_error = None;

        for retry in 0..policy.max_attempts() {
            if retry > 0 {
                tokio::time::sleep(policy.delay_for(retry)).await;
            }
            if !self.monitor.check(store).await {
                blocked = true;
                debug!(
                    transaction_id = %record.transaction_id,
                    step_index = step.step_index,
                    store = %store,
                    retry,
                    "store unreachable before compensation attempt"
                );
                continue;
            }
            blocked = false;
            invoked += 1;

            let ctx = StepContext::new(record.transaction_id, step.step_index, prior + invoked);
            let result = match tokio::time::timeout(
                timeout,
                adapter.compensate(store, action, forward_result, &ctx),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ActionError::Timeout(timeout)),
            };

            match result {
                Ok(()) => {
                    return Ok(Compensation::Done {
                        attempts: prior + invoked,
                    });
                }
                Err(err) => {
                    warn!(
                        transaction_id = %record.transaction_id,
                        step_index = step.step_index,
                        attempt = prior + invoked,
                        error = %err,
                        "compensation attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        let attempts = prior + invoked;
        Ok(match last_error {
            Some(error) if !blocked => Compensation::Exhausted { attempts, error },
            _ => Compensation::Blocked { attempts },
        })
    }

    /// Durably logs `entry`, then folds it into the in-memory record.
    fn apply(&self, record: &mut TransactionRecord, entry: LogEntry) -> Result<(), SagaError> {
        self.log.append(record.transaction_id, entry.clone())?;
        entry.apply(record, Utc::now())?;
        Ok(())
    }
}

/// Rebuilds the error for a record already left FAILED.
fn recorded_compensation_failure(record: &TransactionRecord) -> SagaError {
    let error = record.last_error.clone().unwrap_or_default();
    let failures = record
        .steps
        .iter()
        .filter(|s| s.needs_compensation() && s.compensation_attempts > 0)
        .filter_map(|s| {
            let step = record.descriptors.get(s.step_index)?;
            Some(CompensationError {
                step_index: s.step_index,
                store: step.target_store.clone(),
                description: step
                    .compensating_action
                    .as_ref()
                    .map(|a| a.operation.clone())
                    .unwrap_or_default(),
                attempts: s.compensation_attempts,
                error: ActionError::Recorded(error.clone()),
            })
        })
        .collect();
    SagaError::CompensationFailed {
        transaction_id: record.transaction_id,
        cause: recorded_failure(record).describe(),
        failures,
    }
}

/// Rebuilds the error that ended the forward phase from a logged record.
fn recorded_failure(record: &TransactionRecord) -> SagaError {
    let failed = record.forward_failure().and_then(|outcome| {
        record
            .descriptors
            .get(outcome.step_index)
            .map(|d| (outcome, d.target_store.clone()))
    });
    let Some((outcome, store)) = failed else {
        return SagaError::Interrupted {
            transaction_id: record.transaction_id,
        };
    };

    match outcome.status {
        StepStatus::Failed => SagaError::StepFailed {
            step_index: outcome.step_index,
            store,
            source: ActionError::Recorded(outcome.error.clone().unwrap_or_default()),
        },
        StepStatus::NotAttempted | StepStatus::Succeeded => SagaError::PartitionDetected {
            step_index: outcome.step_index,
            store,
        },
    }
}
