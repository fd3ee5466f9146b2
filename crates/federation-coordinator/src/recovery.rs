use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use federation_core::{ErrorKind, TransactionId};
use federation_saga::{SagaError, SagaExecutor};
use tracing::{debug, error, info, warn};

use crate::config::RecoveryConfig;
use crate::error::Result;

/// Running totals across every recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryMetrics {
    /// Transactions driven to COMMITTED, COMPENSATED or FAILED by recovery.
    pub sagas_recovered: u64,
    pub recovery_attempts: u64,
    /// Attempts that ended FAILED, errored, or were given up on.
    pub failed_recoveries: u64,
    pub sagas_cleaned_up: u64,
    pub last_recovery_at: Option<DateTime<Utc>>,
}

/// What one recovery pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub committed: usize,
    pub compensated: usize,
    /// Compensation exhausted its retries; left FAILED for an operator.
    pub failed: usize,
    /// Still incomplete: a store is unreachable or the locks are busy.
    pub deferred: usize,
    pub errors: usize,
    /// Over the per-transaction attempt limit; not re-driven.
    pub abandoned: usize,
}

impl RecoveryReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.committed + self.compensated + self.failed + self.deferred + self.errors + self.abandoned
    }
}

enum Resumed {
    Committed,
    Compensated,
    Failed,
    Deferred,
    Error,
}

fn classify(result: &std::result::Result<serde_json::Value, SagaError>) -> Resumed {
    let Err(err) = result else {
        return Resumed::Committed;
    };
    if err.awaits_recovery() {
        return Resumed::Deferred;
    }
    match err.kind() {
        ErrorKind::StepExecution | ErrorKind::PartitionDetected => Resumed::Compensated,
        ErrorKind::CompensationFailed => Resumed::Failed,
        ErrorKind::CompensationBlocked | ErrorKind::LockTimeout | ErrorKind::LockConflict => {
            Resumed::Deferred
        }
        ErrorKind::TransactionLog | ErrorKind::Resolution => Resumed::Error,
    }
}

/// Finds transactions a crash left PENDING or COMPENSATING and re-drives
/// them through the executor.
pub struct RecoveryManager {
    executor: Arc<SagaExecutor>,
    config: RecoveryConfig,
    metrics: Mutex<RecoveryMetrics>,
    attempts: Mutex<HashMap<TransactionId, u32>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for RecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("config", &self.config)
            .field("metrics", &*lock(&self.metrics))
            .finish_non_exhaustive()
    }
}

impl RecoveryManager {
    #[must_use]
    pub fn new(executor: Arc<SagaExecutor>, config: RecoveryConfig) -> Self {
        Self {
            executor,
            config,
            metrics: Mutex::new(RecoveryMetrics::default()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> RecoveryMetrics {
        lock(&self.metrics).clone()
    }

    /// How many times recovery has re-driven `transaction_id` without
    /// finishing it.
    #[must_use]
    pub fn attempts_for(&self, transaction_id: TransactionId) -> u32 {
        lock(&self.attempts)
            .get(&transaction_id)
            .copied()
            .unwrap_or(0)
    }

    /// Re-drives every incomplete transaction in the log, oldest first.
    ///
    /// Steps already recorded as succeeded or compensated are never invoked
    /// again. A transaction that stays incomplete is retried on the next
    /// pass, up to the configured attempt limit.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Log`](crate::CoordinatorError::Log) if the
    /// log can't be read. Failures of individual transactions are counted in
    /// the report instead.
    pub async fn recover_incomplete(&self) -> Result<RecoveryReport> {
        let records = self.executor.log().load_incomplete()?;
        let mut report = RecoveryReport::default();
        lock(&self.metrics).last_recovery_at = Some(Utc::now());

        if records.is_empty() {
            debug!("no incomplete transactions");
            return Ok(report);
        }
        info!(count = records.len(), "recovering incomplete transactions");

        for record in records {
            let transaction_id = record.transaction_id;
            let attempt = {
                let mut attempts = lock(&self.attempts);
                let count = attempts.entry(transaction_id).or_insert(0);
                *count += 1;
                *count
            };
            if attempt > self.config.max_attempts() {
                if attempt == self.config.max_attempts() + 1 {
                    error!(
                        transaction_id = %transaction_id,
                        state = %record.state,
                        attempts = self.config.max_attempts(),
                        alert = true,
                        "giving up on recovering transaction; needs an operator"
                    );
                    lock(&self.metrics).failed_recoveries += 1;
                }
                report.abandoned += 1;
                continue;
            }

            let result = self.executor.resume(record).await;
            lock(&self.metrics).recovery_attempts += 1;

            let finished = match classify(&result) {
                Resumed::Committed => {
                    report.committed += 1;
                    true
                }
                Resumed::Compensated => {
                    report.compensated += 1;
                    true
                }
                Resumed::Failed => {
                    report.failed += 1;
                    lock(&self.metrics).failed_recoveries += 1;
                    true
                }
                Resumed::Deferred => {
                    report.deferred += 1;
                    false
                }
                Resumed::Error => {
                    report.errors += 1;
                    lock(&self.metrics).failed_recoveries += 1;
                    false
                }
            };

            if finished {
                lock(&self.attempts).remove(&transaction_id);
                lock(&self.metrics).sagas_recovered += 1;
            } else if let Err(err) = &result {
                warn!(
                    transaction_id = %transaction_id,
                    attempt,
                    error = %err.describe(),
                    "transaction still incomplete after recovery attempt"
                );
            }
        }

        info!(
            committed = report.committed,
            compensated = report.compensated,
            failed = report.failed,
            deferred = report.deferred,
            errors = report.errors,
            abandoned = report.abandoned,
            "recovery pass finished"
        );
        Ok(report)
    }

    /// Purges COMMITTED and COMPENSATED records older than the configured
    /// stale age. FAILED records are kept for operators.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Log`](crate::CoordinatorError::Log) if the
    /// log can't be compacted.
    pub fn cleanup_stale(&self) -> Result<usize> {
        let stale_age = chrono::Duration::from_std(self.config.stale_age())
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(stale_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let purged = self.executor.log().purge_terminal(cutoff)?;
        if purged > 0 {
            info!(purged, "purged stale transaction records");
            lock(&self.metrics).sagas_cleaned_up += u64::try_from(purged).unwrap_or(u64::MAX);
        }
        Ok(purged)
    }
}
