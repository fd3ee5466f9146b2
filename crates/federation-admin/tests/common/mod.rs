use std::path::{Path, PathBuf};

use federation_core::{StepOutcome, StoreRef, TransactionId, TransactionRecord, TransactionState};
use federation_saga::testing::write_step;
use federation_txlog::{FileTransactionLog, LogEntry, TransactionLog};
use serde_json::json;
use tempfile::TempDir;

pub struct LogFixture {
    pub dir: TempDir,
    pub committed: TransactionId,
    pub pending: TransactionId,
    pub failed: TransactionId,
}

impl LogFixture {
    pub fn path(&self) -> PathBuf {
        log_path(self.dir.path())
    }
}

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join("tx.log")
}

fn two_steps(id: TransactionId) -> TransactionRecord {
    TransactionRecord::new(
        id,
        vec![
            write_step(0, StoreRef::subgraph("orders"), "Order", "o-1"),
            write_step(1, StoreRef::subgraph("users"), "User", "u-1"),
        ],
    )
}

fn succeed(log: &dyn TransactionLog, id: TransactionId, step_index: usize) {
    log.append(id, LogEntry::StepStarted { step_index })
        .expect("append");
    log.append(
        id,
        LogEntry::StepRecorded {
            outcome: StepOutcome::succeeded(step_index, json!({ "ok": true })),
        },
    )
    .expect("append");
}

/// A log holding one committed, one pending, and one failed transaction.
pub fn populated_log() -> LogFixture {
    let dir = TempDir::new().expect("create temp dir");
    let log = FileTransactionLog::open(log_path(dir.path())).expect("open log");

    let committed = TransactionId::new();
    log.begin(&two_steps(committed)).expect("begin");
    succeed(&log, committed, 0);
    succeed(&log, committed, 1);
    log.append(committed, LogEntry::state(TransactionState::Committed))
        .expect("append");

    let pending = TransactionId::new();
    log.begin(&two_steps(pending)).expect("begin");
    succeed(&log, pending, 0);

    let failed = TransactionId::new();
    log.begin(&two_steps(failed)).expect("begin");
    succeed(&log, failed, 0);
    log.append(
        failed,
        LogEntry::StateChanged {
            state: TransactionState::Failed,
            error: Some("compensation of step 0 exhausted".to_string()),
        },
    )
    .expect("append");

    LogFixture {
        dir,
        committed,
        pending,
        failed,
    }
}
