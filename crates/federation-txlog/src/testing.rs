//! Fault injection for code built on [`TransactionLog`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use federation_core::{TransactionId, TransactionRecord, TransactionState};

use crate::entry::LogEntry;
use crate::error::{LogError, Result};
use crate::log::TransactionLog;

/// Wraps a log and starts refusing appends after a fixed number succeed.
///
/// Refused appends leave the inner log untouched, which is what a crash
/// right before the write looks like from the outside.
pub struct FlakyLog {
    inner: Arc<dyn TransactionLog>,
    remaining: AtomicUsize,
}

impl FlakyLog {
    #[must_use]
    pub fn new(inner: Arc<dyn TransactionLog>, appends_before_failure: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(appends_before_failure),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<dyn TransactionLog> {
        &self.inner
    }
}

impl std::fmt::Debug for FlakyLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyLog")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl TransactionLog for FlakyLog {
    fn begin(&self, record: &TransactionRecord) -> Result<()> {
        self.inner.begin(record)
    }

    fn append(&self, transaction_id: TransactionId, entry: LogEntry) -> Result<()> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(LogError::Unavailable("injected append failure".to_string()));
        }
        self.inner.append(transaction_id, entry)
    }

    fn load(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        self.inner.load(transaction_id)
    }

    fn list(&self, state: Option<TransactionState>) -> Result<Vec<TransactionRecord>> {
        self.inner.list(state)
    }

    fn purge_terminal(&self, older_than: DateTime<Utc>) -> Result<usize> {
        self.inner.purge_terminal(older_than)
    }
}
