use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use federation_core::{TransactionId, TransactionRecord, TransactionState};

use crate::entry::LogEntry;
use crate::error::{LogError, Result};
use crate::log::{TransactionLog, is_purgeable};

/// Volatile log for tests and single-process embedding. Survives nothing.
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    records: RwLock<HashMap<TransactionId, TransactionRecord>>,
}

fn poisoned<T>(_: PoisonError<T>) -> LogError {
    LogError::Unavailable("lock poisoned".to_string())
}

impl InMemoryTransactionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionLog for InMemoryTransactionLog {
    fn begin(&self, record: &TransactionRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        if records.contains_key(&record.transaction_id) {
            return Err(LogError::AlreadyExists(record.transaction_id));
        }
        records.insert(record.transaction_id, record.clone());
        Ok(())
    }

    fn append(&self, transaction_id: TransactionId, entry: LogEntry) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        let record = records
            .get_mut(&transaction_id)
            .ok_or(LogError::NotFound(transaction_id))?;
        entry.apply(record, Utc::now())
    }

    fn load(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&transaction_id).cloned())
    }

    fn list(&self, state: Option<TransactionState>) -> Result<Vec<TransactionRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut out: Vec<_> = records
            .values()
            .filter(|r| state.is_none_or(|s| r.state == s))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    fn purge_terminal(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().map_err(poisoned)?;
        let before = records.len();
        records.retain(|_, r| !is_purgeable(r, older_than));
        Ok(before - records.len())
    }
}
