use chrono::{DateTime, Utc};
use federation_core::{TransactionId, TransactionRecord, TransactionState};

use crate::Result;
use crate::entry::LogEntry;

/// Durable storage for transaction records.
///
/// Every write is synchronous: when a method returns `Ok`, the change
/// survives a process crash. Writers for distinct transactions may run
/// concurrently.
pub trait TransactionLog: Send + Sync {
    /// Stores a freshly created record.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::AlreadyExists`](crate::LogError::AlreadyExists) for
    /// a known transaction id, or an error if the write can't be made durable.
    fn begin(&self, record: &TransactionRecord) -> Result<()>;

    /// Durably appends `entry` to the record of `transaction_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is unknown, already COMMITTED or
    /// COMPENSATED, or the write can't be made durable. Nothing is applied
    /// when an error is returned.
    fn append(&self, transaction_id: TransactionId, entry: LogEntry) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the log can't be read.
    fn load(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>>;

    /// Records left in PENDING or COMPENSATING, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log can't be read.
    fn load_incomplete(&self) -> Result<Vec<TransactionRecord>> {
        let mut records: Vec<_> = self
            .list(None)?
            .into_iter()
            .filter(|r| r.state.is_incomplete())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    /// All records, optionally restricted to one state, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log can't be read.
    fn list(&self, state: Option<TransactionState>) -> Result<Vec<TransactionRecord>>;

    /// Removes COMMITTED and COMPENSATED records last updated before
    /// `older_than`. FAILED records are kept for operators. Returns how many
    /// records were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log can't be rewritten.
    fn purge_terminal(&self, older_than: DateTime<Utc>) -> Result<usize>;
}

/// Whether `record` may be dropped by [`TransactionLog::purge_terminal`].
pub(crate) fn is_purgeable(record: &TransactionRecord, older_than: DateTime<Utc>) -> bool {
    record.state.is_sealed() && record.updated_at < older_than
}
