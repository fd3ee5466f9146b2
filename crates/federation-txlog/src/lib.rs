//! Durable record of in-flight and finished federated transactions.
//!
//! The executor appends one [`LogEntry`] per state change and waits for the
//! append to be acknowledged before it moves on. A [`TransactionRecord`] is
//! the fold of its entries, so replaying the log after a crash reproduces
//! exactly what the executor knew when it stopped.
//!
//! [`TransactionRecord`]: federation_core::TransactionRecord

mod entry;
mod error;
mod log;
pub mod providers;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use entry::LogEntry;
pub use error::{LogError, Result};
pub use log::TransactionLog;
pub use providers::{FileTransactionLog, InMemoryTransactionLog};
