//! Entity-level locking for federated transactions.
//!
//! Every `(store, entity)` pair a transaction touches is locked before its
//! first forward action runs. Pairs are always acquired in one global sorted
//! order, so two transactions with overlapping entity sets can never each hold
//! a piece the other is waiting for.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = LockCoordinator::new(LockConfig::default());
//! let mut locks = coordinator.acquire(transaction_id, &steps).await?;
//! // ... run the saga ...
//! coordinator.release(&mut locks);
//! ```

mod config;
mod coordinator;
mod error;
mod table;

pub use config::LockConfig;
pub use coordinator::{LockCoordinator, LockKey, LockSet, LockToken, acquisition_order};
pub use error::LockError;
