use std::time::Duration;

use federation_core::{EntityKey, StoreRef};
use thiserror::Error;

/// Lock acquisition failures. No forward action has run when these surface,
/// so the transaction aborts without compensation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for lock on {entity_key} in {store}")]
    Timeout {
        store: StoreRef,
        entity_key: EntityKey,
        waited: Duration,
    },

    #[error("lock on {entity_key} in {store} is held by another transaction")]
    Conflict {
        store: StoreRef,
        entity_key: EntityKey,
    },
}
