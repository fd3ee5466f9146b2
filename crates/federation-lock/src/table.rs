use std::sync::Arc;

use dashmap::DashMap;
use federation_core::TransactionId;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::coordinator::LockKey;

/// Per-key mutex; the guarded value is the current holder.
pub(crate) type Slot = Arc<Mutex<Option<TransactionId>>>;
pub(crate) type SlotGuard = OwnedMutexGuard<Option<TransactionId>>;

/// Lock table sharded by key.
///
/// Unrelated keys never contend on a common mutex. A slot lives only while
/// someone holds or waits on it; the last one out removes it.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    slots: DashMap<LockKey, Slot>,
}

impl LockTable {
    pub(crate) fn slot(&self, key: &LockKey) -> Slot {
        Arc::clone(&self.slots.entry(key.clone()).or_default())
    }

    /// Drops the slot for `key` if nobody holds or waits on it.
    ///
    /// The strong count is checked under the shard lock, the same lock
    /// `slot()` clones under, so a concurrent waiter can't be orphaned.
    pub(crate) fn reclaim(&self, key: &LockKey) {
        self.slots
            .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }

    pub(crate) fn is_held(&self, key: &LockKey) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
