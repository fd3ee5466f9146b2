use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use federation_core::{EntityKey, StepDescriptor, StoreRef, TransactionId};
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::LockError;
use crate::table::{LockTable, SlotGuard};

/// A lockable unit. Orders by store first, then entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey {
    pub store: StoreRef,
    pub entity: EntityKey,
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.entity)
    }
}

/// Proof that one entity lock is held on behalf of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub transaction_id: TransactionId,
    pub entity_key: EntityKey,
    pub store_ref: StoreRef,
    pub acquired_at: DateTime<Utc>,
}

/// Deduplicated `(store, entity)` pairs for `steps`, in acquisition order.
///
/// The result depends only on the set of pairs, never on the order in which
/// steps declare them.
#[must_use]
pub fn acquisition_order(steps: &[StepDescriptor]) -> Vec<LockKey> {
    steps
        .iter()
        .flat_map(|step| {
            step.entity_keys.iter().map(|entity| LockKey {
                store: step.target_store.clone(),
                entity: entity.clone(),
            })
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The locks held by one transaction.
///
/// Released exactly once: explicitly through [`LockSet::release`] or
/// [`LockCoordinator::release`], or on drop, which also covers panics and
/// early returns in the code holding it.
pub struct LockSet {
    transaction_id: TransactionId,
    table: Arc<LockTable>,
    held: Vec<(LockKey, SlotGuard)>,
    tokens: Vec<LockToken>,
    released: bool,
}

impl LockSet {
    fn new(transaction_id: TransactionId, table: Arc<LockTable>) -> Self {
        Self {
            transaction_id,
            table,
            held: Vec::new(),
            tokens: Vec::new(),
            released: false,
        }
    }

    fn push(&mut self, key: LockKey, mut guard: SlotGuard) {
        *guard = Some(self.transaction_id);
        self.tokens.push(LockToken {
            transaction_id: self.transaction_id,
            entity_key: key.entity.clone(),
            store_ref: key.store.clone(),
            acquired_at: Utc::now(),
        });
        self.held.push((key, guard));
    }

    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Tokens in the order they were acquired.
    #[must_use]
    pub fn tokens(&self) -> &[LockToken] {
        &self.tokens
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Releases every held lock, latest first. Returns `false` if the set
    /// had already been released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        let count = self.held.len();
        while let Some((key, mut guard)) = self.held.pop() {
            *guard = None;
            drop(guard);
            self.table.reclaim(&key);
        }
        debug!(
            transaction_id = %self.transaction_id,
            count,
            "released entity locks"
        );
        true
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSet")
            .field("transaction_id", &self.transaction_id)
            .field("tokens", &self.tokens)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

/// Acquires and releases entity locks across all participating stores.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    table: Arc<LockTable>,
    config: LockConfig,
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

impl LockCoordinator {
    #[must_use]
    pub fn new(config: LockConfig) -> Self {
        Self {
            table: Arc::new(LockTable::default()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Locks every entity touched by `steps`, in [`acquisition_order`].
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when one acquisition waits longer than
    /// the configured bound, or [`LockError::Conflict`] in no-wait mode. Any
    /// locks taken by this call are released before the error is returned.
    pub async fn acquire(
        &self,
        transaction_id: TransactionId,
        steps: &[StepDescriptor],
    ) -> Result<LockSet, LockError> {
        let order = acquisition_order(steps);
        let mut set = LockSet::new(transaction_id, Arc::clone(&self.table));

        for key in order {
            match self.acquire_one(&key).await {
                Ok(guard) => set.push(key, guard),
                Err(err) => {
                    warn!(
                        transaction_id = %transaction_id,
                        key = %key,
                        acquired = set.tokens.len(),
                        error = %err,
                        "lock acquisition failed; releasing partial set"
                    );
                    set.release();
                    return Err(err);
                }
            }
        }

        debug!(
            transaction_id = %transaction_id,
            count = set.tokens.len(),
            "acquired entity locks"
        );
        Ok(set)
    }

    async fn acquire_one(&self, key: &LockKey) -> Result<SlotGuard, LockError> {
        let slot = self.table.slot(key);
        let timeout = self.config.acquire_timeout();

        let result = if self.config.is_no_wait() {
            slot.try_lock_owned().map_err(|_| LockError::Conflict {
                store: key.store.clone(),
                entity_key: key.entity.clone(),
            })
        } else {
            tokio::time::timeout(timeout, slot.lock_owned())
                .await
                .map_err(|_| LockError::Timeout {
                    store: key.store.clone(),
                    entity_key: key.entity.clone(),
                    waited: timeout,
                })
        };

        if result.is_err() {
            self.table.reclaim(key);
        }
        result
    }

    /// Releases `set`. Idempotent; returns `false` on repeat calls.
    pub fn release(&self, set: &mut LockSet) -> bool {
        set.release()
    }

    #[must_use]
    pub fn is_held(&self, store: &StoreRef, entity: &EntityKey) -> bool {
        self.table.is_held(&LockKey {
            store: store.clone(),
            entity: entity.clone(),
        })
    }

    /// Number of keys currently held or waited on.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.table.len()
    }
}
