use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use federation_core::{StoreKind, StoreRef};

use crate::adapter::StoreAdapter;
use crate::error::SagaError;

/// Adapters keyed by the kind of store they speak to.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    adapters: HashMap<StoreKind, Arc<dyn StoreAdapter>>,
}

impl StoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` for every store of `kind`, replacing any previous
    /// one.
    pub fn register(&mut self, kind: StoreKind, adapter: Arc<dyn StoreAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    #[must_use]
    pub fn with(mut self, kind: StoreKind, adapter: Arc<dyn StoreAdapter>) -> Self {
        self.register(kind, adapter);
        self
    }

    /// # Errors
    ///
    /// Returns [`SagaError::UnknownAdapter`] if nothing handles `store.kind`.
    pub fn adapter_for(&self, store: &StoreRef) -> Result<Arc<dyn StoreAdapter>, SagaError> {
        self.adapters
            .get(&store.kind)
            .cloned()
            .ok_or_else(|| SagaError::UnknownAdapter {
                store: store.clone(),
            })
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
