use federation_core::StoreRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBinding {
    pub store: StoreRef,
    /// Input field carrying the entity identifier on create.
    pub key_field: String,
}

/// Schema metadata mapping entity types to the stores that own them.
///
/// Produced by the schema compiler. An entity type bound to more than one
/// store is kept as-is and rejected when a mutation references it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationMap {
    entities: IndexMap<String, Vec<EntityBinding>>,
}

impl FederationMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `entity_type` to `store`, with `id` as the key field.
    #[must_use]
    pub fn bind(self, entity_type: impl Into<String>, store: StoreRef) -> Self {
        self.bind_with_key(entity_type, store, "id")
    }

    #[must_use]
    pub fn bind_with_key(
        mut self,
        entity_type: impl Into<String>,
        store: StoreRef,
        key_field: impl Into<String>,
    ) -> Self {
        let binding = EntityBinding {
            store,
            key_field: key_field.into(),
        };
        let bindings = self.entities.entry(entity_type.into()).or_default();
        if !bindings.iter().any(|b| b.store == binding.store) {
            bindings.push(binding);
        }
        self
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Finds the single store owning `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` when no store owns the type and
    /// `AmbiguousEntity` when several do.
    pub fn lookup(&self, field: &str, entity_type: &str) -> Result<&EntityBinding, ResolutionError> {
        match self.entities.get(entity_type).map(Vec::as_slice) {
            None | Some([]) => Err(ResolutionError::UnknownEntity {
                field: field.to_string(),
                entity_type: entity_type.to_string(),
            }),
            Some([binding]) => Ok(binding),
            Some(bindings) => Err(ResolutionError::AmbiguousEntity {
                entity_type: entity_type.to_string(),
                stores: bindings.iter().map(|b| b.store.to_string()).collect(),
            }),
        }
    }
}
