use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Correlation key for locks, log entries and compensation of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Mints a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidTransactionId(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// A database owned by this server.
    LocalDatabase,
    /// A remote subgraph endpoint owned by another team.
    RemoteSubgraph,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocalDatabase => "local",
            Self::RemoteSubgraph => "subgraph",
        };
        write!(f, "{s}")
    }
}

/// Opaque handle for a participating data store.
///
/// Ordering is lexicographic on the name, then the kind. Lock acquisition
/// relies on this order being total and stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreRef {
    pub name: String,
    pub kind: StoreKind,
}

impl StoreRef {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StoreKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, StoreKind::LocalDatabase)
    }

    #[must_use]
    pub fn subgraph(name: impl Into<String>) -> Self {
        Self::new(name, StoreKind::RemoteSubgraph)
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Identifier of one row or record within a store; the unit of locking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: String,
    pub id: String,
}

impl EntityKey {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_round_trips_through_display() {
        let id = TransactionId::new();

        let parsed: TransactionId = id.to_string().parse().expect("valid uuid");

        assert_eq!(parsed, id);
    }

    #[test]
    fn transaction_id_rejects_garbage() {
        let err = "not-a-uuid".parse::<TransactionId>().expect_err("should fail");

        assert_eq!(err, CoreError::InvalidTransactionId("not-a-uuid".to_string()));
    }

    #[test]
    fn store_refs_order_by_name_first() {
        let a = StoreRef::subgraph("accounts");
        let b = StoreRef::local("billing");

        assert!(a < b);
    }

    #[test]
    fn store_ref_display_includes_kind() {
        assert_eq!(StoreRef::local("orders").to_string(), "local:orders");
        assert_eq!(StoreRef::subgraph("users").to_string(), "subgraph:users");
    }

    #[test]
    fn entity_keys_order_by_type_then_id() {
        let mut keys = vec![
            EntityKey::new("User", "2"),
            EntityKey::new("Order", "9"),
            EntityKey::new("User", "10"),
        ];
        keys.sort();

        assert_eq!(keys[0], EntityKey::new("Order", "9"));
        assert_eq!(keys[1], EntityKey::new("User", "10"));
        assert_eq!(keys[2], EntityKey::new("User", "2"));
    }
}
