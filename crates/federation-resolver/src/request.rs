use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Read,
}

/// One root field of a mutation document, already validated against the
/// schema by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOperation {
    #[serde(default)]
    pub alias: Option<String>,
    /// Schema field name, e.g. `createOrder`.
    pub field: String,
    pub entity_type: String,
    pub kind: MutationKind,
    /// Identifiers of existing entities this operation touches.
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub input: Value,
}

impl MutationOperation {
    #[must_use]
    pub fn new(field: impl Into<String>, entity_type: impl Into<String>, kind: MutationKind) -> Self {
        Self {
            alias: None,
            field: field.into(),
            entity_type: entity_type.into(),
            kind,
            ids: Vec::new(),
            input: Value::Null,
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Key under which this operation's result appears in the response.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

/// Operations in the order the client declared them; execution preserves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    pub operations: Vec<MutationOperation>,
}

impl MutationRequest {
    #[must_use]
    pub fn new(operations: Vec<MutationOperation>) -> Self {
        Self { operations }
    }
}
