use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("mutation contains no operations")]
    EmptyMutation,

    #[error("entity type '{entity_type}' referenced by '{field}' is not owned by any store")]
    UnknownEntity { field: String, entity_type: String },

    #[error("entity type '{entity_type}' is bound to several stores: {}", stores.join(", "))]
    AmbiguousEntity {
        entity_type: String,
        stores: Vec<String>,
    },

    #[error("operation '{field}' does not identify any '{entity_type}' (key field '{key_field}')")]
    MissingEntityKey {
        field: String,
        entity_type: String,
        key_field: String,
    },

    #[error("response key '{0}' is used by more than one operation")]
    DuplicateResponseKey(String),
}
