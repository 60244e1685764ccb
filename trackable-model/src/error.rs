//! Error types for type metadata.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while declaring entity types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The type name was empty.
    #[error("entity type name must not be empty")]
    EmptyTypeName,

    /// Two descriptors share a name.
    #[error("duplicate property `{property}` on entity type `{entity_type}`")]
    DuplicateProperty {
        entity_type: String,
        property: String,
    },

    /// Schema (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
