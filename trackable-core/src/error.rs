//! Error types for the change tracker.
//!
//! Every error here is a programmer error raised synchronously at the
//! violating call. Properties that cannot be snapshotted are not errors:
//! they are left out of the original values and later lookups report them
//! as absent.

use thiserror::Error;
use trackable_model::ModelError;
use trackable_types::EntityId;

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors that can occur while tracking entities.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The entity is already registered with a monitor.
    #[error("entity {entity} is already tracked")]
    AlreadyTracked { entity: EntityId },

    /// The entity is not registered with the monitor.
    #[error("entity {entity} is not tracked")]
    NotTracked { entity: EntityId },

    /// A value does not fit the requested type or the property's kind.
    #[error("type mismatch on `{property}`: expected {expected}, found {found}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: String,
    },

    /// The entity type does not declare the property.
    #[error("entity type `{entity_type}` has no property `{property}`")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },

    /// The property is not writable.
    #[error("property `{property}` on `{entity_type}` is read-only")]
    ReadOnlyProperty {
        entity_type: String,
        property: String,
    },

    /// Collection index out of range.
    #[error("index {index} out of bounds for collection of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The monitor has been disposed.
    #[error("monitor has been disposed")]
    Disposed,

    /// Clone codec failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration parse failure.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Entity type declaration failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}
