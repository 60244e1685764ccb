//! Core type definitions for the trackable change-tracking engine.
//!
//! This crate defines the leaf vocabulary shared by the model and the engine:
//! - Entity, collection and monitor handles (UUID v7)
//! - The entity lifecycle state ([`EntityState`])
//! - Structural scalar values ([`Scalar`]) that are copied and compared by value
//!
//! Nothing here knows about monitors or graphs; those live in `trackable-core`.

mod ids;
mod scalar;
mod state;

pub use ids::{CollectionId, EntityId, MonitorId};
pub use scalar::{FromScalar, Scalar};
pub use state::EntityState;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid entity state: {0}")]
    InvalidState(String),
}
