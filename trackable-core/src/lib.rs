//! In-process change tracking for graphs of entities.
//!
//! A [`Monitor`] records the original values of the entities applied to it
//! and follows every later write, so it can report which entities were
//! added, modified or deleted, and accept or roll back those changes.
//!
//! ```text
//! Entity::set ──▶ Monitor::update_entity_state ──▶ state / changed set
//!                        │                              │
//! EntityCollection ──────┤ (insert ⇒ New, remove ⇒ Deleted)
//! ValueCollection ───────┘ (any mutation ⇒ owner Modified)
//!                                                       ▼
//!                         is_changed, queries, accept / reject
//! ```
//!
//! # Example
//!
//! ```
//! use trackable_core::{Entity, Monitor};
//! use trackable_model::EntityType;
//! use trackable_types::EntityState;
//!
//! let user_type = EntityType::builder("User").text("name").scalar("age").build()?;
//! let user = Entity::new(user_type);
//! user.set("age", 33)?;
//!
//! let monitor = Monitor::new();
//! monitor.apply(&user)?;
//!
//! user.set("age", 40)?;
//! assert_eq!(user.state(), EntityState::Modified);
//! assert!(monitor.is_changed());
//!
//! user.set("age", 33)?;
//! assert_eq!(user.state(), EntityState::Unmodified);
//! assert!(!monitor.is_changed());
//! # Ok::<(), trackable_core::TrackerError>(())
//! ```

mod clone;
mod collection;
mod config;
mod entity;
mod error;
mod events;
mod graph;
mod monitor;
mod snapshot;
mod value;
mod value_collection;

pub use clone::{deep_clone, deep_clone_collection, shallow_clone};
pub use collection::EntityCollection;
pub use config::MonitorConfig;
pub use entity::{Entity, TrackedEntity};
pub use error::{TrackerError, TrackerResult};
pub use events::{EntityChanged, PropertyChanged, SubscriptionId};
pub use graph::{Node, NodeId};
pub use monitor::Monitor;
pub use snapshot::{EntityInfo, OriginalValueInfo, Snapshot};
pub use value::{FromValue, StructuralClone, Value};
pub use value_collection::{CloneCodec, JsonCloneCodec, ValueCollection};

pub use trackable_model::{EntityType, PropertyDescriptor, PropertyKind};
pub use trackable_types::{CollectionId, EntityId, EntityState, MonitorId, Scalar};
