//! Entity type metadata for the trackable engine.
//!
//! Defines what the change tracker needs to know about a type before it can
//! snapshot and diff instances of it:
//! - [`EntityType`]: a named, ordered table of property descriptors, built once
//! - [`PropertyDescriptor`]: name, [`PropertyKind`] and access of one property
//! - [`EntitySchema`]: the serializable form of an entity type
//! - [`DescriptorCache`]: memoized list of trackable descriptors per type
//!
//! There is no runtime introspection: every type declares its properties
//! explicitly through [`EntityType::builder`] or an [`EntitySchema`].

mod cache;
mod descriptor;
mod error;
mod entity_type;

pub use cache::{DescriptorCache, TypeDescriptors};
pub use descriptor::{PropertyDescriptor, PropertyKind};
pub use entity_type::{EntitySchema, EntityType, EntityTypeBuilder};
pub use error::{ModelError, ModelResult};
