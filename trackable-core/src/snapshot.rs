//! Original-value snapshots.
//!
//! A snapshot is taken per trackable property when an entity is applied or
//! its changes are accepted. How a property is copied depends on its kind:
//! scalars and arrays by value, references and entity collections by
//! identity, value collections element-wise, objects through their own
//! structural clone.

use crate::{Entity, EntityCollection, StructuralClone, Value, ValueCollection};
use std::collections::HashMap;
use std::sync::Arc;
use trackable_model::{EntityType, PropertyDescriptor, PropertyKind};
use trackable_types::Scalar;

/// The recorded original value of one property.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Null,
    Scalar(Scalar),
    Array(Vec<Scalar>),
    /// Identity of the referenced entity.
    Reference(Entity),
    /// Identity of the entity collection.
    Collection(EntityCollection),
    /// Element-wise copy of a value collection.
    Values(Vec<Scalar>),
    Object(Arc<dyn StructuralClone>),
}

impl Snapshot {
    /// Snapshots `value` as a property of kind `kind`.
    ///
    /// Returns `None` when the property cannot be snapshotted (unmapped kind
    /// or a stored value that does not match the kind).
    #[must_use]
    pub fn capture(kind: PropertyKind, value: &Value) -> Option<Self> {
        let snapshot = match (kind, value) {
            (PropertyKind::Unmapped, _) => return None,
            (_, Value::Null) => Self::Null,
            (PropertyKind::Scalar | PropertyKind::Text, Value::Scalar(s)) => Self::Scalar(s.clone()),
            (PropertyKind::Array, Value::Array(items)) => Self::Array(items.clone()),
            (PropertyKind::Reference, Value::Entity(e)) => Self::Reference(e.clone()),
            (PropertyKind::EntityCollection, Value::Entities(c)) => Self::Collection(c.clone()),
            (PropertyKind::ValueCollection, Value::Values(c)) => Self::Values(c.items()),
            (PropertyKind::Object, Value::Object(o)) => Self::Object(o.structural_clone()),
            _ => return None,
        };
        Some(snapshot)
    }

    /// Whether `current` equals this original value.
    ///
    /// Scalars and arrays compare by value (null is distinct from an empty
    /// array), references and entity collections by identity, value
    /// collections element-wise and objects through `structural_eq`.
    #[must_use]
    pub fn matches(&self, current: &Value) -> bool {
        match (self, current) {
            (Self::Null, Value::Null) => true,
            (Self::Scalar(a), Value::Scalar(b)) => a == b,
            (Self::Array(a), Value::Array(b)) => a == b,
            (Self::Reference(a), Value::Entity(b)) => a.ptr_eq(b),
            (Self::Collection(a), Value::Entities(b)) => a.ptr_eq(b),
            (Self::Values(a), Value::Values(b)) => *a == b.items(),
            (Self::Object(a), Value::Object(b)) => a.structural_eq(b.as_ref()),
            _ => false,
        }
    }

    /// The snapshot as a detached value, for reading original values.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Scalar(s) => Value::Scalar(s.clone()),
            Self::Array(items) => Value::Array(items.clone()),
            Self::Reference(e) => Value::Entity(e.clone()),
            Self::Collection(c) => Value::Entities(c.clone()),
            Self::Values(items) => Value::Values(ValueCollection::from_items(items.clone())),
            Self::Object(o) => Value::Object(o.structural_clone()),
        }
    }

    /// The value to write back on reject.
    ///
    /// A value collection still held by the property is restored in place so
    /// outside handles keep seeing the owner's contents.
    pub(crate) fn restore(&self, current: &Value) -> Value {
        match (self, current) {
            (Self::Values(items), Value::Values(collection)) => {
                collection.replace_items_raw(items.clone());
                current.clone()
            }
            _ => self.to_value(),
        }
    }
}

/// Original value of one property plus how it was classified.
#[derive(Debug, Clone)]
pub struct OriginalValueInfo {
    pub descriptor: PropertyDescriptor,
    pub value: Snapshot,
    pub is_reference: bool,
    pub is_tracked_collection: bool,
}

impl OriginalValueInfo {
    pub(crate) fn new(descriptor: &PropertyDescriptor, value: Snapshot) -> Self {
        Self {
            descriptor: descriptor.clone(),
            value,
            is_reference: descriptor.kind == PropertyKind::Reference,
            is_tracked_collection: descriptor.kind == PropertyKind::EntityCollection,
        }
    }
}

/// Everything a monitor records about one tracked entity.
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub entity_type: EntityType,
    pub entity: Entity,
    pub original_values: HashMap<String, OriginalValueInfo>,
    /// Registration order within the monitor.
    pub(crate) seq: u64,
}

impl EntityInfo {
    #[must_use]
    pub fn original(&self, property: &str) -> Option<&OriginalValueInfo> {
        self.original_values.get(property)
    }
}
