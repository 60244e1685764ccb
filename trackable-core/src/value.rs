//! Property values.
//!
//! An entity stores one [`Value`] per declared property. Scalars and arrays
//! are held by value; entities and collections are shared handles, so two
//! properties can point at the same object.

use crate::{Entity, EntityCollection, ValueCollection};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use trackable_model::{PropertyDescriptor, PropertyKind};
use trackable_types::{FromScalar, Scalar};
use uuid::Uuid;

/// A value that supplies its own structural copy and comparison.
///
/// Used for `Object` properties: the tracker snapshots them with
/// [`structural_clone`](Self::structural_clone) and compares writes with
/// [`structural_eq`](Self::structural_eq).
pub trait StructuralClone: Any + Send + Sync + fmt::Debug {
    /// Returns an independent copy.
    fn structural_clone(&self) -> Arc<dyn StructuralClone>;

    /// Compares by content with another object of any type.
    fn structural_eq(&self, other: &dyn StructuralClone) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// The value of one entity property.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Scalar(Scalar),
    Array(Vec<Scalar>),
    Entity(Entity),
    Entities(EntityCollection),
    Values(ValueCollection),
    Object(Arc<dyn StructuralClone>),
    /// Payload of an unmapped property. Never snapshotted or compared.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wraps a type implementing [`StructuralClone`].
    pub fn object<T: StructuralClone>(object: T) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Wraps an arbitrary payload for an unmapped property.
    pub fn opaque<T: Any + Send + Sync>(payload: T) -> Self {
        Self::Opaque(Arc::new(payload))
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Self::Null => "null".into(),
            Self::Scalar(s) => format!("scalar:{}", s.kind_name()),
            Self::Array(_) => "array".into(),
            Self::Entity(e) => format!("entity:{}", e.entity_type().name()),
            Self::Entities(_) => "entity_collection".into(),
            Self::Values(_) => "value_collection".into(),
            Self::Object(_) => "object".into(),
            Self::Opaque(_) => "opaque".into(),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entities(&self) -> Option<&EntityCollection> {
        match self {
            Self::Entities(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_values(&self) -> Option<&ValueCollection> {
        match self {
            Self::Values(c) => Some(c),
            _ => None,
        }
    }

    /// Downcasts an `Object` value.
    #[must_use]
    pub fn as_object<T: StructuralClone>(&self) -> Option<&T> {
        match self {
            Self::Object(o) => o.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Whether this value may be stored in a property with the given
    /// descriptor. Null fits every kind; unmapped properties take anything.
    #[must_use]
    pub fn fits(&self, descriptor: &PropertyDescriptor) -> bool {
        match (descriptor.kind, self) {
            (_, Self::Null) | (PropertyKind::Unmapped, _) => true,
            (PropertyKind::Scalar, Self::Scalar(_)) => true,
            (PropertyKind::Text, Self::Scalar(s)) => s.is_text(),
            (PropertyKind::Array, Self::Array(_)) => true,
            (PropertyKind::Reference, Self::Entity(e)) => descriptor
                .target_type
                .as_deref()
                .is_none_or(|target| target == e.entity_type().name()),
            (PropertyKind::EntityCollection, Self::Entities(_)) => true,
            (PropertyKind::ValueCollection, Self::Values(_)) => true,
            (PropertyKind::Object, Self::Object(_)) => true,
            _ => false,
        }
    }

    /// Compares two values by content, the way `entity_equals` does.
    ///
    /// Entity references and entity collections are never structurally
    /// equal to anything but the same handle.
    #[must_use]
    pub fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Values(a), Self::Values(b)) => a.ptr_eq(b) || a.items() == b.items(),
            (Self::Object(a), Self::Object(b)) => a.structural_eq(b.as_ref()),
            (Self::Entity(a), Self::Entity(b)) => a.ptr_eq(b),
            (Self::Entities(a), Self::Entities(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Scalar(s) => f.debug_tuple("Scalar").field(s).finish(),
            Self::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Self::Entity(e) => f.debug_tuple("Entity").field(&e.id()).finish(),
            Self::Entities(c) => f.debug_tuple("Entities").field(&c.id()).finish(),
            Self::Values(c) => f.debug_tuple("Values").field(&c.items()).finish(),
            Self::Object(o) => f.debug_tuple("Object").field(o).finish(),
            Self::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

macro_rules! scalar_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Scalar::from(value))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Option<Self> {
                    value.as_scalar().and_then(<$ty as FromScalar>::from_scalar)
                }
            }
        )*
    };
}

scalar_value!(bool, i32, i64, u8, u32, u64, f64, String, Uuid);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::from(value))
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl<A: Into<Scalar>, B: Into<Scalar>> From<(A, B)> for Value {
    fn from(value: (A, B)) -> Self {
        Self::Scalar(Scalar::from(value))
    }
}

impl<T: Into<Scalar>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<&Entity> for Value {
    fn from(entity: &Entity) -> Self {
        Self::Entity(entity.clone())
    }
}

impl From<EntityCollection> for Value {
    fn from(collection: EntityCollection) -> Self {
        Self::Entities(collection)
    }
}

impl From<ValueCollection> for Value {
    fn from(collection: ValueCollection) -> Self {
        Self::Values(collection)
    }
}

/// Typed extraction from a [`Value`].
///
/// `Null` only converts into `Option<T>` (as `None`) or `Value`; every other
/// target rejects it.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for Scalar {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_scalar().cloned()
    }
}

impl<A: FromScalar, B: FromScalar> FromValue for (A, B) {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_scalar().and_then(<(A, B)>::from_scalar)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Arrays and value collections both read as `Vec<T>`.
impl<T: FromScalar> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        let convert = |items: &[Scalar]| items.iter().map(T::from_scalar).collect();
        match value {
            Value::Array(items) => convert(items),
            Value::Values(collection) => convert(&collection.items()),
            _ => None,
        }
    }
}

impl FromValue for Entity {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_entity().cloned()
    }
}

impl FromValue for EntityCollection {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_entities().cloned()
    }
}

impl FromValue for ValueCollection {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_values().cloned()
    }
}
