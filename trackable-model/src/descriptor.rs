use serde::{Deserialize, Serialize};

/// How the tracker classifies a property.
///
/// The kind decides how the original value is snapshotted and how a later
/// write is compared against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    /// Number, bool, uuid or composite scalar. Copied by value.
    Scalar,
    /// String. Copied by value.
    Text,
    /// Array of scalars. Copied and compared element-wise; null is distinct
    /// from an empty array.
    Array,
    /// Link to another entity. Compared by identity.
    Reference,
    /// Tracked collection of entities. Compared by identity; the collection
    /// tracks its own membership.
    EntityCollection,
    /// Collection of scalars owned by the entity. Deep-copied.
    ValueCollection,
    /// Opaque value supplying its own structural clone.
    Object,
    /// Anything the tracker cannot snapshot. Excluded from original values.
    Unmapped,
}

impl PropertyKind {
    /// Reference and entity-collection properties form the entity graph.
    #[must_use]
    pub const fn is_navigation(self) -> bool {
        matches!(self, Self::Reference | Self::EntityCollection)
    }

    /// Whether the tracker can take an original-value snapshot.
    #[must_use]
    pub const fn is_snapshottable(self) -> bool {
        !matches!(self, Self::Unmapped)
    }

    /// Whether two entities can be compared on this property by value.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::Scalar | Self::Text | Self::Array | Self::ValueCollection | Self::Object
        )
    }
}

/// Describes one property of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default = "default_true")]
    pub readable: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    /// Entity type name of the target. Only meaningful for navigation kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PropertyDescriptor {
    fn simple(name: &str, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            readable: true,
            writable: true,
            target_type: None,
        }
    }

    /// Shorthand for a scalar property.
    pub fn scalar(name: &str) -> Self {
        Self::simple(name, PropertyKind::Scalar)
    }

    /// Shorthand for a string property.
    pub fn text(name: &str) -> Self {
        Self::simple(name, PropertyKind::Text)
    }

    /// Shorthand for an array property.
    pub fn array(name: &str) -> Self {
        Self::simple(name, PropertyKind::Array)
    }

    /// Shorthand for a reference to an entity of type `target`.
    pub fn reference(name: &str, target: &str) -> Self {
        Self {
            target_type: Some(target.into()),
            ..Self::simple(name, PropertyKind::Reference)
        }
    }

    /// Shorthand for a collection of entities of type `target`.
    pub fn entity_collection(name: &str, target: &str) -> Self {
        Self {
            target_type: Some(target.into()),
            ..Self::simple(name, PropertyKind::EntityCollection)
        }
    }

    /// Shorthand for a value collection.
    pub fn value_collection(name: &str) -> Self {
        Self::simple(name, PropertyKind::ValueCollection)
    }

    /// Shorthand for an opaque clonable object.
    pub fn object(name: &str) -> Self {
        Self::simple(name, PropertyKind::Object)
    }

    /// Shorthand for a property the tracker cannot snapshot.
    pub fn unmapped(name: &str) -> Self {
        Self::simple(name, PropertyKind::Unmapped)
    }

    /// Marks the property as read-only (computed). Read-only properties are
    /// never tracked.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Trackable means independently readable and writable.
    #[must_use]
    pub fn is_read_write(&self) -> bool {
        self.readable && self.writable
    }
}
