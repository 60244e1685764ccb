use crate::{ModelError, ModelResult, PropertyDescriptor, PropertyKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Serializable declaration of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: String,
    pub properties: Vec<PropertyDescriptor>,
}

impl EntitySchema {
    /// Parses a schema from JSON.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the schema to JSON.
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A registered entity type: a name plus its ordered property table.
///
/// Cheap to clone. Two `EntityType` values are equal when they share a name;
/// type names are expected to be unique within a process.
#[derive(Clone)]
pub struct EntityType {
    inner: Arc<EntitySchema>,
}

impl EntityType {
    /// Starts declaring a type.
    pub fn builder(name: &str) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name: name.to_string(),
            properties: Vec::new(),
        }
    }

    /// Validates a schema and turns it into a type.
    pub fn from_schema(schema: EntitySchema) -> ModelResult<Self> {
        if schema.entity_type.trim().is_empty() {
            return Err(ModelError::EmptyTypeName);
        }
        let mut seen = HashSet::new();
        for property in &schema.properties {
            if !seen.insert(property.name.as_str()) {
                return Err(ModelError::DuplicateProperty {
                    entity_type: schema.entity_type.clone(),
                    property: property.name.clone(),
                });
            }
        }
        Ok(Self {
            inner: Arc::new(schema),
        })
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.entity_type
    }

    /// All declared properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.inner.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.inner.properties.iter().find(|p| p.name == name)
    }

    /// Properties of the given kind, in declaration order.
    pub fn properties_of(&self, kind: PropertyKind) -> impl Iterator<Item = &PropertyDescriptor> {
        self.inner.properties.iter().filter(move |p| p.kind == kind)
    }

    /// Returns the serializable schema.
    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        &self.inner
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.name() == other.name()
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name())
            .field("properties", &self.inner.properties.len())
            .finish()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builder returned by [`EntityType::builder`].
#[derive(Debug)]
#[must_use]
pub struct EntityTypeBuilder {
    name: String,
    properties: Vec<PropertyDescriptor>,
}

impl EntityTypeBuilder {
    /// Adds an arbitrary descriptor.
    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(descriptor);
        self
    }

    pub fn scalar(self, name: &str) -> Self {
        self.property(PropertyDescriptor::scalar(name))
    }

    pub fn text(self, name: &str) -> Self {
        self.property(PropertyDescriptor::text(name))
    }

    pub fn array(self, name: &str) -> Self {
        self.property(PropertyDescriptor::array(name))
    }

    pub fn reference(self, name: &str, target: &str) -> Self {
        self.property(PropertyDescriptor::reference(name, target))
    }

    pub fn entity_collection(self, name: &str, target: &str) -> Self {
        self.property(PropertyDescriptor::entity_collection(name, target))
    }

    pub fn value_collection(self, name: &str) -> Self {
        self.property(PropertyDescriptor::value_collection(name))
    }

    pub fn object(self, name: &str) -> Self {
        self.property(PropertyDescriptor::object(name))
    }

    pub fn unmapped(self, name: &str) -> Self {
        self.property(PropertyDescriptor::unmapped(name))
    }

    /// Finishes the declaration.
    pub fn build(self) -> ModelResult<EntityType> {
        EntityType::from_schema(EntitySchema {
            entity_type: self.name,
            properties: self.properties,
        })
    }
}
