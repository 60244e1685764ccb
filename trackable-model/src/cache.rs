//! Memoized per-type descriptor lists.
//!
//! The tracker asks for the trackable properties of a type on every apply,
//! traversal and clone. The filtered, ordered list is computed once per
//! distinct type name and shared afterwards.

use crate::{EntityType, PropertyDescriptor, PropertyKind};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// Cached descriptor lists for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptors {
    /// Readable, writable, non-excluded properties in declaration order.
    pub trackable: Vec<PropertyDescriptor>,
    /// Trackable navigation properties: references first, then entity
    /// collections, each group in declaration order.
    pub navigation: Vec<PropertyDescriptor>,
}

impl TypeDescriptors {
    fn compute(entity_type: &EntityType, excluded: &HashSet<String>) -> Self {
        let trackable: Vec<PropertyDescriptor> = entity_type
            .properties()
            .iter()
            .filter(|p| p.is_read_write() && !excluded.contains(&p.name))
            .cloned()
            .collect();

        let references = trackable
            .iter()
            .filter(|p| p.kind == PropertyKind::Reference);
        let collections = trackable
            .iter()
            .filter(|p| p.kind == PropertyKind::EntityCollection);
        let navigation = references.chain(collections).cloned().collect();

        Self {
            trackable,
            navigation,
        }
    }

    /// Looks up a trackable descriptor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.trackable.iter().find(|p| p.name == name)
    }
}

/// Type name → trackable descriptors, computed once per type.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    excluded: HashSet<String>,
    entries: RwLock<HashMap<String, Arc<TypeDescriptors>>>,
}

impl DescriptorCache {
    /// Creates an empty cache with no exclusions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache that never tracks the named properties.
    pub fn with_exclusions<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the trackable descriptors for `entity_type`, computing them on
    /// first use. A type without trackable properties yields empty lists.
    pub fn descriptors_for(&self, entity_type: &EntityType) -> Arc<TypeDescriptors> {
        if let Some(hit) = self.entries.read().get(entity_type.name()) {
            return Arc::clone(hit);
        }

        let mut entries = self.entries.write();
        let entry = entries
            .entry(entity_type.name().to_string())
            .or_insert_with(|| {
                trace!(entity_type = %entity_type, "computing trackable descriptors");
                Arc::new(TypeDescriptors::compute(entity_type, &self.excluded))
            });
        Arc::clone(entry)
    }

    /// Returns true if the property name is on the exclusion list.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }

    /// Number of types cached so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
