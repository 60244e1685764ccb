//! Shallow and deep copies of entities.
//!
//! Clones are always detached: they get fresh ids, no monitor and no
//! tracking state. Only readable, writable properties are copied; unmapped
//! properties are left unset.

use crate::graph::{self, Node, NodeId};
use crate::{Entity, EntityCollection, Value};
use std::collections::HashMap;
use trackable_model::{DescriptorCache, PropertyKind};
use tracing::trace;

/// Copies the structural properties of `entity`.
///
/// Scalars, arrays, value collections and objects are copied. References
/// become null and non-null entity collections become new, empty ones.
pub fn shallow_clone(entity: &Entity) -> Entity {
    let clone = Entity::new(entity.entity_type().clone());
    copy_structural(entity, &clone);
    for property in entity
        .entity_type()
        .properties()
        .iter()
        .filter(|p| p.is_read_write() && p.kind == PropertyKind::EntityCollection)
    {
        if !entity.read_raw(&property.name).is_null() {
            clone.write_raw(&property.name, Value::Entities(EntityCollection::new()));
        }
    }
    clone
}

/// Copies the whole graph reachable from `entity`.
///
/// Each reachable entity and collection is cloned exactly once; links are
/// rewritten to point at the clones, so shared sub-entities stay shared
/// and cycles are reproduced.
pub fn deep_clone(entity: &Entity) -> Entity {
    match deep_clone_node(Node::from(entity)) {
        Node::Entity(clone) => clone,
        // A root entity always maps to an entity.
        Node::Collection(_) => shallow_clone(entity),
    }
}

/// Deep-clones a collection and everything reachable from its members.
pub fn deep_clone_collection(collection: &EntityCollection) -> EntityCollection {
    match deep_clone_node(Node::from(collection)) {
        Node::Collection(clone) => clone,
        Node::Entity(_) => EntityCollection::new(),
    }
}

fn deep_clone_node(root: Node) -> Node {
    let descriptors = DescriptorCache::new();
    let nodes = graph::collect(root.clone(), &descriptors);

    let mut entities: HashMap<NodeId, Entity> = HashMap::new();
    let mut collections: HashMap<NodeId, EntityCollection> = HashMap::new();
    for node in &nodes {
        match node {
            Node::Entity(source) => {
                let clone = Entity::new(source.entity_type().clone());
                copy_structural(source, &clone);
                entities.insert(node.id(), clone);
            }
            Node::Collection(_) => {
                collections.insert(node.id(), EntityCollection::new());
            }
        }
    }

    let entity_clone = |entity: &Entity| entities.get(&NodeId::Entity(entity.id())).cloned();
    for node in &nodes {
        match node {
            Node::Entity(source) => {
                let Some(clone) = entities.get(&node.id()) else {
                    continue;
                };
                for property in &descriptors.descriptors_for(source.entity_type()).navigation {
                    let relinked = match source.read_raw(&property.name) {
                        Value::Entity(target) => entity_clone(&target).map(Value::Entity),
                        Value::Entities(target) => collections
                            .get(&NodeId::Collection(target.id()))
                            .cloned()
                            .map(Value::Entities),
                        _ => None,
                    };
                    if let Some(value) = relinked {
                        clone.write_raw(&property.name, value);
                    }
                }
            }
            Node::Collection(source) => {
                if let Some(clone) = collections.get(&node.id()) {
                    let members = source.iter().filter_map(|e| entity_clone(&e)).collect();
                    clone.replace_items_raw(members);
                }
            }
        }
    }

    trace!(
        entities = entities.len(),
        collections = collections.len(),
        "deep clone complete"
    );

    let root_id = root.id();
    let cloned = match root_id {
        NodeId::Entity(_) => entities.remove(&root_id).map(Node::Entity),
        NodeId::Collection(_) => collections.remove(&root_id).map(Node::Collection),
    };
    cloned.unwrap_or(root)
}

fn copy_structural(source: &Entity, target: &Entity) {
    for property in source
        .entity_type()
        .properties()
        .iter()
        .filter(|p| p.is_read_write())
    {
        let value = match (property.kind, source.read_raw(&property.name)) {
            (_, Value::Null) => continue,
            (PropertyKind::Scalar | PropertyKind::Text | PropertyKind::Array, value) => value,
            (PropertyKind::ValueCollection, Value::Values(collection)) => {
                Value::Values(collection.clone_items())
            }
            (PropertyKind::Object, Value::Object(object)) => Value::Object(object.structural_clone()),
            _ => continue,
        };
        target.write_raw(&property.name, value);
    }
}
