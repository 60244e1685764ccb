//! Object-graph traversal.
//!
//! Nodes are entities and entity collections; edges are reference and
//! entity-collection properties (in descriptor order, references first) and
//! collection membership (in list order). The walk is an iterative
//! depth-first pre-order with a visited set, so shared sub-graphs are
//! visited once and cycles terminate.

use crate::{Entity, EntityCollection, Value};
use std::collections::HashSet;
use trackable_model::DescriptorCache;
use trackable_types::{CollectionId, EntityId};

/// A node of the entity graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Entity(Entity),
    Collection(EntityCollection),
}

/// Identity of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Entity(EntityId),
    Collection(CollectionId),
}

impl Node {
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Entity(e) => NodeId::Entity(e.id()),
            Self::Collection(c) => NodeId::Collection(c.id()),
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            Self::Collection(_) => None,
        }
    }

    #[must_use]
    pub fn as_collection(&self) -> Option<&EntityCollection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Entity(_) => None,
        }
    }

    /// Outgoing edges in traversal order.
    fn children(&self, descriptors: &DescriptorCache) -> Vec<Node> {
        match self {
            Self::Entity(entity) => descriptors
                .descriptors_for(entity.entity_type())
                .navigation
                .iter()
                .filter_map(|p| match entity.read_raw(&p.name) {
                    Value::Entity(child) => Some(Self::Entity(child)),
                    Value::Entities(collection) => Some(Self::Collection(collection)),
                    _ => None,
                })
                .collect(),
            Self::Collection(collection) => collection.iter().map(Self::Entity).collect(),
        }
    }
}

impl From<Entity> for Node {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<&Entity> for Node {
    fn from(entity: &Entity) -> Self {
        Self::Entity(entity.clone())
    }
}

impl From<EntityCollection> for Node {
    fn from(collection: EntityCollection) -> Self {
        Self::Collection(collection)
    }
}

impl From<&EntityCollection> for Node {
    fn from(collection: &EntityCollection) -> Self {
        Self::Collection(collection.clone())
    }
}

/// Walks the graph from `root`, calling `visit` once per reachable node.
///
/// `visit` returning `Ok(false)` prunes the node's subtree. An error stops
/// the walk and is returned. No lock is held while `visit` runs.
pub(crate) fn walk<E, F>(root: Node, descriptors: &DescriptorCache, mut visit: F) -> Result<(), E>
where
    F: FnMut(&Node) -> Result<bool, E>,
{
    let mut visited = HashSet::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) {
            continue;
        }
        if !visit(&node)? {
            continue;
        }
        // Reversed so the first edge is popped first.
        let children = node.children(descriptors);
        stack.extend(
            children
                .into_iter()
                .rev()
                .filter(|child| !visited.contains(&child.id())),
        );
    }
    Ok(())
}

/// Every node reachable from `root` (including it), in visit order.
pub(crate) fn collect(root: Node, descriptors: &DescriptorCache) -> Vec<Node> {
    let mut nodes = Vec::new();
    let result: Result<(), std::convert::Infallible> = walk(root, descriptors, |node| {
        nodes.push(node.clone());
        Ok(true)
    });
    match result {
        Ok(()) => nodes,
        Err(never) => match never {},
    }
}
