//! The change monitor.
//!
//! A [`Monitor`] owns the tracking records of every entity applied to it:
//! the original-value snapshots, the registration order and the aggregate
//! `is_changed` flag. Entities and collections report writes back to it;
//! it decides state transitions and answers "what changed" queries.
//!
//! Locking: the registry mutex is taken first, then an entity's tracking
//! mutex, then property stores and collection contents. Listeners run after
//! every lock is released.

use crate::collection::WeakCollection;
use crate::events::{EntityChanged, Listeners, SubscriptionId};
use crate::graph::{self, Node};
use crate::snapshot::{EntityInfo, OriginalValueInfo, Snapshot};
use crate::{
    Entity, EntityCollection, MonitorConfig, TrackedEntity, TrackerError, TrackerResult, Value,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};
use trackable_model::{DescriptorCache, EntityType, TypeDescriptors};
use trackable_types::{CollectionId, EntityId, EntityState, MonitorId};

struct AttachedCollection {
    collection: WeakCollection,
    /// Membership at attach / last accept.
    baseline: Vec<Entity>,
}

#[derive(Default)]
struct Registry {
    entities: HashMap<EntityId, EntityInfo>,
    collections: HashMap<CollectionId, AttachedCollection>,
    next_seq: u64,
    is_changed: bool,
    disposed: bool,
}

impl Registry {
    /// Records a new value; returns it if it differs from the old one.
    fn set_changed(&mut self, value: bool) -> Option<bool> {
        (self.is_changed != value).then(|| {
            self.is_changed = value;
            value
        })
    }

    /// Recomputes `is_changed` from entity states. Callers must not hold
    /// any entity's tracking lock.
    fn refresh(&mut self) -> Option<bool> {
        let dirty = self
            .entities
            .values()
            .any(|info| info.entity.tracking().state.is_dirty());
        self.set_changed(dirty)
    }

    /// Entity ids in registration order.
    fn ordered_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<(u64, EntityId)> = self
            .entities
            .iter()
            .map(|(id, info)| (info.seq, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    fn ordered_where(&self, mut predicate: impl FnMut(EntityState) -> bool) -> Vec<Entity> {
        let mut infos: Vec<&EntityInfo> = self
            .entities
            .values()
            .filter(|info| predicate(info.entity.tracking().state))
            .collect();
        infos.sort_unstable_by_key(|info| info.seq);
        infos.into_iter().map(|info| info.entity.clone()).collect()
    }

    fn prune_collections(&mut self) {
        self.collections
            .retain(|_, attached| attached.collection.upgrade().is_some());
    }
}

struct MonitorInner {
    id: MonitorId,
    config: MonitorConfig,
    descriptors: DescriptorCache,
    registry: Mutex<Registry>,
    entity_changed: Listeners<EntityChanged>,
    is_changed: Listeners<bool>,
}

/// Tracks a set of entities and the collections that hold them.
///
/// `Monitor` is a cheap, cloneable handle. Entities keep only a weak handle
/// back to it, so dropping the last `Monitor` detaches everything it
/// tracked.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

#[derive(Clone)]
pub(crate) struct WeakMonitor(Weak<MonitorInner>);

impl WeakMonitor {
    pub(crate) fn upgrade(&self) -> Option<Monitor> {
        self.0.upgrade().map(|inner| Monitor { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    fn points_to(&self, monitor: &Monitor) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&monitor.inner))
    }
}

impl fmt::Debug for WeakMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakMonitor(..)")
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("Monitor")
            .field("id", &self.inner.id)
            .field("entities", &registry.entities.len())
            .field("collections", &registry.collections.len())
            .field("is_changed", &registry.is_changed)
            .finish()
    }
}

impl PartialEq for Monitor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Monitor {}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    #[must_use]
    pub fn with_config(config: MonitorConfig) -> Self {
        let descriptors = DescriptorCache::with_exclusions(config.excluded_properties.iter().cloned());
        Self {
            inner: Arc::new(MonitorInner {
                id: MonitorId::new(),
                config,
                descriptors,
                registry: Mutex::new(Registry::default()),
                entity_changed: Listeners::default(),
                is_changed: Listeners::default(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> MonitorId {
        self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// True iff some tracked entity is new, modified or deleted.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.inner.registry.lock().is_changed
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.lock().entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.lock().entities.is_empty()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.registry.lock().disposed
    }

    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.inner
            .registry
            .lock()
            .entities
            .get(&entity.id())
            .is_some_and(|info| info.entity.ptr_eq(entity))
    }

    /// Trackable descriptors of a type, as this monitor sees them (after
    /// exclusions).
    pub fn descriptors_for(&self, entity_type: &EntityType) -> Arc<TypeDescriptors> {
        self.inner.descriptors.descriptors_for(entity_type)
    }

    // ── Registration ─────────────────────────────────────────────

    /// Starts tracking a single entity.
    ///
    /// Snapshots every trackable property, marks the entity unmodified and
    /// attaches this monitor to the entity's collections. Fails with
    /// [`TrackerError::AlreadyTracked`] if this or another live monitor
    /// already tracks it.
    pub fn apply(&self, entity: &Entity) -> TrackerResult<()> {
        let mut registry = self.inner.registry.lock();
        self.register(&mut registry, entity)
    }

    /// Applies each entity in turn, stopping at the first error. Entities
    /// applied before the error stay tracked.
    pub fn apply_all<'a, I>(&self, entities: I) -> TrackerResult<()>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        entities.into_iter().try_for_each(|entity| self.apply(entity))
    }

    /// Applies every entity reachable from `root`.
    ///
    /// Already-tracked entities are skipped together with their subtree;
    /// every collection met on the way is attached to this monitor. The walk
    /// stops at the first error; entities applied before it stay tracked.
    pub fn apply_graph(&self, root: impl Into<Node>) -> TrackerResult<()> {
        let mut applied = 0_usize;
        graph::walk(
            root.into(),
            &self.inner.descriptors,
            |node| -> TrackerResult<bool> {
                match node {
                    Node::Entity(entity) => {
                        if self.contains(entity) {
                            return Ok(false);
                        }
                        self.apply(entity)?;
                        applied += 1;
                        Ok(true)
                    }
                    Node::Collection(collection) => {
                        self.attach_collection(collection);
                        Ok(true)
                    }
                }
            },
        )?;
        debug!(monitor_id = %self.inner.id, applied, "graph applied");
        Ok(())
    }

    /// Visits every node reachable from `root` once, depth-first.
    /// Returning `false` from `visit` skips that node's subtree.
    pub fn traverse_graph<F>(&self, root: impl Into<Node>, mut visit: F)
    where
        F: FnMut(&Node) -> bool,
    {
        let result: Result<(), Infallible> =
            graph::walk(root.into(), &self.inner.descriptors, |node| Ok(visit(node)));
        if let Err(never) = result {
            match never {}
        }
    }

    /// Stops tracking one entity. Its state becomes detached.
    pub fn detach(&self, entity: &Entity) -> TrackerResult<()> {
        if !self.contains(entity) {
            return Err(TrackerError::NotTracked { entity: entity.id() });
        }
        self.forget(entity);
        debug!(monitor_id = %self.inner.id, entity_id = %entity.id(), "entity detached");
        Ok(())
    }

    /// Forgets every entity and collection. The monitor stays usable.
    pub fn clear(&self) {
        let transition = {
            let mut registry = self.inner.registry.lock();
            self.release_all(&mut registry);
            registry.set_changed(false)
        };
        self.notify_is_changed(transition);
    }

    /// Forgets everything and refuses further registrations.
    pub fn dispose(&self) {
        let transition = {
            let mut registry = self.inner.registry.lock();
            self.release_all(&mut registry);
            registry.disposed = true;
            registry.set_changed(false)
        };
        self.inner.descriptors.clear();
        self.notify_is_changed(transition);
        self.inner.entity_changed.clear();
        self.inner.is_changed.clear();
        debug!(monitor_id = %self.inner.id, "monitor disposed");
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Every tracked entity, in registration order.
    #[must_use]
    pub fn tracked_entities(&self) -> Vec<Entity> {
        self.inner.registry.lock().ordered_where(|_| true)
    }

    /// Tracked entities in `state`, in registration order.
    #[must_use]
    pub fn items_in_state(&self, state: EntityState) -> Vec<Entity> {
        self.inner
            .registry
            .lock()
            .ordered_where(|current| current == state)
    }

    #[must_use]
    pub fn get_added_items(&self) -> Vec<Entity> {
        self.items_in_state(EntityState::New)
    }

    #[must_use]
    pub fn get_changed_items(&self) -> Vec<Entity> {
        self.items_in_state(EntityState::Modified)
    }

    #[must_use]
    pub fn get_deleted_items(&self) -> Vec<Entity> {
        self.items_in_state(EntityState::Deleted)
    }

    #[must_use]
    pub fn get_added_items_of<T: TrackedEntity>(&self) -> Vec<T> {
        typed(self.get_added_items())
    }

    #[must_use]
    pub fn get_changed_items_of<T: TrackedEntity>(&self) -> Vec<T> {
        typed(self.get_changed_items())
    }

    #[must_use]
    pub fn get_deleted_items_of<T: TrackedEntity>(&self) -> Vec<T> {
        typed(self.get_deleted_items())
    }

    /// Entities reachable from `root` (including it) that satisfy
    /// `predicate`, in traversal order.
    pub fn reachable_from<F>(&self, root: impl Into<Node>, mut predicate: F) -> Vec<Entity>
    where
        F: FnMut(&Entity) -> bool,
    {
        graph::collect(root.into(), &self.inner.descriptors)
            .into_iter()
            .filter_map(|node| match node {
                Node::Entity(entity) => predicate(&entity).then_some(entity),
                Node::Collection(_) => None,
            })
            .collect()
    }

    pub fn changed_from(&self, root: impl Into<Node>) -> Vec<Entity> {
        self.reachable_from(root, |e| e.state() == EntityState::Modified)
    }

    pub fn added_from(&self, root: impl Into<Node>) -> Vec<Entity> {
        self.reachable_from(root, |e| e.state() == EntityState::New)
    }

    pub fn deleted_from(&self, root: impl Into<Node>) -> Vec<Entity> {
        self.reachable_from(root, |e| e.state() == EntityState::Deleted)
    }

    /// Clears every entity collection reachable from `root`. Each clear is
    /// intercepted like any other removal.
    pub fn clear_all_collections_from(&self, root: impl Into<Node>) {
        let collections: Vec<EntityCollection> =
            graph::collect(root.into(), &self.inner.descriptors)
                .into_iter()
                .filter_map(|node| match node {
                    Node::Collection(collection) => Some(collection),
                    Node::Entity(_) => None,
                })
                .collect();
        for collection in &collections {
            collection.clear();
        }
    }

    /// The recorded original value of a property.
    ///
    /// `Ok(None)` if the property has no snapshot (unknown, excluded or
    /// unmapped).
    pub fn original_value(&self, entity: &Entity, property: &str) -> TrackerResult<Option<Value>> {
        let registry = self.inner.registry.lock();
        let info = registry
            .entities
            .get(&entity.id())
            .ok_or(TrackerError::NotTracked { entity: entity.id() })?;
        Ok(info.original(property).map(|o| o.value.to_value()))
    }

    /// All recorded original values of an entity.
    pub fn original_values(&self, entity: &Entity) -> TrackerResult<BTreeMap<String, Value>> {
        let registry = self.inner.registry.lock();
        let info = registry
            .entities
            .get(&entity.id())
            .ok_or(TrackerError::NotTracked { entity: entity.id() })?;
        Ok(info
            .original_values
            .iter()
            .map(|(name, original)| (name.clone(), original.value.to_value()))
            .collect())
    }

    /// A copy of the tracking record of an entity.
    pub fn entity_info(&self, entity: &Entity) -> TrackerResult<EntityInfo> {
        self.inner
            .registry
            .lock()
            .entities
            .get(&entity.id())
            .cloned()
            .ok_or(TrackerError::NotTracked { entity: entity.id() })
    }

    /// Compares two entities on their structural properties.
    ///
    /// Scalar, text, array, value-collection and object properties must be
    /// equal. Reference and entity-collection properties are identities and
    /// take no part.
    #[must_use]
    pub fn entity_equals(&self, a: &Entity, b: &Entity) -> bool {
        if a.ptr_eq(b) {
            return true;
        }
        if a.entity_type() != b.entity_type() {
            return false;
        }
        self.inner
            .descriptors
            .descriptors_for(a.entity_type())
            .trackable
            .iter()
            .filter(|p| p.kind.is_structural())
            .all(|p| a.read_raw(&p.name).structural_eq(&b.read_raw(&p.name)))
    }

    // ── Accept / reject ──────────────────────────────────────────

    /// Makes the current state the new baseline.
    ///
    /// New and modified entities are re-snapshotted and become unmodified;
    /// deleted entities are untracked. Attached collections take their
    /// current membership as the new baseline.
    pub fn accept_changes(&self) {
        let transition = {
            let mut registry = self.inner.registry.lock();
            let (mut accepted, mut removed) = (0_usize, 0_usize);

            for id in registry.ordered_ids() {
                let Some(entity) = registry.entities.get(&id).map(|i| i.entity.clone()) else {
                    continue;
                };
                let state = entity.tracking().state;
                match state {
                    EntityState::New | EntityState::Modified => {
                        let (originals, _) = self.capture_originals(&entity);
                        if let Some(info) = registry.entities.get_mut(&id) {
                            info.original_values = originals;
                        }
                        let mut tracking = entity.tracking();
                        tracking.state = EntityState::Unmodified;
                        tracking.changed.clear();
                        accepted += 1;
                    }
                    EntityState::Deleted => {
                        registry.entities.remove(&id);
                        entity.tracking().detach();
                        removed += 1;
                    }
                    EntityState::Unmodified | EntityState::Detached => {}
                }
            }

            registry.prune_collections();
            if self.inner.config.restore_collection_membership {
                for attached in registry.collections.values_mut() {
                    if let Some(collection) = attached.collection.upgrade() {
                        attached.baseline = collection.to_vec();
                    }
                }
            }

            debug!(monitor_id = %self.inner.id, accepted, removed, "changes accepted");
            registry.refresh()
        };
        self.notify_is_changed(transition);
    }

    /// Rolls every tracked entity back to its baseline.
    ///
    /// New entities are untracked and disposed; modified and deleted ones
    /// get their changed properties restored and become unmodified.
    /// Attached collections get their baseline membership back. Restores
    /// bypass interception; property listeners fire for every restored
    /// property afterwards.
    pub fn reject_changes(&self) {
        let mut restored: Vec<(Entity, Vec<String>)> = Vec::new();
        let mut dropped: Vec<Entity> = Vec::new();

        let transition = {
            let mut registry = self.inner.registry.lock();

            registry.prune_collections();
            if self.inner.config.restore_collection_membership {
                for attached in registry.collections.values() {
                    if let Some(collection) = attached.collection.upgrade() {
                        collection.replace_items_raw(attached.baseline.clone());
                    }
                }
            }

            for id in registry.ordered_ids() {
                let Some(info) = registry.entities.get(&id) else {
                    continue;
                };
                let entity = info.entity.clone();
                let state = entity.tracking().state;
                match state {
                    EntityState::New => {
                        registry.entities.remove(&id);
                        entity.tracking().detach();
                        dropped.push(entity);
                    }
                    EntityState::Modified | EntityState::Deleted => {
                        let properties = self.restore_originals(info);
                        let mut tracking = entity.tracking();
                        tracking.state = EntityState::Unmodified;
                        tracking.changed.clear();
                        drop(tracking);
                        restored.push((entity, properties));
                    }
                    EntityState::Unmodified | EntityState::Detached => {}
                }
            }

            debug!(
                monitor_id = %self.inner.id,
                restored = restored.len(),
                dropped = dropped.len(),
                "changes rejected"
            );
            registry.refresh()
        };

        for entity in &dropped {
            entity.dispose_raw();
        }
        self.notify_is_changed(transition);
        for (entity, properties) in &restored {
            for property in properties {
                self.on_entity_changed(entity, property);
                entity.emit_property_changed(property);
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────

    /// Raises the entity-changed event. Called after every write to a
    /// tracked entity.
    pub fn on_entity_changed(&self, entity: &Entity, property: &str) {
        self.inner.entity_changed.emit(&EntityChanged {
            entity: entity.clone(),
            property: property.to_owned(),
        });
    }

    pub fn subscribe_entity_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EntityChanged) + Send + Sync + 'static,
    {
        self.inner.entity_changed.subscribe(handler)
    }

    /// Subscribes to `is_changed` transitions. The handler only runs when
    /// the flag actually flips.
    pub fn subscribe_is_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.is_changed.subscribe(move |value: &bool| handler(*value))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.entity_changed.unsubscribe(id) || self.inner.is_changed.unsubscribe(id)
    }

    // ── Crate internals ──────────────────────────────────────────

    pub(crate) fn downgrade(&self) -> WeakMonitor {
        WeakMonitor(Arc::downgrade(&self.inner))
    }

    pub(crate) fn notify_is_changed(&self, transition: Option<bool>) {
        if let Some(value) = transition {
            trace!(monitor_id = %self.inner.id, is_changed = value, "is_changed flipped");
            self.inner.is_changed.emit(&value);
        }
    }

    /// Re-evaluates an entity after `property` is about to take `value`.
    pub(crate) fn update_entity_state(
        &self,
        entity: &Entity,
        property: &str,
        value: &Value,
    ) -> Option<bool> {
        let mut registry = self.inner.registry.lock();
        let original = registry.entities.get(&entity.id())?.original(property)?;
        let equal = original.value.matches(value);
        {
            let mut tracking = entity.tracking();
            let from = tracking.state;
            if equal {
                tracking.changed.retain(|p| p != property);
                if tracking.state == EntityState::Modified && tracking.changed.is_empty() {
                    tracking.state = EntityState::Unmodified;
                }
            } else {
                tracking.mark_changed(property);
                if tracking.state == EntityState::Unmodified {
                    tracking.state = EntityState::Modified;
                }
            }
            if from != tracking.state {
                trace!(
                    entity_id = %entity.id(),
                    property,
                    from = %from,
                    to = %tracking.state,
                    "entity state changed"
                );
            }
        }
        if equal {
            registry.refresh()
        } else {
            registry.set_changed(true)
        }
    }

    /// Marks a value-collection property as changed regardless of content.
    pub(crate) fn mark_property_changed(&self, entity: &Entity, property: &str) -> Option<bool> {
        let mut registry = self.inner.registry.lock();
        let info = registry.entities.get(&entity.id())?;
        if info.original(property).is_none() {
            return None;
        }
        {
            let mut tracking = entity.tracking();
            tracking.mark_changed(property);
            if tracking.state == EntityState::Unmodified {
                tracking.state = EntityState::Modified;
                trace!(entity_id = %entity.id(), property, "value collection mutated");
            }
        }
        registry.set_changed(true)
    }

    /// Collection insert hook.
    pub(crate) fn track_inserted(&self, entity: &Entity) -> TrackerResult<()> {
        let transition = {
            let mut registry = self.inner.registry.lock();
            if registry.disposed || registry.entities.contains_key(&entity.id()) {
                return Ok(());
            }
            self.register(&mut registry, entity)?;
            entity.tracking().state = EntityState::New;
            trace!(entity_id = %entity.id(), "entity added");
            registry.set_changed(true)
        };
        self.notify_is_changed(transition);
        Ok(())
    }

    /// Collection removal hook.
    pub(crate) fn track_removed(&self, entities: &[Entity]) {
        let mut dropped = Vec::new();
        let transition = {
            let mut registry = self.inner.registry.lock();
            for entity in entities {
                if !registry.entities.contains_key(&entity.id()) {
                    continue;
                }
                let mut tracking = entity.tracking();
                let state = tracking.state;
                match state {
                    EntityState::New => {
                        tracking.detach();
                        drop(tracking);
                        registry.entities.remove(&entity.id());
                        if self.inner.config.dispose_removed_new {
                            dropped.push(entity.clone());
                        }
                        trace!(entity_id = %entity.id(), "new entity removed");
                    }
                    EntityState::Unmodified | EntityState::Modified => {
                        tracking.state = EntityState::Deleted;
                        trace!(entity_id = %entity.id(), "entity deleted");
                    }
                    EntityState::Deleted | EntityState::Detached => {}
                }
            }
            registry.refresh()
        };
        for entity in &dropped {
            entity.dispose_raw();
        }
        self.notify_is_changed(transition);
    }

    /// Removes an entity from the registry without touching its store.
    pub(crate) fn forget(&self, entity: &Entity) {
        let transition = {
            let mut registry = self.inner.registry.lock();
            if registry.entities.remove(&entity.id()).is_none() {
                return;
            }
            entity.tracking().detach();
            registry.refresh()
        };
        self.notify_is_changed(transition);
    }

    pub(crate) fn attach_collection(&self, collection: &EntityCollection) {
        let mut registry = self.inner.registry.lock();
        if registry.disposed {
            warn!(collection_id = %collection.id(), "attach to a disposed monitor ignored");
            return;
        }
        self.attach_locked(&mut registry, collection);
    }

    pub(crate) fn detach_collection(&self, collection: &EntityCollection) {
        let mut registry = self.inner.registry.lock();
        registry.collections.remove(&collection.id());
        let mut state = collection.state_mut();
        if state.monitor.as_ref().is_some_and(|m| m.points_to(self)) {
            state.monitor = None;
        }
    }

    fn attach_locked(&self, registry: &mut Registry, collection: &EntityCollection) {
        let baseline = {
            let mut state = collection.state_mut();
            match &state.monitor {
                Some(current) if current.points_to(self) => return,
                Some(current) if current.is_alive() => {
                    warn!(
                        collection_id = %collection.id(),
                        monitor_id = %self.inner.id,
                        "collection already attached to another monitor"
                    );
                    return;
                }
                _ => {}
            }
            state.monitor = Some(self.downgrade());
            state.items.clone()
        };
        registry.collections.insert(
            collection.id(),
            AttachedCollection {
                collection: collection.downgrade(),
                baseline,
            },
        );
        trace!(collection_id = %collection.id(), "collection attached");
    }

    fn register(&self, registry: &mut Registry, entity: &Entity) -> TrackerResult<()> {
        if registry.disposed {
            return Err(TrackerError::Disposed);
        }
        if registry.entities.contains_key(&entity.id()) {
            return Err(TrackerError::AlreadyTracked { entity: entity.id() });
        }
        if let Some(current) = &entity.tracking().monitor
            && current.is_alive()
            && !current.points_to(self)
        {
            return Err(TrackerError::AlreadyTracked { entity: entity.id() });
        }

        let (original_values, collections) = self.capture_originals(entity);
        {
            let mut tracking = entity.tracking();
            tracking.state = EntityState::Unmodified;
            tracking.changed.clear();
            tracking.monitor = Some(self.downgrade());
        }

        let seq = registry.next_seq;
        registry.next_seq += 1;
        registry.entities.insert(
            entity.id(),
            EntityInfo {
                entity_type: entity.entity_type().clone(),
                entity: entity.clone(),
                original_values,
                seq,
            },
        );
        for collection in &collections {
            self.attach_locked(registry, collection);
        }

        debug!(
            monitor_id = %self.inner.id,
            entity_id = %entity.id(),
            entity_type = entity.entity_type().name(),
            "entity applied"
        );
        Ok(())
    }

    /// Snapshots every trackable property. Also returns the entity
    /// collections found, for attaching.
    fn capture_originals(
        &self,
        entity: &Entity,
    ) -> (HashMap<String, OriginalValueInfo>, Vec<EntityCollection>) {
        let descriptors = self.inner.descriptors.descriptors_for(entity.entity_type());
        let mut originals = HashMap::with_capacity(descriptors.trackable.len());
        let mut collections = Vec::new();

        for descriptor in &descriptors.trackable {
            let value = entity.read_raw(&descriptor.name);
            if let Value::Entities(collection) = &value {
                collections.push(collection.clone());
            }
            match Snapshot::capture(descriptor.kind, &value) {
                Some(snapshot) => {
                    originals.insert(
                        descriptor.name.clone(),
                        OriginalValueInfo::new(descriptor, snapshot),
                    );
                }
                None => debug!(
                    entity_id = %entity.id(),
                    property = %descriptor.name,
                    kind = ?descriptor.kind,
                    "property cannot be snapshotted, excluded from tracking"
                ),
            }
        }
        (originals, collections)
    }

    /// Writes back every snapshotted property that differs from its
    /// original, in declaration order. Returns the restored names.
    fn restore_originals(&self, info: &EntityInfo) -> Vec<String> {
        let descriptors = self.inner.descriptors.descriptors_for(&info.entity_type);
        let mut restored = Vec::new();
        for descriptor in &descriptors.trackable {
            let Some(original) = info.original(&descriptor.name) else {
                continue;
            };
            let current = info.entity.read_raw(&descriptor.name);
            if original.value.matches(&current) {
                continue;
            }
            info.entity
                .write_raw(&descriptor.name, original.value.restore(&current));
            restored.push(descriptor.name.clone());
        }
        restored
    }

    fn release_all(&self, registry: &mut Registry) {
        for info in registry.entities.values() {
            info.entity.tracking().detach();
        }
        registry.entities.clear();
        for attached in registry.collections.values() {
            if let Some(collection) = attached.collection.upgrade() {
                let mut state = collection.state_mut();
                if state.monitor.as_ref().is_some_and(|m| m.points_to(self)) {
                    state.monitor = None;
                }
            }
        }
        registry.collections.clear();
    }
}

fn typed<T: TrackedEntity>(entities: Vec<Entity>) -> Vec<T> {
    let entity_type = T::entity_type();
    entities
        .into_iter()
        .filter(|e| *e.entity_type() == entity_type)
        .map(T::from_entity)
        .collect()
}
