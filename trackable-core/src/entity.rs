//! Trackable entities.
//!
//! An [`Entity`] is a shared handle to a typed property store plus its
//! tracking record (state, changed-property set, owning monitor). Writes go
//! through [`Entity::set`], which validates the value against the property
//! descriptor and lets the owning monitor re-evaluate the entity's state.
//!
//! The entity keeps only a weak handle to its monitor. Once every
//! [`Monitor`] handle is dropped the entity reports [`EntityState::Detached`].

use crate::events::{Listeners, PropertyChanged, SubscriptionId};
use crate::monitor::WeakMonitor;
use crate::{
    EntityCollection, FromValue, Monitor, TrackerError, TrackerResult, Value, ValueCollection,
    clone,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;
use trackable_model::{EntityType, PropertyDescriptor, PropertyKind};
use trackable_types::{EntityId, EntityState};

/// Typed wrapper around an [`Entity`] of one known type.
///
/// Implementations usually keep the type in a `OnceLock` and expose typed
/// accessors over `get_as`/`set`.
pub trait TrackedEntity: Sized {
    /// The entity type every wrapped entity has.
    fn entity_type() -> EntityType;

    /// Wraps an entity of [`entity_type`](Self::entity_type).
    fn from_entity(entity: Entity) -> Self;

    fn entity(&self) -> &Entity;
}

#[derive(Debug)]
pub(crate) struct Tracking {
    pub(crate) state: EntityState,
    /// Tracked properties whose current value differs from the snapshot.
    pub(crate) changed: Vec<String>,
    pub(crate) monitor: Option<WeakMonitor>,
    pub(crate) disposed: bool,
}

impl Tracking {
    pub(crate) fn detach(&mut self) {
        self.state = EntityState::Detached;
        self.changed.clear();
        self.monitor = None;
    }

    pub(crate) fn mark_changed(&mut self, property: &str) {
        if !self.changed.iter().any(|p| p == property) {
            self.changed.push(property.to_owned());
        }
    }
}

struct EntityInner {
    id: EntityId,
    entity_type: EntityType,
    properties: RwLock<HashMap<String, Value>>,
    tracking: Mutex<Tracking>,
    listeners: Listeners<PropertyChanged>,
}

/// Shared handle to a trackable entity.
///
/// Cloning the handle does not copy the entity; use
/// [`shallow_clone`](Self::shallow_clone) or [`deep_clone`](Self::deep_clone)
/// for that.
///
/// References between entities are strong. A graph with back-references
/// (a line pointing at its order, say) is a reference cycle and is only
/// freed once one side is [`dispose`](Self::dispose)d or the link is reset
/// to null.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

#[derive(Clone)]
pub(crate) struct WeakEntity(Weak<EntityInner>);

impl WeakEntity {
    pub(crate) fn upgrade(&self) -> Option<Entity> {
        self.0.upgrade().map(|inner| Entity { inner })
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("type", &self.inner.entity_type.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Handles compare by identity.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Entity {}

impl Entity {
    /// Creates a detached entity with every property unset (null).
    #[must_use]
    pub fn new(entity_type: EntityType) -> Self {
        Self::with_id(EntityId::new(), entity_type)
    }

    #[must_use]
    pub fn with_id(id: EntityId, entity_type: EntityType) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                id,
                entity_type,
                properties: RwLock::new(HashMap::new()),
                tracking: Mutex::new(Tracking {
                    state: EntityState::Detached,
                    changed: Vec::new(),
                    monitor: None,
                    disposed: false,
                }),
                listeners: Listeners::default(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    #[must_use]
    pub fn entity_type(&self) -> &EntityType {
        &self.inner.entity_type
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Properties ───────────────────────────────────────────────

    /// Current value of a declared property. Unset properties read as null.
    pub fn get(&self, property: &str) -> TrackerResult<Value> {
        self.descriptor(property)?;
        Ok(self.read_raw(property))
    }

    /// Current value converted to `T`.
    pub fn get_as<T: FromValue>(&self, property: &str) -> TrackerResult<T> {
        let value = self.get(property)?;
        T::from_value(&value).ok_or_else(|| type_mismatch::<T>(property, &value))
    }

    /// Writes a property and re-evaluates the entity's tracking state.
    ///
    /// If the entity is tracked, the value is compared with the original
    /// snapshot: a difference marks the property changed (and an
    /// unmodified entity modified); a match un-marks it (and returns a
    /// modified entity with no other changes to unmodified). New and deleted
    /// entities keep their state. The monitor's entity-changed listeners and
    /// this entity's property listeners fire afterwards.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> TrackerResult<()> {
        let value = value.into();
        let descriptor = self.descriptor(property)?;
        if !descriptor.writable {
            return Err(TrackerError::ReadOnlyProperty {
                entity_type: self.inner.entity_type.name().to_owned(),
                property: property.to_owned(),
            });
        }
        if !value.fits(descriptor) {
            return Err(TrackerError::TypeMismatch {
                property: property.to_owned(),
                expected: format!("{:?}", descriptor.kind),
                found: value.kind_name(),
            });
        }
        if let Value::Values(collection) = &value {
            collection.bind_owner(self, property);
        }

        let monitor = self.monitor();
        let transition = monitor
            .as_ref()
            .and_then(|m| m.update_entity_state(self, property, &value));
        let attach = match (&monitor, &value) {
            (Some(_), Value::Entities(collection)) => Some(collection.clone()),
            _ => None,
        };
        self.inner
            .properties
            .write()
            .insert(property.to_owned(), value);

        if let Some(monitor) = monitor {
            if let Some(collection) = attach {
                monitor.attach_collection(&collection);
            }
            monitor.notify_is_changed(transition);
            monitor.on_entity_changed(self, property);
        }
        self.emit_property_changed(property);
        Ok(())
    }

    /// Readable property name → current value, skipping `except`.
    #[must_use]
    pub fn property_value_pairs(&self, except: &[&str]) -> BTreeMap<String, Value> {
        let properties = self.inner.properties.read();
        self.inner
            .entity_type
            .properties()
            .iter()
            .filter(|p| p.readable && !except.contains(&p.name.as_str()))
            .map(|p| {
                let value = properties.get(&p.name).cloned().unwrap_or_default();
                (p.name.clone(), value)
            })
            .collect()
    }

    /// Gives every writable collection property a fresh, empty instance.
    pub fn init_collections(&self) -> TrackerResult<()> {
        let entity_type = &self.inner.entity_type;
        for descriptor in entity_type.properties().iter().filter(|p| p.writable) {
            match descriptor.kind {
                PropertyKind::EntityCollection => {
                    self.set(&descriptor.name, EntityCollection::new())?;
                }
                PropertyKind::ValueCollection => {
                    self.set(&descriptor.name, ValueCollection::new())?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ── Tracking ─────────────────────────────────────────────────

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EntityState {
        let tracking = self.tracking();
        match &tracking.monitor {
            Some(monitor) if !monitor.is_alive() => EntityState::Detached,
            _ => tracking.state,
        }
    }

    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.state().is_tracked()
    }

    /// Properties whose current value differs from the original.
    #[must_use]
    pub fn changed_properties(&self) -> Vec<String> {
        self.tracking().changed.clone()
    }

    /// The monitor tracking this entity, if it is still alive.
    #[must_use]
    pub fn monitor(&self) -> Option<Monitor> {
        self.tracking().monitor.as_ref().and_then(WeakMonitor::upgrade)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.tracking().disposed
    }

    /// Original value of a tracked property, converted to `T`.
    ///
    /// Fails with [`TrackerError::NotTracked`] if no monitor tracks the
    /// entity. Returns `Ok(None)` if the property has no snapshot (unknown,
    /// excluded or unmapped).
    pub fn get_original_property<T: FromValue>(&self, property: &str) -> TrackerResult<Option<T>> {
        let monitor = self
            .monitor()
            .ok_or(TrackerError::NotTracked { entity: self.id() })?;
        let Some(value) = monitor.original_value(self, property)? else {
            return Ok(None);
        };
        T::from_value(&value)
            .map(Some)
            .ok_or_else(|| type_mismatch::<T>(property, &value))
    }

    /// Drops any current monitor and tracks this entity with a new one.
    pub fn trackable(&self) -> TrackerResult<Monitor> {
        if let Some(previous) = self.monitor() {
            previous.dispose();
        }
        let monitor = Monitor::new();
        monitor.apply(self)?;
        Ok(monitor)
    }

    /// Like [`trackable`](Self::trackable), but applies the whole graph
    /// reachable from this entity.
    pub fn trackable_graph(&self) -> TrackerResult<Monitor> {
        if let Some(previous) = self.monitor() {
            previous.dispose();
        }
        let monitor = Monitor::new();
        monitor.apply_graph(self)?;
        Ok(monitor)
    }

    /// Subscribes to property changes on this entity.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    // ── Cloning ──────────────────────────────────────────────────

    /// Detached copy of scalar, array, value-collection and object
    /// properties. References become null and entity collections empty.
    #[must_use]
    pub fn shallow_clone(&self) -> Self {
        clone::shallow_clone(self)
    }

    /// Detached copy of the whole reachable graph, preserving shared
    /// sub-entities and cycles.
    #[must_use]
    pub fn deep_clone(&self) -> Self {
        clone::deep_clone(self)
    }

    /// Clears the property store and removes the entity from its monitor.
    pub fn dispose(&self) {
        if let Some(monitor) = self.monitor() {
            monitor.forget(self);
        }
        self.dispose_raw();
        self.inner.listeners.clear();
        debug!(entity_id = %self.id(), "entity disposed");
    }

    // ── Crate internals ──────────────────────────────────────────

    pub(crate) fn downgrade(&self) -> WeakEntity {
        WeakEntity(Arc::downgrade(&self.inner))
    }

    pub(crate) fn tracking(&self) -> MutexGuard<'_, Tracking> {
        self.inner.tracking.lock()
    }

    pub(crate) fn read_raw(&self, property: &str) -> Value {
        self.inner
            .properties
            .read()
            .get(property)
            .cloned()
            .unwrap_or_default()
    }

    /// Stores a value without validation, tracking or notification.
    pub(crate) fn write_raw(&self, property: &str, value: Value) {
        if let Value::Values(collection) = &value {
            collection.bind_owner(self, property);
        }
        self.inner
            .properties
            .write()
            .insert(property.to_owned(), value);
    }

    pub(crate) fn dispose_raw(&self) {
        self.inner.properties.write().clear();
        let mut tracking = self.tracking();
        tracking.detach();
        tracking.disposed = true;
    }

    pub(crate) fn emit_property_changed(&self, property: &str) {
        self.inner.listeners.emit(&PropertyChanged {
            entity: self.id(),
            property: property.to_owned(),
        });
    }

    /// Called by an owned value collection after its contents changed.
    pub(crate) fn value_collection_changed(&self, property: &str) {
        if let Some(monitor) = self.monitor() {
            let transition = monitor.mark_property_changed(self, property);
            monitor.notify_is_changed(transition);
            monitor.on_entity_changed(self, property);
        }
        self.emit_property_changed(property);
    }

    fn descriptor(&self, property: &str) -> TrackerResult<&PropertyDescriptor> {
        self.inner
            .entity_type
            .property(property)
            .ok_or_else(|| TrackerError::UnknownProperty {
                entity_type: self.inner.entity_type.name().to_owned(),
                property: property.to_owned(),
            })
    }
}

fn type_mismatch<T>(property: &str, value: &Value) -> TrackerError {
    TrackerError::TypeMismatch {
        property: property.to_owned(),
        expected: std::any::type_name::<T>().to_owned(),
        found: value.kind_name(),
    }
}
