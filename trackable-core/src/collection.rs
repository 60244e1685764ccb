//! Tracked collections of entities.
//!
//! Mutations are intercepted and reported to the attached monitor:
//!
//! - inserting an entity the monitor does not track applies it and marks it
//!   [`New`](trackable_types::EntityState::New); tracked entities keep their state
//! - removing a `New` entity untracks it (and disposes it, by default);
//!   removing any other tracked entity marks it
//!   [`Deleted`](trackable_types::EntityState::Deleted)
//! - replacing an element is a removal followed by an insertion
//!
//! A collection with no monitor behaves like a plain list. Its mutations
//! start being tracked once a monitor attaches (via `apply`,
//! `apply_graph` or [`EntityCollection::attach`]).

use crate::monitor::WeakMonitor;
use crate::{Entity, Monitor, TrackerError, TrackerResult};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use trackable_types::CollectionId;

pub(crate) struct CollectionState {
    pub(crate) items: Vec<Entity>,
    pub(crate) monitor: Option<WeakMonitor>,
}

struct Inner {
    id: CollectionId,
    state: RwLock<CollectionState>,
}

/// Shared handle to an intercepted list of entities.
#[derive(Clone)]
pub struct EntityCollection {
    inner: Arc<Inner>,
}

#[derive(Clone)]
pub(crate) struct WeakCollection(Weak<Inner>);

impl WeakCollection {
    pub(crate) fn upgrade(&self) -> Option<EntityCollection> {
        self.0.upgrade().map(|inner| EntityCollection { inner })
    }
}

impl Default for EntityCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("EntityCollection")
            .field("id", &self.inner.id)
            .field("len", &state.items.len())
            .field("attached", &state.monitor.is_some())
            .finish()
    }
}

/// Handles compare by identity.
impl PartialEq for EntityCollection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EntityCollection {}

impl EntityCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    /// Builds a detached collection. Nothing is tracked until a monitor
    /// attaches.
    #[must_use]
    pub fn from_items(items: Vec<Entity>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: CollectionId::new(),
                state: RwLock::new(CollectionState {
                    items,
                    monitor: None,
                }),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> CollectionId {
        self.inner.id
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.read().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.read().items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Entity> {
        self.inner.state.read().items.get(index).cloned()
    }

    /// Snapshot of the current members.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Entity> {
        self.inner.state.read().items.clone()
    }

    /// Iterates over a snapshot of the members taken at call time.
    pub fn iter(&self) -> std::vec::IntoIter<Entity> {
        self.to_vec().into_iter()
    }

    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.position(entity).is_some()
    }

    /// Index of `entity`, compared by identity.
    #[must_use]
    pub fn position(&self, entity: &Entity) -> Option<usize> {
        self.inner
            .state
            .read()
            .items
            .iter()
            .position(|item| item.ptr_eq(entity))
    }

    /// The monitor this collection reports to, if still alive.
    #[must_use]
    pub fn monitor(&self) -> Option<Monitor> {
        self.inner
            .state
            .read()
            .monitor
            .as_ref()
            .and_then(WeakMonitor::upgrade)
    }

    /// Attaches a monitor. A collection already attached to another live
    /// monitor keeps that one.
    pub fn attach(&self, monitor: &Monitor) {
        monitor.attach_collection(self);
    }

    /// Stops reporting mutations.
    pub fn detach(&self) {
        if let Some(monitor) = self.monitor() {
            monitor.detach_collection(self);
        } else {
            self.inner.state.write().monitor = None;
        }
    }

    // ── Mutations ────────────────────────────────────────────────

    pub fn push(&self, entity: Entity) -> TrackerResult<()> {
        let len = self.len();
        self.insert(len, entity)
    }

    /// Inserts at `index`.
    ///
    /// Fails with [`TrackerError::AlreadyTracked`] if the entity belongs to a
    /// different monitor; the collection is left unchanged.
    pub fn insert(&self, index: usize, entity: Entity) -> TrackerResult<()> {
        let len = self.len();
        if index > len {
            return Err(TrackerError::IndexOutOfBounds { index, len });
        }
        if let Some(monitor) = self.monitor() {
            monitor.track_inserted(&entity)?;
        }
        let mut state = self.inner.state.write();
        let index = index.min(state.items.len());
        state.items.insert(index, entity);
        Ok(())
    }

    /// Appends every entity, stopping at the first failure.
    pub fn extend<I: IntoIterator<Item = Entity>>(&self, entities: I) -> TrackerResult<()> {
        entities.into_iter().try_for_each(|entity| self.push(entity))
    }

    /// Alias of [`extend`](Self::extend).
    pub fn add_range<I: IntoIterator<Item = Entity>>(&self, entities: I) -> TrackerResult<()> {
        self.extend(entities)
    }

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&self, index: usize, entity: Entity) -> TrackerResult<Entity> {
        let len = self.len();
        let Some(current) = self.get(index) else {
            return Err(TrackerError::IndexOutOfBounds { index, len });
        };
        if current.ptr_eq(&entity) {
            return Ok(current);
        }
        let monitor = self.monitor();
        if let Some(monitor) = &monitor {
            monitor.track_inserted(&entity)?;
        }
        let old = {
            let mut state = self.inner.state.write();
            match state.items.get_mut(index) {
                Some(slot) => std::mem::replace(slot, entity),
                None => return Err(TrackerError::IndexOutOfBounds { index, len }),
            }
        };
        if let Some(monitor) = monitor {
            monitor.track_removed(std::slice::from_ref(&old));
        }
        Ok(old)
    }

    /// Removes `entity` (by identity). Returns false if it is not a member.
    pub fn remove(&self, entity: &Entity) -> bool {
        self.position(entity)
            .and_then(|index| self.remove_at(index))
            .is_some()
    }

    pub fn remove_at(&self, index: usize) -> Option<Entity> {
        let removed = {
            let mut state = self.inner.state.write();
            (index < state.items.len()).then(|| state.items.remove(index))
        }?;
        if let Some(monitor) = self.monitor() {
            monitor.track_removed(std::slice::from_ref(&removed));
        }
        Some(removed)
    }

    /// Removes every member; each is handled like a single removal.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.inner.state.write().items);
        if removed.is_empty() {
            return;
        }
        if let Some(monitor) = self.monitor() {
            monitor.track_removed(&removed);
        }
    }

    // ── Crate internals ──────────────────────────────────────────

    pub(crate) fn downgrade(&self) -> WeakCollection {
        WeakCollection(Arc::downgrade(&self.inner))
    }

    pub(crate) fn state_mut(&self) -> parking_lot::RwLockWriteGuard<'_, CollectionState> {
        self.inner.state.write()
    }

    /// Overwrites the members without interception.
    pub(crate) fn replace_items_raw(&self, items: Vec<Entity>) {
        self.inner.state.write().items = items;
    }
}

impl IntoIterator for &EntityCollection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
