//! Collections of scalars owned by an entity.
//!
//! A [`ValueCollection`] knows which entity property holds it. Any change to
//! its contents marks that owner as modified, even if the net result equals
//! the original: content mutation is always a change.
//!
//! [`JsonCloneCodec`] round-trips the contents through `serde_json`; plug in
//! another [`CloneCodec`] for a different wire format.

use crate::entity::WeakEntity;
use crate::{Entity, TrackerError, TrackerResult};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use trackable_types::Scalar;

/// Serialization round-trip used by [`ValueCollection::deep_clone_with`].
pub trait CloneCodec {
    fn encode(&self, items: &[Scalar]) -> TrackerResult<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> TrackerResult<Vec<Scalar>>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCloneCodec;

impl CloneCodec for JsonCloneCodec {
    fn encode(&self, items: &[Scalar]) -> TrackerResult<Vec<u8>> {
        Ok(serde_json::to_vec(items)?)
    }

    fn decode(&self, bytes: &[u8]) -> TrackerResult<Vec<Scalar>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

struct Owner {
    entity: WeakEntity,
    property: String,
}

struct Inner {
    items: RwLock<Vec<Scalar>>,
    owner: RwLock<Option<Owner>>,
}

/// Shared, owner-aware list of scalars.
#[derive(Clone)]
pub struct ValueCollection {
    inner: Arc<Inner>,
}

impl Default for ValueCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.read().iter()).finish()
    }
}

impl<T: Into<Scalar>> FromIterator<T> for ValueCollection {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter.into_iter().map(Into::into).collect())
    }
}

impl ValueCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    #[must_use]
    pub fn from_items(items: Vec<Scalar>) -> Self {
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(items),
                owner: RwLock::new(None),
            }),
        }
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn items(&self) -> Vec<Scalar> {
        self.inner.items.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Scalar> {
        self.inner.items.read().get(index).cloned()
    }

    #[must_use]
    pub fn contains(&self, item: &Scalar) -> bool {
        self.inner.items.read().contains(item)
    }

    /// True if both handles share the same contents.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The entity and property this collection is bound to, if any.
    #[must_use]
    pub fn owner(&self) -> Option<(Entity, String)> {
        let owner = self.inner.owner.read();
        let owner = owner.as_ref()?;
        Some((owner.entity.upgrade()?, owner.property.clone()))
    }

    pub fn push(&self, item: impl Into<Scalar>) {
        self.inner.items.write().push(item.into());
        self.notify_owner();
    }

    pub fn insert(&self, index: usize, item: impl Into<Scalar>) -> TrackerResult<()> {
        {
            let mut items = self.inner.items.write();
            if index > items.len() {
                return Err(TrackerError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, item.into());
        }
        self.notify_owner();
        Ok(())
    }

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&self, index: usize, item: impl Into<Scalar>) -> TrackerResult<Scalar> {
        let old = {
            let mut items = self.inner.items.write();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(TrackerError::IndexOutOfBounds { index, len })?;
            std::mem::replace(slot, item.into())
        };
        self.notify_owner();
        Ok(old)
    }

    pub fn remove_at(&self, index: usize) -> Option<Scalar> {
        let removed = {
            let mut items = self.inner.items.write();
            (index < items.len()).then(|| items.remove(index))
        };
        if removed.is_some() {
            self.notify_owner();
        }
        removed
    }

    /// Removes the first element equal to `item`.
    pub fn remove(&self, item: &Scalar) -> bool {
        let removed = {
            let mut items = self.inner.items.write();
            let index = items.iter().position(|existing| existing == item);
            index.map(|index| items.remove(index))
        };
        if removed.is_some() {
            self.notify_owner();
        }
        removed.is_some()
    }

    pub fn clear(&self) {
        self.inner.items.write().clear();
        self.notify_owner();
    }

    /// Appends all items with a single owner notification.
    pub fn extend<I, T>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        self.inner
            .items
            .write()
            .extend(items.into_iter().map(Into::into));
        self.notify_owner();
    }

    /// Element-wise copy, not bound to any owner.
    #[must_use]
    pub fn clone_items(&self) -> Self {
        Self::from_items(self.items())
    }

    /// Copy produced by encoding and decoding the contents.
    pub fn deep_clone_with(&self, codec: &dyn CloneCodec) -> TrackerResult<Self> {
        let bytes = codec.encode(&self.inner.items.read())?;
        Ok(Self::from_items(codec.decode(&bytes)?))
    }

    pub(crate) fn bind_owner(&self, entity: &Entity, property: &str) {
        *self.inner.owner.write() = Some(Owner {
            entity: entity.downgrade(),
            property: property.to_owned(),
        });
    }

    /// Overwrites the contents without notifying the owner.
    pub(crate) fn replace_items_raw(&self, items: Vec<Scalar>) {
        *self.inner.items.write() = items;
    }

    fn notify_owner(&self) {
        let owner = {
            let owner = self.inner.owner.read();
            owner
                .as_ref()
                .and_then(|o| Some((o.entity.upgrade()?, o.property.clone())))
        };
        if let Some((entity, property)) = owner {
            entity.value_collection_changed(&property);
        }
    }
}
