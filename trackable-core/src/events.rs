//! Change notifications.
//!
//! Listeners are plain callbacks. They are always invoked after the tracker
//! has released its locks, so a callback may freely query or mutate the
//! entity or monitor that raised it.

use crate::Entity;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use trackable_types::EntityId;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Raised by an entity after one of its properties changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChanged {
    pub entity: EntityId,
    pub property: String,
}

/// Raised by a monitor after a tracked entity changed.
#[derive(Debug, Clone)]
pub struct EntityChanged {
    pub entity: Entity,
    pub property: String,
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) struct Listeners<T> {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<T> Listeners<T> {
    pub(crate) fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub(crate) fn emit(&self, event: &T) {
        // Snapshot so handlers can (un)subscribe while being called.
        let handlers: Vec<Handler<T>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub(crate) fn clear(&self) {
        self.handlers.write().clear();
    }
}
