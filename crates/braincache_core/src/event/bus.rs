//! Synchronous in-process publish/subscribe.
//!
//! # Responsibility
//! - Deliver domain events to every current subscriber in subscription order.
//! - Hand out idempotent subscription handles.
//!
//! # Invariants
//! - Delivery happens on the publisher's thread, before `publish` returns.
//! - The registry lock is never held while a handler runs, so handlers may
//!   publish or (un)subscribe re-entrantly.

use crate::model::entity::EntityRef;
use parking_lot::Mutex;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Weak};

/// Identifies one entity repository in bus notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoId {
    Folders,
    Files,
}

impl RepoId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::Files => "files",
        }
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of domain notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    /// A live entity changed state (or was introduced to its repository).
    EntityChanged(EntityRef),
    /// A repository finished its initial directory load.
    RepositoryReady(RepoId),
    /// A repository finished writing one debounced batch to disk.
    RepositoryFlushed(RepoId),
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

/// Ordered handler list shared by the event bus and repository collection
/// observers.
pub struct Subscribers<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for Subscribers<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }
}

impl<E: 'static> Subscribers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler; it receives every value emitted after this call.
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, Arc::new(handler)));
            id
        };

        let registry: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().handlers.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Calls every current handler in subscription order.
    pub fn emit(&self, value: &E) {
        let handlers: Vec<Handler<E>> = self
            .registry
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(value);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by `subscribe`. Unsubscribing more than once is a no-op.
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Process-wide domain notification channel, shared by cloning.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Subscribers<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: DomainEvent) {
        self.subscribers.emit(&event);
    }

    pub fn subscribe(
        &self,
        handler: impl Fn(&DomainEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribers.subscribe(handler)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
