//! The publish/subscribe table.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifies one registration, for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Per-registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Drop the registration after its first delivery.
    pub once: bool,
}

struct Registration<E> {
    id: ListenerId,
    handler: Handler<E>,
    once: bool,
}

struct Table<K, E> {
    next_id: u64,
    listeners: HashMap<K, Vec<Registration<E>>>,
}

/// A typed publish/subscribe table keyed by topic.
///
/// Cloning is cheap and yields a handle to the same table. Handlers for a
/// topic run in registration order, outside the table lock, so a handler
/// may itself subscribe, unsubscribe or publish.
pub struct EventBus<K, E> {
    table: Arc<Mutex<Table<K, E>>>,
}

impl<K, E> Clone for EventBus<K, E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<K, E> Default for EventBus<K, E> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_id: 1,
                listeners: HashMap::new(),
            })),
        }
    }
}

impl<K, E> EventBus<K, E> {
    fn lock(&self) -> MutexGuard<'_, Table<K, E>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, E> fmt::Debug for EventBus<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.lock().listeners.values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("listeners", &total).finish()
    }
}

impl<K, E> EventBus<K, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`.
    pub fn subscribe<F>(&self, topic: K, handler: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe_with(topic, handler, SubscribeOptions::default())
    }

    /// Registers `handler` for `topic` with explicit options.
    pub fn subscribe_with<F>(&self, topic: K, handler: F, options: SubscribeOptions) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut table = self.lock();
        let id = ListenerId(table.next_id);
        table.next_id += 1;
        tracing::trace!(?topic, %id, once = options.once, "listener added");
        table.listeners.entry(topic).or_default().push(Registration {
            id,
            handler: Arc::new(handler),
            once: options.once,
        });
        id
    }

    /// Removes a registration. Returns `false` if it was not present.
    pub fn unsubscribe(&self, topic: &K, id: ListenerId) -> bool {
        let mut table = self.lock();
        let Some(registrations) = table.listeners.get_mut(topic) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            table.listeners.remove(topic);
        }
        if removed {
            tracing::trace!(?topic, %id, "listener removed");
        }
        removed
    }

    /// Detaches every registration on every topic.
    pub fn remove_all(&self) {
        let mut table = self.lock();
        let count: usize = table.listeners.values().map(Vec::len).sum();
        table.listeners.clear();
        tracing::debug!(count, "all listeners removed");
    }

    /// Number of registrations for `topic`.
    pub fn listener_count(&self, topic: &K) -> usize {
        self.lock().listeners.get(topic).map_or(0, Vec::len)
    }

    /// Number of registrations across all topics.
    pub fn total_listeners(&self) -> usize {
        self.lock().listeners.values().map(Vec::len).sum()
    }

    /// Delivers `event` to every handler registered for `topic`.
    ///
    /// Returns how many handlers completed without panicking.
    pub fn publish(&self, topic: &K, event: &E) -> usize {
        let handlers: Vec<(ListenerId, Handler<E>)> = {
            let mut table = self.lock();
            let Some(registrations) = table.listeners.get_mut(topic) else {
                return 0;
            };
            let handlers = registrations
                .iter()
                .map(|r| (r.id, Arc::clone(&r.handler)))
                .collect();
            registrations.retain(|r| !r.once);
            if registrations.is_empty() {
                table.listeners.remove(topic);
            }
            handlers
        };

        let mut delivered = 0;
        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(?topic, %id, "event handler panicked"),
            }
        }
        delivered
    }
}
