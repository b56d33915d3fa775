//! Session change fan-out
//!
//! Holds the current session and the registered observers. Every change
//! replaces the session wholesale and hands each observer its own clone.

use super::Session;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Observer invoked with the new session (or `None` after sign-out)
pub type SessionCallback = Box<dyn Fn(Option<Session>) + Send + Sync>;

type Observers = DashMap<u64, Arc<dyn Fn(Option<Session>) + Send + Sync>>;

/// Current session plus its observers
pub struct SessionHub {
    current: RwLock<Option<Session>>,
    observers: Arc<Observers>,
    next_id: AtomicU64,
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            observers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Replace the session and notify every observer
    pub fn replace(&self, session: Option<Session>) {
        *self.current.write() = session.clone();

        // Snapshot first so a callback may subscribe/unsubscribe without deadlocking
        let observers: Vec<_> = self.observers.iter().map(|e| e.value().clone()).collect();

        tracing::debug!(
            "Session {} -> notifying {} observer(s)",
            if session.is_some() { "set" } else { "cleared" },
            observers.len()
        );

        for observer in observers {
            observer(session.clone());
        }
    }

    pub fn subscribe(&self, callback: SessionCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.insert(id, Arc::from(callback));

        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration guard; the observer is removed when this is dropped
#[must_use = "dropping the subscription unregisters the observer"]
pub struct Subscription {
    id: u64,
    observers: Weak<Observers>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
