#![forbid(unsafe_code)]

//! Payload-less broadcast notifications.
//!
//! [`Event`] is the carrier for "something changed, go re-read" signals —
//! an observer list with synchronous delivery and no value attached.
//! No ordering guarantee is promised across subscribers.

use std::sync::{Arc, Mutex, Weak};

use crate::lock;
use crate::subscription::Subscription;

type Listener = Arc<dyn Fn() + Send + Sync>;

struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// A broadcast notification with no payload.
#[derive(Clone)]
pub struct Event {
    inner: Arc<Mutex<Listeners>>,
}

impl Event {
    /// Create an event with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Attach a listener; it fires on every subsequent [`Event::emit`].
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut listeners = lock(&self.inner);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::new(listener)));
            id
        };
        let weak: Weak<Mutex<Listeners>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Synchronously invoke every current listener.
    pub fn emit(&self) {
        let listeners: Vec<Listener> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).entries.len()
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
