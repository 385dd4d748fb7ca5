#![forbid(unsafe_code)]

//! Shared boxed mutable values with change notification.
//!
//! An [`Observable<T>`] is a thread-safe cell plus a subscriber list.
//! Cloning the handle shares the cell, so several owners can read, write,
//! and observe the same value. This is the primitive a command's gate is
//! built from: the command closes the gate around an execution, and any
//! other owner of the same cell sees the write immediately.
//!
//! # Invariants
//!
//! 1. `set` notifies every subscriber on every write — **including** a write
//!    of a value equal to the current one. Listeners that only care about
//!    transitions should observe through [`Signal::dedup`](crate::Signal::dedup).
//! 2. Delivery is synchronous: all subscriber callbacks have returned by the
//!    time `set` returns.
//! 3. The value lock is released before callbacks run, so a callback may
//!    re-read (or even re-write) the observable without deadlocking.
//! 4. Subscribers run in registration order; a dropped [`Subscription`]
//!    never fires again.
//!
//! # Failure Modes
//!
//! - Callback panic: propagates to the writer; remaining subscribers of that
//!   notification cycle are skipped, but the value was already stored and
//!   later writes recover the poisoned locks.

use std::sync::{Arc, Mutex, Weak};

use crate::lock;
use crate::subscription::Subscription;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

struct Inner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Subscribers<T>>,
}

/// A shared mutable value with synchronous change notification.
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Observable<T> {
    /// Create a new observable holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Subscribers {
                    next_id: 0,
                    entries: Vec::new(),
                }),
            }),
        }
    }

    /// Read the current value through a borrow, without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.inner.value))
    }

    fn notify(&self, value: &T) {
        // Snapshot the callbacks so the subscriber lock is not held while
        // they run; a callback may subscribe, unsubscribe, or re-read.
        let callbacks: Vec<Callback<T>> = lock(&self.inner.subscribers)
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T: Clone> Observable<T> {
    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Store `value` and synchronously notify every subscriber.
    ///
    /// Notifies even when `value` equals the current value; transition-only
    /// listeners belong behind [`Signal::dedup`](crate::Signal::dedup).
    pub fn set(&self, value: T) {
        *lock(&self.inner.value) = value.clone();
        self.notify(&value);
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Subscribe to value writes.
    ///
    /// The callback fires on the writer's thread for every subsequent `set`.
    /// Dropping the returned [`Subscription`] detaches it.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut subs = lock(&self.inner.subscribers);
            let id = subs.next_id;
            subs.next_id += 1;
            subs.entries.push((id, Arc::new(callback)));
            id
        };
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.subscribers)
                    .entries
                    .retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with(|value| f.debug_struct("Observable").field("value", value).finish())
    }
}
