#![forbid(unsafe_code)]

//! Copy-on-write handler registry.
//!
//! Registered handlers live in an atomically swapped `Arc<Vec<..>>`:
//! readers load a snapshot without locking, writers clone-push-store under
//! a small swap mutex. A fan-out that captured a snapshot keeps iterating
//! it untouched no matter how many adds or removals land meanwhile.
//!
//! Removal is by identity: every registration gets a monotonic id, and the
//! returned token removes exactly that occurrence — registering the same
//! closure twice yields two independently removable entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;
use futures::future::BoxFuture;

use weft_reactive::Subscription;

use crate::error::BoxError;
use crate::lock;

/// Future returned by a registered handler.
pub(crate) type HandlerFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Type-erased registered handler.
pub(crate) type Handler<T> = Arc<dyn Fn(T) -> HandlerFuture + Send + Sync>;

pub(crate) struct Entry<T> {
    id: u64,
    pub(crate) handler: Handler<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

struct RegistryInner<T> {
    entries: ArcSwap<Vec<Entry<T>>>,
    swap: Mutex<()>,
    next_id: AtomicU64,
}

pub(crate) struct Registry<T> {
    inner: Arc<RegistryInner<T>>,
}

impl<T: 'static> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: ArcSwap::from_pointee(Vec::new()),
                swap: Mutex::new(()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Append `handler` to the current snapshot; the returned token removes
    /// exactly this registration from whatever snapshot is current then.
    pub(crate) fn add(&self, handler: Handler<T>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let _swap = lock(&self.inner.swap);
            let current = self.inner.entries.load_full();
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Entry { id, handler });
            self.inner.entries.store(Arc::new(next));
        }
        let weak: Weak<RegistryInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let _swap = lock(&inner.swap);
                let current = inner.entries.load_full();
                if current.iter().any(|entry| entry.id == id) {
                    let next: Vec<Entry<T>> = current
                        .iter()
                        .filter(|entry| entry.id != id)
                        .cloned()
                        .collect();
                    inner.entries.store(Arc::new(next));
                }
            }
        })
    }

    /// Lock-free view of the handlers registered right now.
    pub(crate) fn snapshot(&self) -> Arc<Vec<Entry<T>>> {
        self.inner.entries.load_full()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.entries.load().len()
    }
}
