#![forbid(unsafe_code)]

//! Reactive primitives for the weft data-binding toolkit.
//!
//! This crate provides the change-tracking building blocks the command layer
//! is wired from:
//!
//! - [`Observable`]: a shared, boxed mutable value with change notification
//!   via subscriber callbacks.
//! - [`Signal`]: a derived, read-only stream over one or more observables,
//!   with combination ([`Signal::combine`], [`Signal::and`]) and
//!   consecutive-duplicate suppression ([`Signal::dedup`]).
//! - [`Event`]: a payload-less broadcast notification.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Arc<Mutex<..>>` for cross-thread shared ownership;
//! cloning an `Observable` shares the underlying cell. Delivery is always
//! synchronous on the writer's thread, and no internal lock is held while
//! subscriber callbacks run, so a callback may freely re-read the value it
//! was notified about.
//!
//! `Signal<T>` is a pair of thunks (read the current value, attach a
//! subscriber). Derived signals recompute from their operands on demand and
//! push a recomputed value whenever any operand fires.
//!
//! # Invariants
//!
//! 1. `Observable::set` notifies on **every** write, including a write of a
//!    value equal to the current one. Duplicate suppression is opt-in at the
//!    signal layer via [`Signal::dedup`].
//! 2. Subscriber callbacks return before the triggering `set`/`emit` returns.
//! 3. Subscribers are invoked in registration order; dropping a
//!    [`Subscription`] removes its callback before the next notification
//!    cycle.
//! 4. A poisoned internal lock is recovered, never propagated as a panic.

pub mod event;
pub mod observable;
pub mod signal;
pub mod subscription;

pub use event::Event;
pub use observable::Observable;
pub use signal::Signal;
pub use subscription::Subscription;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
