#![forbid(unsafe_code)]

//! Derived read-only streams over observables.
//!
//! A [`Signal<T>`] pairs a read thunk (evaluate the current value) with an
//! attach thunk (subscribe a callback). Signals compose: two signals can be
//! combined through a closure ([`Signal::combine`]), boolean signals have an
//! AND shorthand ([`Signal::and`]), and [`Signal::dedup`] suppresses
//! consecutive duplicate deliveries so transition-only listeners never
//! refire on a redundant recomputation.
//!
//! # Invariants
//!
//! 1. `get()` re-evaluates the chain; it never returns a cached value.
//! 2. A combined signal recomputes and delivers whenever *either* operand
//!    fires, synchronously with that operand's writer.
//! 3. `dedup()` seeds each subscriber's last-seen state with the signal's
//!    current value at subscribe time, so the first delivery is suppressed
//!    if it matches what the subscriber could already read.
//! 4. A subscription to a derived signal owns the subscriptions to every
//!    operand and releases all of them on drop.

use std::sync::{Arc, Mutex};

use crate::lock;
use crate::observable::Observable;
use crate::subscription::Subscription;

/// Callback type delivered to signal subscribers.
pub type SignalCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

type ReadFn<T> = Arc<dyn Fn() -> T + Send + Sync>;
type AttachFn<T> = Arc<dyn Fn(SignalCallback<T>) -> Subscription + Send + Sync>;

/// A derived, read-only value stream.
///
/// Cloning a `Signal` shares the underlying source; it does not fork state.
pub struct Signal<T> {
    read: ReadFn<T>,
    attach: AttachFn<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            attach: Arc::clone(&self.attach),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Signal<T> {
    /// Build a signal from explicit read and attach thunks.
    ///
    /// This is the extension seam for custom sources; most callers go
    /// through [`Signal::from_observable`].
    pub fn new(
        read: impl Fn() -> T + Send + Sync + 'static,
        attach: impl Fn(SignalCallback<T>) -> Subscription + Send + Sync + 'static,
    ) -> Self {
        Self {
            read: Arc::new(read),
            attach: Arc::new(attach),
        }
    }

    /// View an observable as a signal.
    pub fn from_observable(source: &Observable<T>) -> Self {
        let read_source = source.clone();
        let attach_source = source.clone();
        Self {
            read: Arc::new(move || read_source.get()),
            attach: Arc::new(move |callback| attach_source.subscribe(move |v| callback(v))),
        }
    }

    /// Evaluate the current value.
    #[must_use]
    pub fn get(&self) -> T {
        (self.read)()
    }

    /// Subscribe to deliveries from this signal.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        (self.attach)(Arc::new(callback))
    }

    /// Combine two signals through `f`, re-evaluating when either fires.
    pub fn combine<A, B>(
        a: &Signal<A>,
        b: &Signal<B>,
        f: impl Fn(&A, &B) -> T + Send + Sync + 'static,
    ) -> Signal<T>
    where
        A: Clone + PartialEq + Send + Sync + 'static,
        B: Clone + PartialEq + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let read = {
            let (a, b, f) = (a.clone(), b.clone(), Arc::clone(&f));
            Arc::new(move || f(&a.get(), &b.get())) as ReadFn<T>
        };
        let attach = {
            let (a, b) = (a.clone(), b.clone());
            Arc::new(move |callback: SignalCallback<T>| {
                let recompute_on_a = {
                    let (a, b, f, cb) = (a.clone(), b.clone(), Arc::clone(&f), Arc::clone(&callback));
                    move |_: &A| cb(&f(&a.get(), &b.get()))
                };
                let recompute_on_b = {
                    let (a, b, f, cb) = (a.clone(), b.clone(), Arc::clone(&f), callback);
                    move |_: &B| cb(&f(&a.get(), &b.get()))
                };
                Subscription::merge(vec![a.subscribe(recompute_on_a), b.subscribe(recompute_on_b)])
            }) as AttachFn<T>
        };
        Signal { read, attach }
    }

    /// Suppress consecutive duplicate deliveries.
    ///
    /// Each subscriber tracks the last value it saw, seeded with the
    /// signal's current value at subscribe time; only an actual transition
    /// reaches the callback.
    #[must_use]
    pub fn dedup(&self) -> Signal<T> {
        let read = Arc::clone(&self.read);
        let source = self.clone();
        let attach = Arc::new(move |callback: SignalCallback<T>| {
            let last = Mutex::new(source.get());
            source.subscribe(move |value| {
                let mut last = lock(&last);
                if *value != *last {
                    *last = value.clone();
                    drop(last);
                    callback(value);
                }
            })
        }) as AttachFn<T>;
        Signal { read, attach }
    }
}

impl Signal<bool> {
    /// Logical AND of two boolean signals.
    ///
    /// No implicit duplicate suppression; fold with `and` and finish with
    /// one [`Signal::dedup`] when only transitions matter.
    #[must_use]
    pub fn and(&self, other: &Signal<bool>) -> Signal<bool> {
        Signal::combine(self, other, |a, b| *a && *b)
    }
}

impl<T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("value", &self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn from_observable_reflects_source() {
        let obs = Observable::new(3);
        let sig = Signal::from_observable(&obs);
        assert_eq!(sig.get(), 3);

        obs.set(8);
        assert_eq!(sig.get(), 8);
    }

    #[test]
    fn subscribe_fires_on_source_write() {
        let obs = Observable::new(0);
        let sig = Signal::from_observable(&obs);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let _sub = sig.subscribe(move |v| {
            s.store(*v, Ordering::SeqCst);
        });

        obs.set(21);
        assert_eq!(seen.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn combine_reads_both_operands() {
        let a = Observable::new(2);
        let b = Observable::new(10);
        let product = Signal::combine(
            &Signal::from_observable(&a),
            &Signal::from_observable(&b),
            |x, y| x * y,
        );
        assert_eq!(product.get(), 20);

        a.set(3);
        assert_eq!(product.get(), 30);
    }

    #[test]
    fn combine_fires_on_either_operand() {
        let a = Observable::new(false);
        let b = Observable::new(false);
        let either = Signal::combine(
            &Signal::from_observable(&a),
            &Signal::from_observable(&b),
            |x, y| *x || *y,
        );
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = either.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        a.set(true);
        b.set(true);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn and_is_logical_and() {
        let a = Observable::new(true);
        let b = Observable::new(false);
        let both = Signal::from_observable(&a).and(&Signal::from_observable(&b));
        assert!(!both.get());

        b.set(true);
        assert!(both.get());
    }

    #[test]
    fn dedup_suppresses_consecutive_duplicates() {
        let obs = Observable::new(false);
        let sig = Signal::from_observable(&obs).dedup();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = sig.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        obs.set(true);
        obs.set(true);
        obs.set(true);
        obs.set(false);
        assert_eq!(count.load(Ordering::SeqCst), 2, "only transitions deliver");
    }

    #[test]
    fn dedup_seeds_with_current_value() {
        let obs = Observable::new(true);
        let sig = Signal::from_observable(&obs).dedup();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = sig.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        // Redundant write of the value the subscriber could already read.
        obs.set(true);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn anded_signals_with_same_combined_result_fire_once() {
        let a = Observable::new(true);
        let b = Observable::new(false);
        let combined = Signal::from_observable(&a)
            .and(&Signal::from_observable(&b))
            .dedup();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = combined.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        // Both operands change, combined result stays false both times.
        a.set(false);
        b.set(true);
        assert_eq!(
            count.load(Ordering::SeqCst),
            0,
            "identical combined results must not refire"
        );

        a.set(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn dedup_fires_exactly_on_transitions(
            writes in proptest::collection::vec((0..2usize, any::<bool>()), 0..64)
        ) {
            let a = Observable::new(true);
            let b = Observable::new(true);
            let combined = Signal::from_observable(&a)
                .and(&Signal::from_observable(&b))
                .dedup();

            let seen = Arc::new(Mutex::new(Vec::new()));
            let s = Arc::clone(&seen);
            let _sub = combined.subscribe(move |v| {
                lock(&s).push(*v);
            });

            let mut last = combined.get();
            let mut expected = Vec::new();
            for (target, value) in writes {
                if target == 0 {
                    a.set(value);
                } else {
                    b.set(value);
                }
                let now = a.get() && b.get();
                if now != last {
                    expected.push(now);
                    last = now;
                }
            }
            prop_assert_eq!(&*lock(&seen), &expected);
        }
    }
}
