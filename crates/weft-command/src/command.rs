#![forbid(unsafe_code)]

//! The gated async command state machine.
//!
//! A [`Command<T>`] owns (or shares) a boolean gate, composes it with any
//! number of external boolean signals through AND, and caches the combined
//! result so [`Command::executable`] is a plain atomic read. Triggering the
//! command closes the gate, fans the payload out to a snapshot of the
//! registered handlers, awaits all of them concurrently, and reopens the
//! gate when the last one settles.
//!
//! # State machine
//!
//! - **Ready**: executable, idle.
//! - **Executing**: gate closed by an in-flight trigger; overlapping
//!   triggers observe `false` and no-op.
//! - **Blocked**: gate closed by an external signal or by a sibling command
//!   holding a shared gate.
//! - **Disposed**: terminal; executable reads `false` forever.
//!
//! # Invariants
//!
//! 1. The gate closes *before* any handler runs and reopens on every exit
//!    path of the fan-out — success, handler failure, panic, or the trigger
//!    future being dropped — via a drop guard.
//! 2. The handler set of a trigger is the registry snapshot captured at
//!    trigger time; concurrent register/remove never affect it.
//! 3. Handler failures propagate to the caller awaiting `trigger`; change-
//!    notification subscribers only ever see consistent executability
//!    transitions.
//! 4. `disposed` is monotonic, and `disposed` implies `executable() == false`
//!    regardless of the underlying gate cell.
//!
//! # Shared gates
//!
//! Several commands may be constructed around one [`Observable<bool>`] so
//! that whichever triggers first blocks the others for the duration. Two
//! owners racing to trigger simultaneously resolve by whichever gate write
//! lands first; the loser observes `false` and no-ops. That race is part of
//! the contract, not a defect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use futures::future;
use tracing::{debug, trace, warn};

use weft_reactive::{Event, Observable, Signal, Subscription};

use crate::error::{BoxError, TriggerError};
use crate::lock;
use crate::registry::{Handler, Registry};

/// Diagnostic projection of a command's current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandState {
    /// Executable and idle.
    Ready,
    /// A trigger is in flight; the gate is closed for the duration.
    Executing,
    /// An external signal (or a shared gate's other owner) denies execution.
    Blocked,
    /// Terminal. Executable reads `false` forever.
    Disposed,
}

struct Inner<T> {
    gate: Observable<bool>,
    /// Cached effective executability, mirroring the combinator.
    executable: AtomicBool,
    executing: AtomicBool,
    disposed: AtomicBool,
    registry: Registry<T>,
    changed: Event,
    combinator_sub: Mutex<Option<Subscription>>,
}

/// An async command gated on a dynamically computed boolean.
///
/// Cloning shares the command; all clones observe one gate, one registry,
/// and one disposed flag.
pub struct Command<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Reopens the gate when the fan-out region exits, on every path.
struct ReopenGuard<'a, T> {
    inner: &'a Inner<T>,
}

impl<T> Drop for ReopenGuard<'_, T> {
    fn drop(&mut self) {
        self.inner.executing.store(false, Ordering::SeqCst);
        self.inner.gate.set(true);
    }
}

impl<T: Clone + Send + 'static> Command<T> {
    /// A command with its own gate, initially executable, no external signals.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Observable::new(true), &[])
    }

    /// A command gated on one external boolean signal.
    #[must_use]
    pub fn with_signal(signal: &Signal<bool>) -> Self {
        Self::build(Observable::new(true), std::slice::from_ref(signal))
    }

    /// A command gated on every signal in `signals` (logical AND).
    #[must_use]
    pub fn with_signals(signals: &[Signal<bool>]) -> Self {
        Self::build(Observable::new(true), signals)
    }

    /// A command around an externally shared gate cell.
    ///
    /// The command closes and reopens the shared cell around its own
    /// executions, blocking every other command built on the same cell.
    #[must_use]
    pub fn with_gate(gate: &Observable<bool>) -> Self {
        Self::build(gate.clone(), &[])
    }

    /// A shared gate composed with external signals.
    #[must_use]
    pub fn with_gate_and_signals(gate: &Observable<bool>, signals: &[Signal<bool>]) -> Self {
        Self::build(gate.clone(), signals)
    }

    fn build(gate: Observable<bool>, signals: &[Signal<bool>]) -> Self {
        let effective = signals
            .iter()
            .fold(Signal::from_observable(&gate), |combined, signal| {
                combined.and(signal)
            })
            .dedup();

        let inner = Arc::new(Inner {
            executable: AtomicBool::new(effective.get()),
            executing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            registry: Registry::new(),
            changed: Event::new(),
            combinator_sub: Mutex::new(None),
            gate,
        });

        // Weak: the combinator must never keep a dead command alive.
        let weak: Weak<Inner<T>> = Arc::downgrade(&inner);
        let sub = effective.subscribe(move |now| {
            let Some(inner) = weak.upgrade() else { return };
            if inner.disposed.load(Ordering::SeqCst) {
                return;
            }
            inner.executable.store(*now, Ordering::SeqCst);
            inner.changed.emit();
        });
        *lock(&inner.combinator_sub) = Some(sub);

        Self { inner }
    }

    /// Whether the command may currently be triggered.
    ///
    /// Synchronous atomic read, no side effects. `false` forever once
    /// disposed, regardless of the gate cell.
    #[must_use]
    pub fn executable(&self) -> bool {
        !self.inner.disposed.load(Ordering::SeqCst) && self.inner.executable.load(Ordering::SeqCst)
    }

    /// Current state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> CommandState {
        if self.inner.disposed.load(Ordering::SeqCst) {
            CommandState::Disposed
        } else if self.inner.executing.load(Ordering::SeqCst) {
            CommandState::Executing
        } else if self.inner.executable.load(Ordering::SeqCst) {
            CommandState::Ready
        } else {
            CommandState::Blocked
        }
    }

    /// Whether [`Command::dispose`] has been called.
    #[must_use]
    pub fn disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Subscribe to executability transitions.
    ///
    /// Fires (with no payload) whenever the effective executability actually
    /// changes; redundant recomputations are suppressed upstream.
    pub fn on_executability_changed(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.changed.subscribe(callback)
    }

    /// Register an async handler; every trigger invokes it with the payload.
    ///
    /// Dropping the returned token removes exactly this registration. A
    /// fan-out already in flight keeps the snapshot it captured; the change
    /// applies from the next trigger on.
    pub fn register<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let handler: Handler<T> = Arc::new(move |payload| handler(payload).boxed());
        let token = self.inner.registry.add(handler);
        trace!(handlers = self.inner.registry.len(), "command handler registered");
        token
    }

    /// Register a synchronous handler.
    ///
    /// The body runs when the fan-out invokes it and is folded into the
    /// joined wait as an already-completed result.
    pub fn register_sync<F>(&self, handler: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.register(move |payload| {
            handler(payload);
            future::ready(Ok::<(), BoxError>(()))
        })
    }

    /// Trigger the command with `payload`.
    ///
    /// No-op (returning `Ok`) when not executable, including after dispose.
    /// Otherwise: close the gate, snapshot the registry, invoke every
    /// handler in the snapshot concurrently, await them all, reopen the
    /// gate, and report the joined outcome. The returned future completes
    /// only once every handler has settled, and the reopen happens on every
    /// exit path.
    pub async fn trigger(&self, payload: T) -> Result<(), TriggerError> {
        if !self.executable() {
            trace!("trigger skipped: command not executable");
            return Ok(());
        }

        // Close the gate before any handler runs. Subscriber delivery is
        // synchronous, so overlapping triggers observe `false` from here on.
        self.inner.gate.set(false);
        self.inner.executing.store(true, Ordering::SeqCst);
        let _reopen = ReopenGuard { inner: &self.inner };

        let snapshot = self.inner.registry.snapshot();
        debug!(handlers = snapshot.len(), "command triggered");

        let result = match snapshot.as_slice() {
            [] => Ok(()),
            // Single-handler fast path; identical semantics to the join.
            [only] => (only.handler)(payload).await.map_err(|failure| TriggerError {
                total: 1,
                failures: vec![failure],
            }),
            entries => {
                // Construct every future before awaiting any of them: each
                // handler gets its chance to start regardless of another's
                // failure, and join_all drives them concurrently, settling
                // only when the last one has.
                let futures: Vec<_> = entries
                    .iter()
                    .map(|entry| (entry.handler)(payload.clone()))
                    .collect();
                TriggerError::collect(future::join_all(futures).await)
            }
        };

        if let Err(error) = &result {
            warn!(
                total = error.total,
                failed = error.failures.len(),
                "command fan-out failed"
            );
        } else {
            debug!("command fan-out settled");
        }
        result
    }

    /// Permanently retire the command. Idempotent.
    ///
    /// Detaches the combinator subscription, forces executability to read
    /// `false`, and emits exactly one final change notification — only if
    /// the value actually transitioned. Further triggers are no-ops.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Detach before mutating so no further notifications can fire
        // through the combinator.
        drop(lock(&self.inner.combinator_sub).take());
        let was_executable = self.inner.executable.swap(false, Ordering::SeqCst);
        debug!(was_executable, "command disposed");
        if was_executable {
            self.inner.changed.emit();
        }
    }
}

impl Command<()> {
    /// Trigger a payload-less command.
    pub async fn trigger_unit(&self) -> Result<(), TriggerError> {
        self.trigger(()).await
    }
}

impl<T: Clone + Send + 'static> Default for Command<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> std::fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("executable", &self.inner.executable.load(Ordering::SeqCst))
            .field("executing", &self.inner.executing.load(Ordering::SeqCst))
            .field("disposed", &self.inner.disposed.load(Ordering::SeqCst))
            .field("handlers", &self.inner.registry.len())
            .finish()
    }
}
