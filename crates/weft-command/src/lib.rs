#![forbid(unsafe_code)]

//! Gated asynchronous commands with concurrent handler fan-out.
//!
//! A [`Command<T>`] is the reactive-command half of a data-binding toolkit:
//! an async operation whose availability is a dynamically computed boolean.
//! Triggering it closes its gate, fans the payload out to every registered
//! handler concurrently, awaits all of them, and reopens the gate when the
//! last one settles — success or failure.
//!
//! ```ignore
//! use weft_command::Command;
//! use weft_reactive::{Observable, Signal};
//!
//! let online = Observable::new(true);
//! let send = Command::with_signal(&Signal::from_observable(&online));
//!
//! let _handler = send.register_sync(|msg: String| queue_outgoing(msg));
//! let _ui = send.on_executability_changed(|| refresh_send_button());
//!
//! send.trigger("hello".to_string()).await?;
//! ```
//!
//! # Invariants
//!
//! 1. The gate closes before any handler runs and reopens on every exit
//!    path, so `executable()` is never `true` while a fan-out is in flight
//!    and is always restored once it settles.
//! 2. Each trigger invokes exactly the handlers registered at the instant
//!    it fired; registration and removal never disturb an in-flight fan-out.
//! 3. A handler failure reaches the caller of `trigger`, never the gate.
//! 4. A disposed command reads non-executable forever, triggers are no-ops
//!    forever, and no further change notifications are emitted.

pub mod command;
pub mod error;
mod registry;

pub use command::{Command, CommandState};
pub use error::{BoxError, TriggerError};

pub use weft_reactive as reactive;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
