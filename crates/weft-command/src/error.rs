#![forbid(unsafe_code)]

//! Failure taxonomy for command triggers.
//!
//! Only one condition is an error: a registered handler's async operation
//! failing during a fan-out. Triggering a non-executable command and
//! disposing twice are silent no-ops, deliberately not represented here.

use thiserror::Error;

/// Boxed error payload produced by a failing handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The joined failure of one trigger fan-out.
///
/// Carries every handler failure from the fan-out, in snapshot order.
/// Handlers that succeeded still ran to completion; the gate has already
/// been reopened by the time a caller observes this value.
#[derive(Debug, Error)]
#[error("{} of {} command handlers failed", .failures.len(), .total)]
pub struct TriggerError {
    /// Number of handlers in the fan-out snapshot.
    pub total: usize,
    /// Every failure, in snapshot order.
    pub failures: Vec<BoxError>,
}

impl TriggerError {
    /// Fold settled handler results into a single outcome.
    pub(crate) fn collect(results: Vec<Result<(), BoxError>>) -> Result<(), TriggerError> {
        let total = results.len();
        let failures: Vec<BoxError> = results.into_iter().filter_map(Result::err).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TriggerError { total, failures })
        }
    }

    /// The first failure in snapshot order.
    ///
    /// # Panics
    ///
    /// Panics if `failures` is empty; a `TriggerError` produced by a
    /// trigger always carries at least one failure.
    #[must_use]
    pub fn first(&self) -> &BoxError {
        &self.failures[0]
    }
}
