//! Invariant checks for messages and aggregators.
//!
//! Checks are cheap but not free, so the `debug_invariants!` macro only runs
//! them in debug builds or with the `check-invariants` feature.

use crate::lumberjack_error::LumberjackError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Panic if an invariant is broken (debug builds / `check-invariants`).
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first violation encountered.
    fn validate_invariants(&self) -> Result<(), LumberjackError>;
}

/// Map a failed condition to [`LumberjackError::InvariantViolation`].
pub(crate) fn require(
    holds: bool,
    describe: impl FnOnce() -> String,
) -> Result<(), LumberjackError> {
    if holds {
        Ok(())
    } else {
        Err(LumberjackError::InvariantViolation(describe()))
    }
}

/// Run a fallible check and panic with context when invariant checking is
/// enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[lumberjack invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
