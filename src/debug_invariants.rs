//! Structural self-checks for fields and partitions.
//!
//! `validate_invariants` is always available and returns the first broken
//! invariant as a [`SolverError`]. `debug_assert_invariants` panics on the
//! same condition, but only in debug builds or with the `check-invariants`
//! feature; the integrator calls it on its inputs once per step.

use crate::solver_error::SolverError;

pub trait DebugInvariants {
    /// Panic on a broken invariant (debug builds / `check-invariants`).
    fn debug_assert_invariants(&self);
    /// First broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), SolverError>;
}

/// Evaluate a `Result<(), SolverError>` check and panic with `$what` on error,
/// compiled out unless invariant checking is on.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $what:literal) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = $check {
            panic!(concat!("broken ", $what, " invariant: {}"), e);
        }
    };
}
