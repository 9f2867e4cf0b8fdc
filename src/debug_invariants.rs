//! Structural self-checks for the immutable coupling data.
//!
//! Tables and mirror meshes are built once and then shared read-only, so they are
//! validated right after construction. Debug builds (or the `strict-invariants`
//! feature) turn a failed check into a panic at the construction site.

use crate::coupling_error::CouplingError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "coupling data");
    }
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), CouplingError>;
}

/// Fail with [`CouplingError::TableInvariant`] unless `condition` holds.
pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), CouplingError> {
    if condition {
        Ok(())
    } else {
        Err(CouplingError::TableInvariant(message()))
    }
}

/// Run a fallible check and panic on error when invariant checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
