//! CouplingError: Unified error type for sem-coupling public APIs
//!
//! Every fallible operation in the crate reports through this enum. Variants are
//! grouped by the phase that detects them: configuration, coupling consistency,
//! unhandled enumerated variants, and errors reported by a wrapped solver backend.

use crate::backend::BackendError;
use thiserror::Error;

/// Unified error type for coupling operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CouplingError {
    /// Invalid or contradictory setup parameters.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Nondimensional mode was requested without all reference scales.
    #[error(
        "When solving in non-dimensional form, the {} parameter(s) are required!",
        .missing.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(", ")
    )]
    MissingScales { missing: Vec<&'static str> },
    /// A reference scale was outside its admissible range.
    #[error("Reference scale '{name}' = {value} is out of range ({constraint})")]
    ScaleOutOfRange {
        name: &'static str,
        value: f64,
        constraint: &'static str,
    },
    /// The requested coupling produced no elements on any rank.
    #[error("No {mode} coupling elements were found on any rank")]
    NoCoupledElements { mode: &'static str },
    /// Mesh scaling disagrees with the reference length of a nondimensional solve.
    #[error(
        "Mesh scaling {scaling} must match 'L_ref' = {l_ref} when solving in non-dimensional form"
    )]
    ScalingMismatch { scaling: f64, l_ref: f64 },
    /// The requested time step is smaller than the solver allows.
    #[error("Requested time step of {dt} is smaller than the minimum time step of {min_dt}")]
    TimestepTooSmall { dt: f64, min_dt: f64 },
    /// An enumerated kind reached a dispatch without a matching case.
    #[error("Unhandled {kind}: '{value}'")]
    UnhandledVariant { kind: &'static str, value: String },
    /// A query needed a coupling mode that is not active.
    #[error("Operation requires {0} coupling, which is not enabled")]
    NotCoupled(&'static str),
    /// Fewer quadrature points than an interpolation can use.
    #[error("Interpolation requires at least 2 points per direction, got {0}")]
    InvalidQuadrature(usize),
    /// Degenerate or inverted element geometry.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// A buffer had the wrong number of entries.
    #[error("Buffer length mismatch: expected {expected}, found {found}")]
    BufferLength { expected: usize, found: usize },
    /// An index fell outside a table.
    #[error("Index {index} out of bounds for {what} of length {len}")]
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// A coupling table violated one of its structural invariants.
    #[error("Coupling table invariant violated: {0}")]
    TableInvariant(String),
    /// The wrapped solver reported a nonzero status.
    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: BackendError,
    },
}

impl CouplingError {
    /// Wrap a backend error with a description of what was being attempted.
    pub fn backend(context: impl Into<String>, source: BackendError) -> Self {
        CouplingError::Backend {
            context: context.into(),
            source,
        }
    }
}
