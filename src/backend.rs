//! Capabilities consumed from the wrapped spectral-element solver and the host driver.
//!
//! The solver's mesh is a set of rank-local hexahedral elements, each carrying a
//! tensor-product grid of `Nq x Nq x Nq` GLL points flattened with the first index
//! fastest. Element `e`'s points occupy `e * Nq³ .. (e + 1) * Nq³` of every field.
//!
//! Faces are numbered by the tensor corners they contain (corner `c` has local
//! coordinates `(c & 1, (c >> 1) & 1, (c >> 2) & 1)`):
//!
//! | face | corners      | plane  |
//! |------|--------------|--------|
//! | 0    | 0, 1, 2, 3   | z = 0  |
//! | 1    | 0, 1, 4, 5   | y = 0  |
//! | 2    | 1, 3, 5, 7   | x = 1  |
//! | 3    | 2, 3, 6, 7   | y = 1  |
//! | 4    | 0, 2, 4, 6   | x = 0  |
//! | 5    | 4, 5, 6, 7   | z = 1  |
//!
//! Face points are flattened `Nq x Nq` grids; [`SolverMesh::face_point_index`] maps
//! them back into the volume numbering.

use crate::transfer::field::{FieldKind, WriteField};
use thiserror::Error;

/// Tensor corners of each solver face, in the face's own tensor order.
pub const SOLVER_FACE_CORNERS: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [0, 1, 4, 5],
    [1, 3, 5, 7],
    [2, 3, 6, 7],
    [0, 2, 4, 6],
    [4, 5, 6, 7],
];

/// Nonzero status reported by a wrapped backend, with the backend's own message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("backend reported status {code}: {message}")]
pub struct BackendError {
    pub code: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Rank-local view of the solver's mesh.
pub trait SolverMesh {
    /// GLL points per coordinate direction (`Nq = N + 1`).
    fn points_per_dim(&self) -> usize;
    /// Number of elements owned by the calling rank.
    fn n_local_elements(&self) -> usize;
    /// Faces per element.
    fn faces_per_element(&self) -> usize {
        SOLVER_FACE_CORNERS.len()
    }
    /// Sideset id carried by `face` of local `element`; `None` for interior faces.
    fn face_boundary_id(&self, element: usize, face: usize) -> Option<i32>;
    /// Volume point index of face-local point `point` of `face` on local `element`.
    fn face_point_index(&self, element: usize, face: usize, point: usize) -> usize;
    /// Coordinates of a rank-local volume point, in solver length units.
    fn point_coordinates(&self, index: usize) -> [f64; 3];

    /// Points per element.
    fn points_per_element(&self) -> usize {
        self.points_per_dim().pow(3)
    }
    /// Points per face.
    fn points_per_face(&self) -> usize {
        self.points_per_dim().pow(2)
    }
}

/// Rank-local access to the solver's solution fields.
pub trait SolverFields {
    /// Whether the case carries a temperature field.
    fn has_temperature(&self) -> bool;
    /// Read a nondimensional value at a rank-local point index.
    fn solution(&self, field: FieldKind, index: usize) -> f64;
    /// Write a nondimensional value at a rank-local point index.
    fn set_solution(&mut self, field: WriteField, index: usize, value: f64);
    /// Mass-matrix weight (quadrature weight times Jacobian) of a rank-local point.
    fn mass_weight(&self, index: usize) -> f64;
    /// Number of rank-local points.
    fn n_local_points(&self) -> usize;
}

/// Time-stepping and output entry points of the solver.
pub trait SolverRuntime {
    /// Solver's own start time (nondimensional).
    fn start_time(&self) -> f64;
    /// Advance one timestep from `start_time` by `dt` (both nondimensional).
    fn run_step(&mut self, start_time: f64, dt: f64, step: usize) -> Result<(), BackendError>;
    /// Optional user hook run after each step.
    fn user_step(&mut self, time: f64, step: usize, is_output_step: bool);
    /// Copy the solution into the legacy backend arrays.
    fn copy_to_legacy(&mut self, time: f64, step: usize);
    /// Whether `step` meets the solver's configured output interval.
    fn is_output_step(&self, time: f64, step: usize) -> bool;
    /// Whether `step` is the solver's configured last step.
    fn is_last_step(&self, time: f64, step: usize) -> bool;
    /// Write a field file through the solver's own naming.
    fn write_output(&mut self, time: f64) -> Result<(), BackendError>;
    /// Write a field file with an explicit run prefix.
    fn write_field_file(&mut self, prefix: &str, time: f64) -> Result<(), BackendError>;
    /// Whether the solver only compiles its case and never runs.
    fn build_only(&self) -> bool {
        false
    }
}

/// Time control exposed by the host executioner (dimensional units).
///
/// `time()` is the time the driver is stepping to; while a step runs, the step
/// window is `time() - dt() .. time()`. A rejected and retried step therefore
/// reports the same window and step index again.
pub trait DriverClock {
    fn dt(&self) -> f64;
    fn time(&self) -> f64;
    /// Index of the step being taken.
    fn t_step(&self) -> usize;
    fn start_time(&self) -> f64;
    fn target_time(&self) -> f64;
    fn timestep_tol(&self) -> f64;
}

/// A clock with fixed values, handy for drivers that compute time externally.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedClock {
    pub dt: f64,
    pub time: f64,
    pub t_step: usize,
    pub start_time: f64,
    pub target_time: f64,
    pub timestep_tol: f64,
}

impl DriverClock for FixedClock {
    fn dt(&self) -> f64 {
        self.dt
    }
    fn time(&self) -> f64 {
        self.time
    }
    fn t_step(&self) -> usize {
        self.t_step
    }
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn target_time(&self) -> f64 {
        self.target_time
    }
    fn timestep_tol(&self) -> f64 {
        self.timestep_tol
    }
}
