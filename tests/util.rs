#![allow(dead_code)]
use sem_coupling::{
    algs::communicator::LocalComm,
    backend::{BackendError, SolverFields, SolverMesh, SolverRuntime},
    interpolation::gll::{gll_nodes, gll_weights},
    transfer::field::{FieldKind, WriteField},
};
use std::collections::HashMap;

/// Run `f` on `n` thread-ranks sharing one `LocalComm` world; results by rank.
pub fn run_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&LocalComm) -> T + Sync,
{
    let comms = LocalComm::world(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|comm| s.spawn(|| f(comm))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Sideset ids of the box faces: x=0, x=max, y=0, y=max, z=0, z=max.
pub const X_MIN: i32 = 1;
pub const X_MAX: i32 = 2;
pub const Y_MIN: i32 = 3;
pub const Y_MAX: i32 = 4;
pub const Z_MIN: i32 = 5;
pub const Z_MAX: i32 = 6;

/// Structured box of hexahedral spectral elements, split over ranks in global
/// element order.
#[derive(Clone, Debug)]
pub struct BoxSolver {
    pub dims: [usize; 3],
    pub nq: usize,
    pub h: f64,
    pub first_global: usize,
    pub n_local: usize,
    nodes: Vec<f64>,
    weights: Vec<f64>,
    pub has_temperature: bool,
    pub fields: HashMap<FieldKind, Vec<f64>>,
    pub written: HashMap<WriteField, Vec<f64>>,
    // runtime
    pub start_time: f64,
    pub output_every: usize,
    pub last_step: usize,
    pub fail_at_step: Option<usize>,
    pub build_only: bool,
    pub steps: Vec<(f64, f64, usize)>,
    pub user_steps: Vec<(f64, usize, bool)>,
    pub legacy_copies: Vec<usize>,
    pub outputs: Vec<(Option<String>, f64)>,
    /// Runtime calls in the order they arrived.
    pub calls: Vec<&'static str>,
    /// Writes per local point, over every write field.
    pub write_counts: Vec<usize>,
}

impl BoxSolver {
    /// Rank `rank` of a box split as `counts` elements per rank.
    pub fn partitioned(dims: [usize; 3], nq: usize, counts: &[usize], rank: usize) -> Self {
        let first_global = counts[..rank].iter().sum();
        let n_local = counts[rank];
        let n_points = n_local * nq * nq * nq;
        let nodes = gll_nodes::<f64>(nq).unwrap();
        let weights = gll_weights(&nodes);
        Self {
            dims,
            nq,
            h: 1.0,
            first_global,
            n_local,
            nodes,
            weights,
            has_temperature: true,
            fields: HashMap::new(),
            written: HashMap::new(),
            start_time: 0.0,
            output_every: 1,
            last_step: usize::MAX,
            fail_at_step: None,
            build_only: false,
            steps: Vec::new(),
            user_steps: Vec::new(),
            legacy_copies: Vec::new(),
            outputs: Vec::new(),
            calls: Vec::new(),
            write_counts: vec![0; n_points],
        }
        .with_points(n_points)
    }

    /// The whole box on one rank.
    pub fn serial(dims: [usize; 3], nq: usize) -> Self {
        Self::partitioned(dims, nq, &[dims[0] * dims[1] * dims[2]], 0)
    }

    fn with_points(mut self, n_points: usize) -> Self {
        for kind in [
            FieldKind::Temperature,
            FieldKind::Pressure,
            FieldKind::VelocityX,
            FieldKind::VelocityY,
            FieldKind::VelocityZ,
        ] {
            self.fields.insert(kind, vec![0.0; n_points]);
        }
        self
    }

    pub fn with_spacing(mut self, h: f64) -> Self {
        self.h = h;
        self
    }

    /// Fill a nondimensional field from a function of the point coordinates.
    pub fn set_field(&mut self, kind: FieldKind, f: impl Fn([f64; 3]) -> f64) {
        let values: Vec<f64> = (0..self.n_local_points())
            .map(|i| f(self.point_coordinates(i)))
            .collect();
        self.fields.insert(kind, values);
    }

    fn element_origin(&self, e: usize) -> [usize; 3] {
        let g = self.first_global + e;
        let [nx, ny, _] = self.dims;
        [g % nx, (g / nx) % ny, g / (nx * ny)]
    }

    /// Volume index of tensor point `(i, j, k)` of local element `e`.
    pub fn volume_index(&self, e: usize, i: usize, j: usize, k: usize) -> usize {
        let nq = self.nq;
        e * nq * nq * nq + i + nq * j + nq * nq * k
    }

    pub fn written(&self, field: WriteField) -> Option<&[f64]> {
        self.written.get(&field).map(|v| v.as_slice())
    }
}

impl SolverMesh for BoxSolver {
    fn points_per_dim(&self) -> usize {
        self.nq
    }

    fn n_local_elements(&self) -> usize {
        self.n_local
    }

    fn face_boundary_id(&self, element: usize, face: usize) -> Option<i32> {
        let [ex, ey, ez] = self.element_origin(element);
        let [nx, ny, nz] = self.dims;
        match face {
            0 if ez == 0 => Some(Z_MIN),
            1 if ey == 0 => Some(Y_MIN),
            2 if ex == nx - 1 => Some(X_MAX),
            3 if ey == ny - 1 => Some(Y_MAX),
            4 if ex == 0 => Some(X_MIN),
            5 if ez == nz - 1 => Some(Z_MAX),
            _ => None,
        }
    }

    fn face_point_index(&self, element: usize, face: usize, point: usize) -> usize {
        let last = self.nq - 1;
        let (a, b) = (point % self.nq, point / self.nq);
        let (i, j, k) = match face {
            0 => (a, b, 0),
            1 => (a, 0, b),
            2 => (last, a, b),
            3 => (a, last, b),
            4 => (0, a, b),
            _ => (a, b, last),
        };
        self.volume_index(element, i, j, k)
    }

    fn point_coordinates(&self, index: usize) -> [f64; 3] {
        let nq = self.nq;
        let per_element = nq * nq * nq;
        let e = index / per_element;
        let local = index % per_element;
        let (i, j, k) = (local % nq, (local / nq) % nq, local / (nq * nq));
        let origin = self.element_origin(e);
        let map = |o: usize, t: usize| self.h * (o as f64 + 0.5 * (self.nodes[t] + 1.0));
        [map(origin[0], i), map(origin[1], j), map(origin[2], k)]
    }
}

impl SolverFields for BoxSolver {
    fn has_temperature(&self) -> bool {
        self.has_temperature
    }

    fn solution(&self, field: FieldKind, index: usize) -> f64 {
        self.fields[&field][index]
    }

    fn set_solution(&mut self, field: WriteField, index: usize, value: f64) {
        let n = self.n_local_points();
        self.written.entry(field).or_insert_with(|| vec![0.0; n])[index] = value;
        self.write_counts[index] += 1;
    }

    fn mass_weight(&self, index: usize) -> f64 {
        let nq = self.nq;
        let local = index % (nq * nq * nq);
        let (i, j, k) = (local % nq, (local / nq) % nq, local / (nq * nq));
        let jac = (0.5 * self.h).powi(3);
        self.weights[i] * self.weights[j] * self.weights[k] * jac
    }

    fn n_local_points(&self) -> usize {
        self.n_local * self.nq * self.nq * self.nq
    }
}

impl SolverRuntime for BoxSolver {
    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn run_step(&mut self, start_time: f64, dt: f64, step: usize) -> Result<(), BackendError> {
        if self.fail_at_step == Some(step) {
            return Err(BackendError::new(1, "solver diverged"));
        }
        self.calls.push("run_step");
        self.steps.push((start_time, dt, step));
        Ok(())
    }

    fn user_step(&mut self, time: f64, step: usize, is_output_step: bool) {
        self.calls.push("user_step");
        self.user_steps.push((time, step, is_output_step));
    }

    fn copy_to_legacy(&mut self, _time: f64, step: usize) {
        self.calls.push("copy_to_legacy");
        self.legacy_copies.push(step);
    }

    fn is_output_step(&self, _time: f64, step: usize) -> bool {
        self.output_every > 0 && step % self.output_every == 0
    }

    fn is_last_step(&self, _time: f64, step: usize) -> bool {
        step == self.last_step
    }

    fn write_output(&mut self, time: f64) -> Result<(), BackendError> {
        self.calls.push("write_output");
        self.outputs.push((None, time));
        Ok(())
    }

    fn write_field_file(&mut self, prefix: &str, time: f64) -> Result<(), BackendError> {
        self.calls.push("write_field_file");
        self.outputs.push((Some(prefix.to_string()), time));
        Ok(())
    }

    fn build_only(&self) -> bool {
        self.build_only
    }
}

/// Split `n` items over `ranks` as evenly as possible.
pub fn even_counts(n: usize, ranks: usize) -> Vec<usize> {
    (0..ranks)
        .map(|r| n / ranks + usize::from(r < n % ranks))
        .collect()
}

pub fn assert_close(got: f64, want: f64, tol: f64) {
    assert!(
        (got - want).abs() <= tol * want.abs().max(1.0),
        "got {got}, want {want}"
    );
}
