//! Tensor-product interpolation between the solver's GLL order and the mirror order.

use super::gll::interpolation_matrix;
use crate::coupling_error::CouplingError;

/// A dense 1-D interpolation matrix, row-major with one row per target node.
#[derive(Clone, Debug, PartialEq)]
pub struct InterpolationMatrix {
    start_points: usize,
    end_points: usize,
    values: Vec<f64>,
}

impl InterpolationMatrix {
    /// Build the GLL-to-GLL matrix for the given point counts.
    pub fn new(start_points: usize, end_points: usize) -> Result<Self, CouplingError> {
        Ok(Self {
            start_points,
            end_points,
            values: interpolation_matrix(start_points, end_points)?,
        })
    }

    pub fn start_points(&self) -> usize {
        self.start_points
    }

    pub fn end_points(&self) -> usize {
        self.end_points
    }

    /// Entry `(i, j) = L_j(x_i)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.start_points + j]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Apply to a 1-D nodal vector.
    pub fn apply(&self, input: &[f64], output: &mut [f64]) {
        for (i, out) in output.iter_mut().enumerate().take(self.end_points) {
            let row = &self.values[i * self.start_points..(i + 1) * self.start_points];
            *out = row.iter().zip(input).map(|(a, u)| a * u).sum();
        }
    }

    /// Contract the axis of `input` with stride `stride`.
    ///
    /// `input` is viewed as `[outer][start][stride]`, `output` as `[outer][end][stride]`.
    fn contract(&self, input: &[f64], output: &mut [f64], stride: usize, outer: usize) {
        let (n, m) = (self.start_points, self.end_points);
        for o in 0..outer {
            let src = &input[o * n * stride..(o + 1) * n * stride];
            let dst = &mut output[o * m * stride..(o + 1) * m * stride];
            for i in 0..m {
                let row = &self.values[i * n..(i + 1) * n];
                for s in 0..stride {
                    dst[i * stride + s] = row
                        .iter()
                        .enumerate()
                        .map(|(j, a)| a * src[j * stride + s])
                        .sum();
                }
            }
        }
    }
}

/// Scratch-owning 2-D and 3-D tensor interpolation with one matrix.
///
/// Buffers are sized once from the point counts and reused on every call.
#[derive(Clone, Debug)]
pub struct TensorInterpolator {
    matrix: InterpolationMatrix,
    stage_a: Vec<f64>,
    stage_b: Vec<f64>,
}

impl TensorInterpolator {
    pub fn new(matrix: InterpolationMatrix) -> Self {
        let n = matrix.start_points();
        let m = matrix.end_points();
        Self {
            stage_a: vec![0.0; n * n * m.max(n)],
            stage_b: vec![0.0; n * m.max(n) * m.max(n)],
            matrix,
        }
    }

    pub fn matrix(&self) -> &InterpolationMatrix {
        &self.matrix
    }

    /// Interpolate a flattened `start x start` face (first index fastest) to `end x end`.
    pub fn interpolate_2d(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), CouplingError> {
        let n = self.matrix.start_points();
        let m = self.matrix.end_points();
        check_len(input.len(), n * n)?;
        check_len(output.len(), m * m)?;
        let stage = &mut self.stage_a[..n * m];
        // x-direction: [j][i] -> [j][a]
        self.matrix.contract(input, stage, 1, n);
        // y-direction: [j][a] -> [b][a]
        self.matrix.contract(stage, output, m, 1);
        Ok(())
    }

    /// Interpolate a flattened `start³` element (first index fastest) to `end³`.
    pub fn interpolate_3d(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), CouplingError> {
        let n = self.matrix.start_points();
        let m = self.matrix.end_points();
        check_len(input.len(), n * n * n)?;
        check_len(output.len(), m * m * m)?;
        let stage_a = &mut self.stage_a[..n * n * m];
        let stage_b = &mut self.stage_b[..n * m * m];
        // x: [k][j][i] -> [k][j][a]
        self.matrix.contract(input, stage_a, 1, n * n);
        // y: [k][j][a] -> [k][b][a]
        self.matrix.contract(stage_a, stage_b, m, n);
        // z: [k][b][a] -> [c][b][a]
        self.matrix.contract(stage_b, output, m * m, 1);
        Ok(())
    }
}

fn check_len(found: usize, expected: usize) -> Result<(), CouplingError> {
    if found == expected {
        Ok(())
    } else {
        Err(CouplingError::BufferLength { expected, found })
    }
}

/// Flattened corner indices of a tensor grid with `points` per direction, in
/// tensor order (first index fastest).
pub fn face_corner_indices(points: usize) -> [usize; 4] {
    let n2 = points * points;
    [0, points - 1, n2 - points, n2 - 1]
}

/// See [`face_corner_indices`]; the 8 corners of a volume grid.
pub fn volume_corner_indices(points: usize) -> [usize; 8] {
    let n2 = points * points;
    let n3 = n2 * points;
    [
        0,
        points - 1,
        n2 - points,
        n2 - 1,
        n3 - n2,
        n3 - n2 + points - 1,
        n3 - points,
        n3 - 1,
    ]
}

/// Outgoing (solver → mirror) and incoming (mirror → solver) operators.
#[derive(Clone, Debug)]
pub struct InterpolationOperator {
    solver_points: usize,
    mirror_points: usize,
    outgoing: TensorInterpolator,
    incoming: TensorInterpolator,
    needs_interpolation: bool,
}

impl InterpolationOperator {
    pub fn new(solver_points: usize, mirror_points: usize) -> Result<Self, CouplingError> {
        let outgoing = TensorInterpolator::new(InterpolationMatrix::new(solver_points, mirror_points)?);
        let incoming = TensorInterpolator::new(InterpolationMatrix::new(mirror_points, solver_points)?);
        log::debug!(
            "built interpolation matrices: {solver_points} <-> {mirror_points} points per direction"
        );
        Ok(Self {
            solver_points,
            mirror_points,
            outgoing,
            incoming,
            // Corner selection is exact whenever the mirror only uses endpoints.
            needs_interpolation: mirror_points > 2,
        })
    }

    pub fn solver_points(&self) -> usize {
        self.solver_points
    }

    pub fn mirror_points(&self) -> usize {
        self.mirror_points
    }

    pub fn needs_interpolation(&self) -> bool {
        self.needs_interpolation
    }

    pub fn outgoing(&self) -> &InterpolationMatrix {
        self.outgoing.matrix()
    }

    pub fn incoming(&self) -> &InterpolationMatrix {
        self.incoming.matrix()
    }

    /// Solver face values → mirror face values.
    pub fn outgoing_2d(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), CouplingError> {
        self.outgoing.interpolate_2d(input, output)
    }

    /// Solver element values → mirror element values.
    pub fn outgoing_3d(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), CouplingError> {
        self.outgoing.interpolate_3d(input, output)
    }

    /// Mirror face values → solver face values.
    pub fn incoming_2d(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), CouplingError> {
        self.incoming.interpolate_2d(input, output)
    }

    /// Mirror element values → solver element values.
    pub fn incoming_3d(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), CouplingError> {
        self.incoming.interpolate_3d(input, output)
    }
}
