//! Reductions of solver fields over the whole solver mesh, in physical units.

use crate::algs::communicator::Communicator;
use crate::algs::wire::allreduce_sum;
use crate::backend::SolverFields;
use crate::transfer::field::FieldKind;
use crate::transfer::scales::NondimensionalScales;

/// Dimensional volume of the solver mesh. Collective.
pub fn mesh_volume<S, C>(solver: &S, comm: &C, scales: &NondimensionalScales) -> f64
where
    S: SolverFields + ?Sized,
    C: Communicator + ?Sized,
{
    let local: f64 = (0..solver.n_local_points())
        .map(|i| solver.mass_weight(i))
        .sum();
    allreduce_sum(comm, local) * scales.l_ref.powi(3)
}

/// Dimensional volume integral of `field`. Collective.
pub fn volume_integral<S, C>(
    solver: &S,
    comm: &C,
    field: FieldKind,
    scales: &NondimensionalScales,
) -> f64
where
    S: SolverFields + ?Sized,
    C: Communicator + ?Sized,
{
    let local: f64 = (0..solver.n_local_points())
        .map(|i| solver.mass_weight(i) * scales.dimensionalize(field, solver.solution(field, i)))
        .sum();
    allreduce_sum(comm, local) * scales.l_ref.powi(3)
}

/// Volume-weighted average of `field`. Collective.
pub fn volume_average<S, C>(
    solver: &S,
    comm: &C,
    field: FieldKind,
    scales: &NondimensionalScales,
) -> f64
where
    S: SolverFields + ?Sized,
    C: Communicator + ?Sized,
{
    let integral = volume_integral(solver, comm, field, scales);
    integral / mesh_volume(solver, comm, scales)
}
