//! Outgoing (solver → mirror) and incoming (mirror → solver) field transfers.
//!
//! Outgoing transfers are collective: every rank extracts its own faces or
//! elements, samples them on the mirror grid, converts to physical units and
//! all-gathers the result, so every rank holds the full mirror solution in tensor
//! order. Each rank then writes only the host nodes it owns.
//!
//! Incoming transfers first gather the host's solution, since the host may
//! distribute the mirror differently from the solver. The solver owner of a
//! mirror element then interpolates it back onto the solver's GLL points and
//! writes nondimensional values.

use super::field::{FieldKind, OutputField, WriteField};
use super::scales::NondimensionalScales;
use crate::algs::communicator::Communicator;
use crate::algs::wire::{allgather_count, allgatherv_values};
use crate::backend::{SolverFields, SolverMesh};
use crate::coupling::{BoundaryCouplingTable, CouplingMode, VolumeCouplingTable};
use crate::coupling_error::CouplingError;
use crate::host::HostField;
use crate::interpolation::InterpolationOperator;
use crate::interpolation::operator::{face_corner_indices, volume_corner_indices};
use crate::mirror::{ElementKind, MirrorMesh, NodeIndexMap};
use itertools::iproduct;

/// Moves fields between the solver and the host's mirror mesh.
#[derive(Debug)]
pub struct FieldTransferEngine {
    mode: CouplingMode,
    mirror: MirrorMesh,
    interp: InterpolationOperator,
    scales: NondimensionalScales,
    outputs: Vec<(FieldKind, usize)>,
    face_map: NodeIndexMap,
    rank: usize,
}

impl FieldTransferEngine {
    pub fn new(
        mode: CouplingMode,
        mirror: MirrorMesh,
        solver_points: usize,
        scales: NondimensionalScales,
    ) -> Result<Self, CouplingError> {
        let interp = InterpolationOperator::new(solver_points, mirror.order().points_per_dim())?;
        let rank = match (mode.volume(), mode.boundary()) {
            (Some(volume), _) => volume.layout().rank(),
            (None, Some(boundary)) => boundary.layout().rank(),
            (None, None) => 0,
        };
        let face_map = NodeIndexMap::new(ElementKind::for_mode(false, mirror.order()));
        Ok(Self {
            mode,
            mirror,
            interp,
            scales,
            outputs: Vec::new(),
            face_map,
            rank,
        })
    }

    pub fn mode(&self) -> &CouplingMode {
        &self.mode
    }

    pub fn mirror(&self) -> &MirrorMesh {
        &self.mirror
    }

    pub fn scales(&self) -> &NondimensionalScales {
        &self.scales
    }

    pub fn interpolation(&self) -> &InterpolationOperator {
        &self.interp
    }

    /// Registered outputs as `(field, host variable)` pairs.
    pub fn outputs(&self) -> &[(FieldKind, usize)] {
        &self.outputs
    }

    /// Add one host variable per output component.
    ///
    /// Temperature output needs a solver temperature field.
    pub fn register_outputs<H: HostField + ?Sized>(
        &mut self,
        host: &mut H,
        outputs: &[OutputField],
        has_temperature: bool,
    ) -> Result<(), CouplingError> {
        for output in outputs {
            if *output == OutputField::Temperature && !has_temperature {
                return Err(CouplingError::Config(
                    "Cannot set 'output = temperature' because the solver case does not have a temperature variable!"
                        .into(),
                ));
            }
            for &kind in output.components() {
                if self.outputs.iter().any(|(k, _)| *k == kind) {
                    continue;
                }
                let var = host.add_variable(kind.variable_name());
                self.outputs.push((kind, var));
            }
        }
        Ok(())
    }

    fn boundary_table(&self) -> Result<&BoundaryCouplingTable, CouplingError> {
        self.mode.boundary().ok_or(CouplingError::NotCoupled("boundary"))
    }

    fn volume_table(&self) -> Result<&VolumeCouplingTable, CouplingError> {
        self.mode.volume().ok_or(CouplingError::NotCoupled("volume"))
    }

    /// Mirror values of `field` on every coupled boundary face, tensor ordered,
    /// `mirror_points²` per face. Collective.
    pub fn boundary_solution<S, C>(
        &mut self,
        solver: &S,
        comm: &C,
        field: FieldKind,
    ) -> Result<Vec<f64>, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
        C: Communicator + ?Sized,
    {
        let table = self.mode.boundary().ok_or(CouplingError::NotCoupled("boundary"))?;
        let mp = self.interp.mirror_points();
        let per_face = mp * mp;
        let corners = face_corner_indices(self.interp.solver_points());
        let mut local = Vec::with_capacity(table.local_count() * per_face);
        let mut sampled = vec![0.0; per_face];
        for i in table.local_range() {
            let (e, f) = (table.element()[i], table.face()[i]);
            let face: Vec<f64> = (0..solver.points_per_face())
                .map(|p| solver.solution(field, solver.face_point_index(e, f, p)))
                .collect();
            if self.interp.needs_interpolation() {
                self.interp.outgoing_2d(&face, &mut sampled)?;
            } else {
                for (slot, &c) in sampled.iter_mut().zip(&corners) {
                    *slot = face[c];
                }
            }
            local.extend(sampled.iter().map(|&v| self.scales.dimensionalize(field, v)));
        }
        let counts: Vec<usize> = table.counts_per_rank().iter().map(|&c| c * per_face).collect();
        log::debug!(
            "gathering {field:?} on {} boundary faces ({} local values)",
            table.total_count(),
            local.len()
        );
        allgatherv_values(comm, &local, &counts)
    }

    /// Mirror values of `field` on every volume element, tensor ordered,
    /// `mirror_points³` per element. Collective.
    pub fn volume_solution<S, C>(
        &mut self,
        solver: &S,
        comm: &C,
        field: FieldKind,
    ) -> Result<Vec<f64>, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
        C: Communicator + ?Sized,
    {
        let table = self.mode.volume().ok_or(CouplingError::NotCoupled("volume"))?;
        let mp = self.interp.mirror_points();
        let per_element = mp * mp * mp;
        let solver_per_element = solver.points_per_element();
        let corners = volume_corner_indices(self.interp.solver_points());
        let mut local = Vec::with_capacity(table.element_count() * per_element);
        let mut sampled = vec![0.0; per_element];
        for i in table.local_range() {
            let offset = table.element()[i] * solver_per_element;
            let element: Vec<f64> = (offset..offset + solver_per_element)
                .map(|idx| solver.solution(field, idx))
                .collect();
            if self.interp.needs_interpolation() {
                self.interp.outgoing_3d(&element, &mut sampled)?;
            } else {
                for (slot, &c) in sampled.iter_mut().zip(&corners) {
                    *slot = element[c];
                }
            }
            local.extend(sampled.iter().map(|&v| self.scales.dimensionalize(field, v)));
        }
        let counts: Vec<usize> = table
            .counts_per_rank()
            .iter()
            .map(|&c| c * per_element)
            .collect();
        log::debug!(
            "gathering {field:?} on {} volume elements ({} local values)",
            table.total_count(),
            local.len()
        );
        allgatherv_values(comm, &local, &counts)
    }

    /// Mirror values of `field` through the active table (volume when present).
    pub fn solution<S, C>(
        &mut self,
        solver: &S,
        comm: &C,
        field: FieldKind,
    ) -> Result<Vec<f64>, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
        C: Communicator + ?Sized,
    {
        if self.mode.is_volume() {
            self.volume_solution(solver, comm, field)
        } else {
            self.boundary_solution(solver, comm, field)
        }
    }

    /// Scatter gathered tensor-ordered values into the host nodes this rank owns.
    pub fn fill_host<H: HostField + ?Sized>(
        &self,
        host: &mut H,
        var: usize,
        values: &[f64],
    ) -> Result<(), CouplingError> {
        let n_nodes = self.mirror.nodes_per_element();
        let expected = self.mirror.n_elements() * n_nodes;
        if values.len() != expected {
            return Err(CouplingError::BufferLength {
                expected,
                found: values.len(),
            });
        }
        let map = self.mirror.node_index_map();
        let rank = host.rank();
        for (e, n) in iproduct!(0..self.mirror.n_elements(), 0..n_nodes) {
            if host.node_owner(e, n) == Some(rank) {
                host.set_dof(var, e, n, values[e * n_nodes + map.gll_index(n)]);
            }
        }
        Ok(())
    }

    /// Transfer every registered output into the host. Collective.
    pub fn extract_outputs<S, C, H>(
        &mut self,
        solver: &S,
        comm: &C,
        host: &mut H,
    ) -> Result<(), CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
        C: Communicator + ?Sized,
        H: HostField + ?Sized,
    {
        let outputs = self.outputs.clone();
        for (field, var) in outputs {
            let values = self.solution(solver, comm, field)?;
            self.fill_host(host, var, &values)?;
        }
        host.close();
        Ok(())
    }

    /// Write node-ordered mirror values of volume element `elem` into the solver.
    ///
    /// `add`, when given, holds one correction per solver point of the element in
    /// solver units and is added after conversion. Returns `false` without writing
    /// when another rank owns `elem`.
    pub fn write_volume_solution<S>(
        &mut self,
        solver: &mut S,
        elem: usize,
        field: WriteField,
        values: &[f64],
        add: Option<&[f64]>,
    ) -> Result<bool, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
    {
        let Some(solver_values) = self.incoming_volume(solver.points_per_element(), elem, values)?
        else {
            return Ok(false);
        };
        let n = solver_values.len();
        if let Some(add) = add {
            if add.len() != n {
                return Err(CouplingError::BufferLength {
                    expected: n,
                    found: add.len(),
                });
            }
        }
        let offset = self.volume_table()?.element()[elem] * n;
        for (p, &v) in solver_values.iter().enumerate() {
            let correction = add.map_or(0.0, |a| a[p]);
            solver.set_solution(field, offset + p, self.scales.nondimensionalize(field, v) + correction);
        }
        Ok(true)
    }

    /// Write node-ordered mirror values of volume element `elem` onto its coupled
    /// boundary faces only. Requires both boundary and volume coupling.
    pub fn write_volume_boundary_solution<S>(
        &mut self,
        solver: &mut S,
        elem: usize,
        field: WriteField,
        values: &[f64],
    ) -> Result<bool, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
    {
        self.boundary_table()?;
        let Some(solver_values) = self.incoming_volume(solver.points_per_element(), elem, values)?
        else {
            return Ok(false);
        };
        let n = solver_values.len();
        let e = self.volume_table()?.element()[elem];
        let offset = e * n;
        for f in 0..solver.faces_per_element() {
            if self.mirror.boundary_id(elem, f)? < 0 {
                continue;
            }
            for p in 0..solver.points_per_face() {
                let idx = solver.face_point_index(e, f, p);
                let v = solver_values[idx - offset];
                solver.set_solution(field, idx, self.scales.nondimensionalize(field, v));
            }
        }
        Ok(true)
    }

    /// Write node-ordered mirror values of boundary face `face_id` into the solver.
    /// Returns `false` without writing when another rank owns the face.
    pub fn write_boundary_solution<S>(
        &mut self,
        solver: &mut S,
        face_id: usize,
        field: WriteField,
        values: &[f64],
    ) -> Result<bool, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
    {
        let table = self.mode.boundary().ok_or(CouplingError::NotCoupled("boundary"))?;
        if face_id >= table.len() {
            return Err(CouplingError::IndexOutOfBounds {
                what: "boundary coupling table",
                index: face_id,
                len: table.len(),
            });
        }
        if table.processor_id(face_id) != self.rank {
            return Ok(false);
        }
        let (e, f) = (table.element()[face_id], table.face()[face_id]);
        let mp = self.interp.mirror_points();
        check_len(values.len(), mp * mp)?;
        let tensor = self.face_map.to_tensor_order(values);
        let mut solver_values = vec![0.0; solver.points_per_face()];
        self.interp.incoming_2d(&tensor, &mut solver_values)?;
        for (p, &v) in solver_values.iter().enumerate() {
            let idx = solver.face_point_index(e, f, p);
            solver.set_solution(field, idx, self.scales.nondimensionalize(field, v));
        }
        Ok(true)
    }

    /// Gather `var` from every host rank so each rank holds the whole mirror
    /// solution, node ordered per element. Collective.
    ///
    /// Each rank contributes the nodes its host storage owns, which need not
    /// match the solver's element ownership.
    pub fn gather_host<H, C>(
        &self,
        comm: &C,
        host: &H,
        var: usize,
    ) -> Result<Vec<f64>, CouplingError>
    where
        H: HostField + ?Sized,
        C: Communicator + ?Sized,
    {
        let n_nodes = self.mirror.nodes_per_element();
        let rank = host.rank();
        let mut index = Vec::new();
        let mut value = Vec::new();
        for (e, n) in iproduct!(0..self.mirror.n_elements(), 0..n_nodes) {
            if host.node_owner(e, n) == Some(rank) {
                index.push((e * n_nodes + n) as u64);
                value.push(host.dof(var, e, n));
            }
        }
        let counts = allgather_count(comm, index.len());
        let index = allgatherv_values(comm, &index, &counts)?;
        let value = allgatherv_values(comm, &value, &counts)?;

        let mut gathered = vec![0.0; self.mirror.n_elements() * n_nodes];
        for (i, v) in index.into_iter().zip(value) {
            let len = gathered.len();
            let slot = gathered
                .get_mut(i as usize)
                .ok_or(CouplingError::IndexOutOfBounds {
                    what: "gathered host solution",
                    index: i as usize,
                    len,
                })?;
            *slot = v;
        }
        Ok(gathered)
    }

    /// Gather `var` from the host and write it into the solver for every mirror
    /// element this rank owns. Returns the number of elements written. Collective.
    ///
    /// Heat flux on a volume mirror lands on the coupled boundary faces only.
    pub fn write_from_host<S, C, H>(
        &mut self,
        solver: &mut S,
        comm: &C,
        host: &H,
        var: usize,
        field: WriteField,
    ) -> Result<usize, CouplingError>
    where
        S: SolverMesh + SolverFields + ?Sized,
        C: Communicator + ?Sized,
        H: HostField + ?Sized,
    {
        let gathered = self.gather_host(comm, host, var)?;
        let n_nodes = self.mirror.nodes_per_element();
        let both = matches!(self.mode, CouplingMode::Both { .. });
        let boundary_only = matches!(self.mode, CouplingMode::Boundary(_));
        let mut written = 0;
        for elem in 0..self.mirror.n_elements() {
            if self.mirror.processor_id(elem) != self.rank {
                continue;
            }
            let values = &gathered[elem * n_nodes..(elem + 1) * n_nodes];
            let wrote = if both && field == WriteField::HeatFlux {
                self.write_volume_boundary_solution(solver, elem, field, values)?
            } else if boundary_only {
                self.write_boundary_solution(solver, elem, field, values)?
            } else {
                self.write_volume_solution(solver, elem, field, values, None)?
            };
            written += usize::from(wrote);
        }
        log::debug!("wrote {field:?} on {written} mirror elements");
        Ok(written)
    }

    /// Interpolate one node-ordered volume mirror element onto the solver grid.
    /// `None` when another rank owns it.
    fn incoming_volume(
        &mut self,
        solver_per_element: usize,
        elem: usize,
        values: &[f64],
    ) -> Result<Option<Vec<f64>>, CouplingError> {
        let table = self.volume_table()?;
        if elem >= table.len() {
            return Err(CouplingError::IndexOutOfBounds {
                what: "volume coupling table",
                index: elem,
                len: table.len(),
            });
        }
        if table.processor_id(elem) != self.rank {
            return Ok(None);
        }
        check_len(values.len(), self.mirror.nodes_per_element())?;
        let tensor = self.mirror.node_index_map().to_tensor_order(values);
        let mut solver_values = vec![0.0; solver_per_element];
        self.interp.incoming_3d(&tensor, &mut solver_values)?;
        Ok(Some(solver_values))
    }
}

fn check_len(found: usize, expected: usize) -> Result<(), CouplingError> {
    if found == expected {
        Ok(())
    } else {
        Err(CouplingError::BufferLength { expected, found })
    }
}
