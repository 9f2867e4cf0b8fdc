//! Construction of the mirror mesh from the coupling tables.
//!
//! Every coupled solver face (boundary mirror) or element (volume mirror) becomes
//! one mirror element whose vertices sit at the solver's GLL geometry sampled on
//! the mirror's own GLL grid. Each rank computes the vertices of its own entries;
//! an all-gatherv then replicates the full mesh on every rank. Vertices are not
//! merged between neighbouring elements.

use super::node_index::{ElementKind, MirrorOrder, NodeIndexMap, SideIndexMap};
use crate::algs::communicator::Communicator;
use crate::algs::wire::allgatherv_values;
use crate::backend::SolverMesh;
use crate::config::{AppContext, MeshConfig, ProblemConfig};
use crate::coupling::{BoundaryCouplingTable, CouplingMode, VolumeCouplingTable};
use crate::coupling_error::CouplingError;
use crate::debug_invariants::{DebugInvariants, ensure};
use crate::geometry::jacobian::{hex_min_jacobian, quad_min_jacobian, validate_min_jacobian};
use crate::interpolation::InterpolationOperator;
use crate::interpolation::operator::{face_corner_indices, volume_corner_indices};
use std::collections::HashMap;
use std::sync::Arc;

/// A sideset entry of the volume mirror: `(element, mirror side, sideset id)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SideEntry {
    pub element: usize,
    pub side: usize,
    pub boundary_id: i32,
}

/// Boundary information attached to volume mirror elements.
#[derive(Clone, Debug, Default)]
struct BoundaryLookup {
    faces_on_element: HashMap<usize, usize>,
    ids: HashMap<(usize, usize), i32>,
}

/// The read-only mirror mesh replicated on every rank.
#[derive(Clone, Debug)]
pub struct MirrorMesh {
    kind: ElementKind,
    scaling: f64,
    node_map: NodeIndexMap,
    side_map: Option<SideIndexMap>,
    vertices: Vec<[f64; 3]>,
    n_elements: usize,
    owner: Arc<[usize]>,
    volume_coupled: bool,
    sidesets: Vec<SideEntry>,
    boundary: BoundaryLookup,
}

/// Builds a [`MirrorMesh`] for one solver mesh.
pub struct MirrorMeshBuilder<'a, M: ?Sized, C: ?Sized> {
    solver: &'a M,
    comm: &'a C,
    order: MirrorOrder,
    scaling: f64,
    build_only: bool,
}

impl<'a, M, C> MirrorMeshBuilder<'a, M, C>
where
    M: SolverMesh + ?Sized,
    C: Communicator + ?Sized,
{
    pub fn new(solver: &'a M, comm: &'a C) -> Self {
        Self {
            solver,
            comm,
            order: MirrorOrder::First,
            scaling: 1.0,
            build_only: false,
        }
    }

    /// A builder carrying the validated `[Mesh]` options of this application.
    pub fn from_config(
        solver: &'a M,
        comm: &'a C,
        mesh: &MeshConfig,
        problem: &ProblemConfig,
        ctx: &AppContext,
    ) -> Result<Self, CouplingError> {
        mesh.validate(ctx, problem)?;
        Ok(Self::new(solver, comm)
            .order(mesh.order)
            .scaling(mesh.scaling)
            .build_only(ctx.build_only))
    }

    /// The coupling requested by `mesh`, or `None` for build-only runs. Collective.
    pub fn coupling_mode(&self, mesh: &MeshConfig) -> Result<Option<CouplingMode>, CouplingError> {
        if self.build_only {
            return Ok(None);
        }
        CouplingMode::build(self.solver, mesh.boundary.as_deref(), mesh.volume, self.comm).map(Some)
    }

    pub fn order(mut self, order: MirrorOrder) -> Self {
        self.order = order;
        self
    }

    /// Factor applied to every solver coordinate.
    pub fn scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn build_only(mut self, build_only: bool) -> Self {
        self.build_only = build_only;
        self
    }

    /// Build the mirror matching `mode`. Collective unless build-only.
    ///
    /// Build-only runs get a single unit [`ElementKind::Quad4`] regardless of `mode`.
    pub fn build_mesh(&self, mode: Option<&CouplingMode>) -> Result<MirrorMesh, CouplingError> {
        if self.build_only {
            return Ok(MirrorMesh::build_dummy_mesh());
        }
        let mesh = match mode {
            None => {
                return Err(CouplingError::Config(
                    "at least one of boundary coupling or volume coupling must be requested"
                        .into(),
                ));
            }
            Some(CouplingMode::Boundary(table)) => self.extract_surface_mesh(table)?,
            Some(CouplingMode::Volume(volume)) => self.extract_volume_mesh(volume, None)?,
            Some(CouplingMode::Both { boundary, volume }) => {
                self.extract_volume_mesh(volume, Some(boundary))?
            }
        };
        mesh.debug_assert_invariants();
        log::info!(
            "built {} {:?} mirror elements ({} coupling, scaling {})",
            mesh.n_elements(),
            mesh.kind(),
            mode.map(CouplingMode::name).unwrap_or("no"),
            mesh.scaling()
        );
        Ok(mesh)
    }

    /// One Quad4/Quad9 per coupled boundary face.
    pub fn extract_surface_mesh(
        &self,
        table: &BoundaryCouplingTable,
    ) -> Result<MirrorMesh, CouplingError> {
        let kind = ElementKind::for_mode(false, self.order);
        let node_map = NodeIndexMap::new(kind);
        let mut op = self.operator()?;
        let mut local = Vec::with_capacity(table.local_count() * kind.n_nodes() * 3);
        for i in table.local_range() {
            let (e, f) = (table.element()[i], table.face()[i]);
            let solver_points: Vec<[f64; 3]> = (0..self.solver.points_per_face())
                .map(|p| self.solver.point_coordinates(self.solver.face_point_index(e, f, p)))
                .collect();
            self.push_element(&mut op, &node_map, &solver_points, &mut local)?;
        }
        let vertices = self.gather(&local, table.counts_per_rank(), kind.n_nodes())?;
        MirrorMesh::assemble(
            kind,
            self.scaling,
            node_map,
            None,
            vertices,
            table.owner_handle(),
            false,
        )
    }

    /// One Hex8/Hex27 per solver element, with sidesets when `boundary` is given.
    pub fn extract_volume_mesh(
        &self,
        volume: &VolumeCouplingTable,
        boundary: Option<&BoundaryCouplingTable>,
    ) -> Result<MirrorMesh, CouplingError> {
        let kind = ElementKind::for_mode(true, self.order);
        let node_map = NodeIndexMap::new(kind);
        let side_map = SideIndexMap::new()?;
        let mut op = self.operator()?;
        let per_element = self.solver.points_per_element();
        let mut local = Vec::with_capacity(volume.element_count() * kind.n_nodes() * 3);
        for i in volume.local_range() {
            let e = volume.element()[i];
            let solver_points: Vec<[f64; 3]> = (e * per_element..(e + 1) * per_element)
                .map(|idx| self.solver.point_coordinates(idx))
                .collect();
            self.push_element(&mut op, &node_map, &solver_points, &mut local)?;
        }
        let vertices = self.gather(&local, volume.counts_per_rank(), kind.n_nodes())?;
        let mut mesh = MirrorMesh::assemble(
            kind,
            self.scaling,
            node_map,
            Some(side_map),
            vertices,
            volume.owner_handle(),
            true,
        )?;
        if let Some(boundary) = boundary {
            mesh.attach_sidesets(volume, boundary)?;
        }
        Ok(mesh)
    }

    fn operator(&self) -> Result<InterpolationOperator, CouplingError> {
        InterpolationOperator::new(self.solver.points_per_dim(), self.order.points_per_dim())
    }

    /// Sample one element's geometry on the mirror grid and append it in node order.
    fn push_element(
        &self,
        op: &mut InterpolationOperator,
        node_map: &NodeIndexMap,
        solver_points: &[[f64; 3]],
        out: &mut Vec<f64>,
    ) -> Result<(), CouplingError> {
        let volume = node_map.kind().dimension() == 3;
        let n_nodes = node_map.len();
        let mut components = [
            vec![0.0; n_nodes],
            vec![0.0; n_nodes],
            vec![0.0; n_nodes],
        ];
        let corners: Vec<usize> = if volume {
            volume_corner_indices(op.solver_points()).to_vec()
        } else {
            face_corner_indices(op.solver_points()).to_vec()
        };
        for (d, tensor) in components.iter_mut().enumerate() {
            let solver: Vec<f64> = solver_points.iter().map(|c| c[d]).collect();
            if op.needs_interpolation() {
                if volume {
                    op.outgoing_3d(&solver, tensor)?;
                } else {
                    op.outgoing_2d(&solver, tensor)?;
                }
            } else {
                for (slot, &c) in tensor.iter_mut().zip(&corners) {
                    *slot = solver[c];
                }
            }
        }
        let nodal = components.map(|tensor| node_map.to_node_order(&tensor));
        for n in 0..n_nodes {
            for component in &nodal {
                out.push(component[n] * self.scaling);
            }
        }
        Ok(())
    }

    fn gather(
        &self,
        local: &[f64],
        counts_per_rank: &[usize],
        nodes_per_element: usize,
    ) -> Result<Vec<[f64; 3]>, CouplingError> {
        let counts: Vec<usize> = counts_per_rank
            .iter()
            .map(|&c| c * nodes_per_element * 3)
            .collect();
        let flat = allgatherv_values(self.comm, local, &counts)?;
        Ok(flat
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect())
    }
}

impl MirrorMesh {
    /// A single unit square, used when the solver only compiles its case.
    pub fn build_dummy_mesh() -> Self {
        let kind = ElementKind::Quad4;
        Self {
            kind,
            scaling: 1.0,
            node_map: NodeIndexMap::new(kind),
            side_map: None,
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            n_elements: 1,
            owner: Arc::from(vec![0]),
            volume_coupled: false,
            sidesets: Vec::new(),
            boundary: BoundaryLookup::default(),
        }
    }

    fn assemble(
        kind: ElementKind,
        scaling: f64,
        node_map: NodeIndexMap,
        side_map: Option<SideIndexMap>,
        vertices: Vec<[f64; 3]>,
        owner: Arc<[usize]>,
        volume_coupled: bool,
    ) -> Result<Self, CouplingError> {
        let n_nodes = kind.n_nodes();
        if vertices.len() != owner.len() * n_nodes {
            return Err(CouplingError::BufferLength {
                expected: owner.len() * n_nodes,
                found: vertices.len(),
            });
        }
        let mesh = Self {
            kind,
            scaling,
            node_map,
            side_map,
            n_elements: owner.len(),
            vertices,
            owner,
            volume_coupled,
            sidesets: Vec::new(),
            boundary: BoundaryLookup::default(),
        };
        mesh.validate_geometry()?;
        Ok(mesh)
    }

    /// Every element must have positive corner Jacobians (hex) or consistently
    /// oriented corners (quad).
    pub fn validate_geometry(&self) -> Result<(), CouplingError> {
        let corners = self.kind.n_corners();
        for elem in 0..self.n_elements {
            let v = &self.element_vertices(elem)[..corners];
            let min = if self.kind.dimension() == 3 {
                hex_min_jacobian(v)?
            } else {
                quad_min_jacobian(v)?
            };
            validate_min_jacobian(min, elem)?;
        }
        Ok(())
    }

    fn attach_sidesets(
        &mut self,
        volume: &VolumeCouplingTable,
        boundary: &BoundaryCouplingTable,
    ) -> Result<(), CouplingError> {
        let side_map = self
            .side_map
            .clone()
            .ok_or(CouplingError::NotCoupled("volume"))?;
        let global: HashMap<(usize, usize), usize> = volume
            .element()
            .iter()
            .enumerate()
            .map(|(i, &e)| ((volume.processor_id(i), e), i))
            .collect();
        for i in 0..boundary.len() {
            let key = (boundary.processor_id(i), boundary.element()[i]);
            let Some(&elem) = global.get(&key) else {
                return Err(CouplingError::TableInvariant(format!(
                    "boundary face {i} lies on element {} of rank {} missing from the volume table",
                    key.1, key.0
                )));
            };
            let face = boundary.face()[i];
            let boundary_id = boundary.boundary_id()[i];
            self.sidesets.push(SideEntry {
                element: elem,
                side: side_map.mirror_side(face),
                boundary_id,
            });
            *self.boundary.faces_on_element.entry(elem).or_insert(0) += 1;
            self.boundary.ids.insert((elem, face), boundary_id);
        }
        log::debug!("attached {} sideset faces to the volume mirror", self.sidesets.len());
        Ok(())
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn order(&self) -> MirrorOrder {
        self.kind.order()
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    pub fn node_index_map(&self) -> &NodeIndexMap {
        &self.node_map
    }

    pub fn side_index_map(&self) -> Option<&SideIndexMap> {
        self.side_map.as_ref()
    }

    pub fn n_elements(&self) -> usize {
        self.n_elements
    }

    pub fn nodes_per_element(&self) -> usize {
        self.kind.n_nodes()
    }

    /// Vertices of `elem` in mirror node order.
    pub fn element_vertices(&self, elem: usize) -> &[[f64; 3]] {
        let n = self.nodes_per_element();
        &self.vertices[elem * n..(elem + 1) * n]
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Rank owning mirror element `elem`.
    pub fn processor_id(&self, elem: usize) -> usize {
        self.owner[elem]
    }

    pub fn owners(&self) -> &[usize] {
        &self.owner
    }

    pub fn is_volume(&self) -> bool {
        self.volume_coupled
    }

    /// Sideset faces of the volume mirror (empty without boundary coupling).
    pub fn sidesets(&self) -> &[SideEntry] {
        &self.sidesets
    }

    /// Number of coupled boundary faces on volume mirror element `elem`.
    pub fn faces_on_boundary(&self, elem: usize) -> Result<usize, CouplingError> {
        self.check_volume_element(elem)?;
        Ok(self.boundary.faces_on_element.get(&elem).copied().unwrap_or(0))
    }

    /// Sideset id of solver face `face` on volume mirror element `elem`, `-1` if none.
    pub fn boundary_id(&self, elem: usize, face: usize) -> Result<i32, CouplingError> {
        self.check_volume_element(elem)?;
        Ok(self.boundary.ids.get(&(elem, face)).copied().unwrap_or(-1))
    }

    fn check_volume_element(&self, elem: usize) -> Result<(), CouplingError> {
        if !self.volume_coupled {
            return Err(CouplingError::NotCoupled("volume"));
        }
        if elem >= self.n_elements {
            return Err(CouplingError::IndexOutOfBounds {
                what: "volume mirror elements",
                index: elem,
                len: self.n_elements,
            });
        }
        Ok(())
    }
}

impl DebugInvariants for MirrorMesh {
    fn validate_invariants(&self) -> Result<(), CouplingError> {
        let n_nodes = self.nodes_per_element();
        ensure(self.node_map.len() == n_nodes, || {
            format!("node map covers {} of {n_nodes} nodes", self.node_map.len())
        })?;
        ensure(self.vertices.len() == self.n_elements * n_nodes, || {
            format!(
                "{} vertices for {} elements of {n_nodes} nodes",
                self.vertices.len(),
                self.n_elements
            )
        })?;
        ensure(self.owner.len() == self.n_elements, || {
            format!("{} owners for {} elements", self.owner.len(), self.n_elements)
        })?;
        ensure(
            self.sidesets
                .iter()
                .all(|s| s.element < self.n_elements && s.side < 6),
            || "sideset entry outside the mirror mesh".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_mesh_is_one_unit_quad() {
        let mesh = MirrorMesh::build_dummy_mesh();
        assert_eq!(mesh.n_elements(), 1);
        assert_eq!(mesh.kind(), ElementKind::Quad4);
        assert_eq!(mesh.processor_id(0), 0);
        mesh.validate_geometry().unwrap();
        mesh.validate_invariants().unwrap();
        assert_eq!(mesh.faces_on_boundary(0), Err(CouplingError::NotCoupled("volume")));
    }
}
