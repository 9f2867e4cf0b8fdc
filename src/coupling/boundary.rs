//! Inventory of the solver faces lying on coupling boundaries.

use super::RankLayout;
use crate::algs::communicator::Communicator;
use crate::algs::wire::allgatherv_values;
use crate::backend::SolverMesh;
use crate::coupling_error::CouplingError;
use crate::debug_invariants::{DebugInvariants, ensure};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

/// Every coupled `(element, face)` pair of every rank, concatenated by rank.
#[derive(Clone, Debug)]
pub struct BoundaryCouplingTable {
    element: Vec<usize>,
    face: Vec<usize>,
    boundary_id: Vec<i32>,
    owner: Arc<[usize]>,
    layout: RankLayout,
    /// `(owner, element, face)` → table index.
    index: HashMap<(usize, usize, usize), usize>,
    /// `(owner, element)` → number of coupled faces.
    faces_per_element: HashMap<(usize, usize), usize>,
}

impl BoundaryCouplingTable {
    /// Collect the faces whose sideset id is in `boundary_ids` on every rank.
    ///
    /// Collective. Ranks without matching faces contribute empty blocks; the call
    /// fails only when no rank found any face.
    pub fn build<M, C>(mesh: &M, boundary_ids: &[i32], comm: &C) -> Result<Self, CouplingError>
    where
        M: SolverMesh + ?Sized,
        C: Communicator + ?Sized,
    {
        let mut element = Vec::new();
        let mut face = Vec::new();
        let mut boundary_id = Vec::new();
        for e in 0..mesh.n_local_elements() {
            for f in 0..mesh.faces_per_element() {
                if let Some(id) = mesh.face_boundary_id(e, f) {
                    if boundary_ids.contains(&id) {
                        element.push(e as u64);
                        face.push(f as u64);
                        boundary_id.push(id as i64);
                    }
                }
            }
        }

        let layout = RankLayout::gather(comm, element.len());
        log::debug!(
            "rank {} owns {} of {} coupled boundary faces",
            layout.rank(),
            layout.local_count(),
            layout.total_count()
        );
        if layout.total_count() == 0 {
            return Err(CouplingError::NoCoupledElements { mode: "boundary" });
        }

        let counts = layout.counts_per_rank();
        let element = allgatherv_values(comm, &element, counts)?;
        let face = allgatherv_values(comm, &face, counts)?;
        let boundary_id = allgatherv_values(comm, &boundary_id, counts)?;

        Self::from_parts(
            element.into_iter().map(|e| e as usize).collect(),
            face.into_iter().map(|f| f as usize).collect(),
            boundary_id.into_iter().map(|b| b as i32).collect(),
            layout,
        )
    }

    /// Assemble a table from gathered columns.
    pub fn from_parts(
        element: Vec<usize>,
        face: Vec<usize>,
        boundary_id: Vec<i32>,
        layout: RankLayout,
    ) -> Result<Self, CouplingError> {
        let owner = layout.owners();
        let mut index = HashMap::with_capacity(element.len());
        let mut faces_per_element = HashMap::new();
        for (i, (&e, &f)) in element.iter().zip(&face).enumerate() {
            let rank = owner.get(i).copied().unwrap_or(usize::MAX);
            index.insert((rank, e, f), i);
            *faces_per_element.entry((rank, e)).or_insert(0) += 1;
        }
        let table = Self {
            element,
            face,
            boundary_id,
            owner,
            layout,
            index,
            faces_per_element,
        };
        table.validate_invariants()?;
        Ok(table)
    }

    /// Rank-local element of entry `i`.
    pub fn element(&self) -> &[usize] {
        &self.element
    }

    /// Element-local face of every entry.
    pub fn face(&self) -> &[usize] {
        &self.face
    }

    /// Sideset id of every entry.
    pub fn boundary_id(&self) -> &[i32] {
        &self.boundary_id
    }

    /// Owning rank of every entry.
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// Shared handle to the owner column.
    pub fn owner_handle(&self) -> Arc<[usize]> {
        self.owner.clone()
    }

    pub fn processor_id(&self, i: usize) -> usize {
        self.owner[i]
    }

    pub fn counts_per_rank(&self) -> &[usize] {
        self.layout.counts_per_rank()
    }

    pub fn local_count(&self) -> usize {
        self.layout.local_count()
    }

    pub fn total_count(&self) -> usize {
        self.layout.total_count()
    }

    pub fn rank_offset(&self) -> usize {
        self.layout.rank_offset()
    }

    pub fn layout(&self) -> &RankLayout {
        &self.layout
    }

    /// Entries owned by the calling rank.
    pub fn local_range(&self) -> Range<usize> {
        self.layout.range_of(self.layout.rank())
    }

    /// Entries contributed by `rank`.
    pub fn entries_for_rank(&self, rank: usize) -> Range<usize> {
        self.layout.range_of(rank)
    }

    /// Sideset id of `face` on `element` of `rank`, if that face is coupled.
    pub fn boundary_id_of(&self, rank: usize, element: usize, face: usize) -> Option<i32> {
        self.index
            .get(&(rank, element, face))
            .map(|&i| self.boundary_id[i])
    }

    /// Number of coupled faces on `element` of `rank`.
    pub fn faces_on_element(&self, rank: usize, element: usize) -> usize {
        self.faces_per_element
            .get(&(rank, element))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.element.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element.is_empty()
    }
}

impl DebugInvariants for BoundaryCouplingTable {
    fn validate_invariants(&self) -> Result<(), CouplingError> {
        let n = self.element.len();
        ensure(
            self.face.len() == n && self.boundary_id.len() == n && self.owner.len() == n,
            || {
                format!(
                    "column lengths differ: element {n}, face {}, boundary_id {}, owner {}",
                    self.face.len(),
                    self.boundary_id.len(),
                    self.owner.len()
                )
            },
        )?;
        self.layout.validate_owners(&self.owner)?;
        ensure(self.index.len() == n, || {
            "duplicate (owner, element, face) entries".to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rank: usize) -> BoundaryCouplingTable {
        BoundaryCouplingTable::from_parts(
            vec![0, 0, 3, 1],
            vec![2, 5, 0, 4],
            vec![1, 2, 1, 1],
            RankLayout::from_counts(rank, vec![3, 1]),
        )
        .unwrap()
    }

    #[test]
    fn lookups_are_rank_qualified() {
        let t = table(1);
        assert_eq!(t.boundary_id_of(0, 0, 5), Some(2));
        assert_eq!(t.boundary_id_of(1, 0, 5), None);
        assert_eq!(t.faces_on_element(0, 0), 2);
        assert_eq!(t.faces_on_element(1, 1), 1);
        assert_eq!(t.local_range(), 3..4);
        assert_eq!(t.processor_id(2), 0);
    }

    #[test]
    fn duplicate_faces_are_rejected() {
        let err = BoundaryCouplingTable::from_parts(
            vec![0, 0],
            vec![1, 1],
            vec![1, 1],
            RankLayout::from_counts(0, vec![2]),
        )
        .unwrap_err();
        assert!(matches!(err, CouplingError::TableInvariant(_)));
    }
}
