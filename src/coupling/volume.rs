//! Inventory of the solver elements taking part in volume coupling.

use super::RankLayout;
use crate::algs::communicator::Communicator;
use crate::algs::wire::allgatherv_values;
use crate::backend::SolverMesh;
use crate::coupling_error::CouplingError;
use crate::debug_invariants::{DebugInvariants, ensure};
use std::ops::Range;
use std::sync::Arc;

/// Every local element of every rank, concatenated by rank.
#[derive(Clone, Debug)]
pub struct VolumeCouplingTable {
    element: Vec<usize>,
    owner: Arc<[usize]>,
    layout: RankLayout,
}

impl VolumeCouplingTable {
    /// Collective. Each rank contributes all of its elements in order.
    pub fn build<M, C>(mesh: &M, comm: &C) -> Result<Self, CouplingError>
    where
        M: SolverMesh + ?Sized,
        C: Communicator + ?Sized,
    {
        let local: Vec<u64> = (0..mesh.n_local_elements() as u64).collect();
        let layout = RankLayout::gather(comm, local.len());
        log::debug!(
            "rank {} owns {} of {} coupled volume elements",
            layout.rank(),
            layout.local_count(),
            layout.total_count()
        );
        if layout.total_count() == 0 {
            return Err(CouplingError::NoCoupledElements { mode: "volume" });
        }
        let element = allgatherv_values(comm, &local, layout.counts_per_rank())?;
        Self::from_parts(element.into_iter().map(|e| e as usize).collect(), layout)
    }

    /// Assemble a table from a gathered element column.
    pub fn from_parts(element: Vec<usize>, layout: RankLayout) -> Result<Self, CouplingError> {
        let owner = layout.owners();
        let table = Self {
            element,
            owner,
            layout,
        };
        table.validate_invariants()?;
        Ok(table)
    }

    pub fn element(&self) -> &[usize] {
        &self.element
    }

    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    pub fn owner_handle(&self) -> Arc<[usize]> {
        self.owner.clone()
    }

    pub fn processor_id(&self, i: usize) -> usize {
        self.owner[i]
    }

    pub fn counts_per_rank(&self) -> &[usize] {
        self.layout.counts_per_rank()
    }

    /// Number of elements owned by the calling rank.
    pub fn element_count(&self) -> usize {
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

    pub fn local_range(&self) -> Range<usize> {
        self.layout.range_of(self.layout.rank())
    }

    /// Entries contributed by `rank`.
    pub fn entries_for_rank(&self, rank: usize) -> Range<usize> {
        self.layout.range_of(rank)
    }

    pub fn len(&self) -> usize {
        self.element.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element.is_empty()
    }
}

impl DebugInvariants for VolumeCouplingTable {
    fn validate_invariants(&self) -> Result<(), CouplingError> {
        ensure(self.element.len() == self.owner.len(), || {
            format!(
                "element column has {} entries but owner column has {}",
                self.element.len(),
                self.owner.len()
            )
        })?;
        self.layout.validate_owners(&self.owner)
    }
}
