//! All-ranks-visible inventories of the solver faces and elements that take part
//! in data transfer.
//!
//! Both tables follow the same recipe: every rank enumerates its own elements in
//! order, keeps the matching entries, and a pair of collectives (counts, then
//! payload) replicates the concatenation on every rank. Rank `r`'s block starts
//! at `rank_offset(r)` and keeps the rank's enumeration order.

pub mod boundary;
pub mod volume;

pub use boundary::BoundaryCouplingTable;
pub use volume::VolumeCouplingTable;

use crate::algs::communicator::Communicator;
use crate::algs::wire::{allgather_count, displacements};
use crate::backend::SolverMesh;
use crate::coupling_error::CouplingError;
use crate::debug_invariants::ensure;
use std::ops::Range;
use std::sync::Arc;

/// Per-rank counts and the derived offsets of a gathered table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankLayout {
    rank: usize,
    counts_per_rank: Vec<usize>,
    offsets: Vec<usize>,
    total_count: usize,
}

impl RankLayout {
    /// Exchange `local_count` with every rank and derive offsets.
    pub fn gather<C: Communicator + ?Sized>(comm: &C, local_count: usize) -> Self {
        let counts_per_rank = allgather_count(comm, local_count);
        Self::from_counts(comm.rank(), counts_per_rank)
    }

    /// Build from already-known counts.
    pub fn from_counts(rank: usize, counts_per_rank: Vec<usize>) -> Self {
        let offsets = displacements(&counts_per_rank);
        let total_count = counts_per_rank.iter().sum();
        Self {
            rank,
            counts_per_rank,
            offsets,
            total_count,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn counts_per_rank(&self) -> &[usize] {
        &self.counts_per_rank
    }

    pub fn local_count(&self) -> usize {
        self.counts_per_rank.get(self.rank).copied().unwrap_or(0)
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Position where the calling rank's block begins.
    pub fn rank_offset(&self) -> usize {
        self.offsets.get(self.rank).copied().unwrap_or(self.total_count)
    }

    /// Range of entries contributed by `rank`.
    pub fn range_of(&self, rank: usize) -> Range<usize> {
        let start = self.offsets.get(rank).copied().unwrap_or(self.total_count);
        let len = self.counts_per_rank.get(rank).copied().unwrap_or(0);
        start..start + len
    }

    /// Owning rank of every entry, in concatenated order.
    pub fn owners(&self) -> Arc<[usize]> {
        self.counts_per_rank
            .iter()
            .enumerate()
            .flat_map(|(rank, &count)| std::iter::repeat_n(rank, count))
            .collect()
    }

    /// Check the layout against an owner column.
    pub(crate) fn validate_owners(&self, owner: &[usize]) -> Result<(), CouplingError> {
        ensure(self.total_count == owner.len(), || {
            format!(
                "sum of per-rank counts {} differs from {} entries",
                self.total_count,
                owner.len()
            )
        })?;
        ensure(owner.windows(2).all(|w| w[0] <= w[1]), || {
            "owner ranks are not contiguous per rank".to_string()
        })?;
        for (rank, &count) in self.counts_per_rank.iter().enumerate() {
            let range = self.range_of(rank);
            ensure(owner[range].iter().all(|&o| o == rank), || {
                format!("block of rank {rank} ({count} entries) has foreign owners")
            })?;
        }
        let before = self.rank.min(self.counts_per_rank.len());
        let prefix: usize = self.counts_per_rank[..before].iter().sum();
        ensure(self.rank_offset() == prefix, || {
            "rank offset is not the prefix sum of the counts".to_string()
        })
    }
}

/// Which coupling tables are active, chosen once at mesh construction.
#[derive(Clone, Debug)]
pub enum CouplingMode {
    Boundary(BoundaryCouplingTable),
    Volume(VolumeCouplingTable),
    Both {
        boundary: BoundaryCouplingTable,
        volume: VolumeCouplingTable,
    },
}

impl CouplingMode {
    /// Build the tables requested by `boundary` ids and/or the `volume` flag.
    ///
    /// This is collective: every rank must call it with the same request.
    pub fn build<M, C>(
        mesh: &M,
        boundary: Option<&[i32]>,
        volume: bool,
        comm: &C,
    ) -> Result<Self, CouplingError>
    where
        M: SolverMesh + ?Sized,
        C: Communicator + ?Sized,
    {
        match (boundary, volume) {
            (Some(ids), false) => Ok(CouplingMode::Boundary(BoundaryCouplingTable::build(
                mesh, ids, comm,
            )?)),
            (None, true) => Ok(CouplingMode::Volume(VolumeCouplingTable::build(mesh, comm)?)),
            (Some(ids), true) => Ok(CouplingMode::Both {
                boundary: BoundaryCouplingTable::build(mesh, ids, comm)?,
                volume: VolumeCouplingTable::build(mesh, comm)?,
            }),
            (None, false) => Err(CouplingError::Config(
                "at least one of boundary coupling or volume coupling must be requested".into(),
            )),
        }
    }

    pub fn boundary(&self) -> Option<&BoundaryCouplingTable> {
        match self {
            CouplingMode::Boundary(table) | CouplingMode::Both { boundary: table, .. } => {
                Some(table)
            }
            CouplingMode::Volume(_) => None,
        }
    }

    pub fn volume(&self) -> Option<&VolumeCouplingTable> {
        match self {
            CouplingMode::Volume(table) | CouplingMode::Both { volume: table, .. } => Some(table),
            CouplingMode::Boundary(_) => None,
        }
    }

    /// Whether transfers run through the volume table.
    pub fn is_volume(&self) -> bool {
        self.volume().is_some()
    }

    pub fn name(&self) -> &'static str {
        match self {
            CouplingMode::Boundary(_) => "boundary",
            CouplingMode::Volume(_) => "volume",
            CouplingMode::Both { .. } => "boundary+volume",
        }
    }
}
