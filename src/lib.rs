#![cfg_attr(docsrs, feature(doc_cfg))]
//! # sem-coupling
//!
//! sem-coupling connects a distributed spectral-element CFD solver to a host
//! finite-element driver. The solver stores its solution on tensor-product
//! Gauss-Lobatto-Legendre (GLL) points spread over many ranks; the host sees a
//! low-order "mirror" of the solver mesh and needs values on its vertices, in
//! physical units.
//!
//! ## Features
//! - Coupling tables replicated on every rank, with ownership and per-rank offsets
//! - First- and second-order mirror meshes (Quad4/Quad9 boundary, Hex8/Hex27 volume)
//! - GLL interpolation between the solver order and the mirror order
//! - Collective field transfer with reference-scale conversion, plus the reverse write
//! - Timestep orchestration with minimized synchronization and field-file output
//! - Pluggable communication backends (serial, threads, MPI)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sem-coupling = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! A typical setup builds a [`coupling::CouplingMode`], derives a
//! [`mirror::MirrorMesh`] from it, then hands both to a
//! [`transfer::FieldTransferEngine`]; a [`orchestrator::TimestepOrchestrator`]
//! decides when transfers and output happen.

pub mod algs;
pub mod backend;
pub mod config;
pub mod coupling;
pub mod coupling_error;
pub mod debug_invariants;
pub mod geometry;
pub mod host;
pub mod interpolation;
pub mod mirror;
pub mod orchestrator;
pub mod postprocessors;
pub mod transfer;
pub mod transport;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    pub use crate::backend::{
        BackendError, DriverClock, FixedClock, SolverFields, SolverMesh, SolverRuntime,
    };
    pub use crate::config::{AppContext, MeshConfig, ProblemConfig, TransportConfig};
    pub use crate::coupling::{
        BoundaryCouplingTable, CouplingMode, RankLayout, VolumeCouplingTable,
    };
    pub use crate::coupling_error::CouplingError;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::host::{HostField, MirrorField};
    pub use crate::interpolation::InterpolationOperator;
    pub use crate::mirror::{ElementKind, MirrorMesh, MirrorMeshBuilder, MirrorOrder};
    pub use crate::orchestrator::{StepState, TimestepOrchestrator};
    pub use crate::transfer::{
        FieldKind, FieldTransferEngine, NondimensionalScales, OutputField, WriteField,
    };
    pub use crate::transport::{TransportBackend, TransportProblem};
}
