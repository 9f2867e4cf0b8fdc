//! Field transfer between the solver's GLL points and the mirror mesh.

pub mod engine;
pub mod field;
pub mod scales;

pub use engine::FieldTransferEngine;
pub use field::{FieldKind, OutputField, WriteField};
pub use scales::NondimensionalScales;
