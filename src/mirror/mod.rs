//! The low-order mirror of the solver mesh seen by the host driver.

pub mod mesh;
pub mod node_index;

pub use mesh::{MirrorMesh, MirrorMeshBuilder, SideEntry};
pub use node_index::{ElementKind, MirrorOrder, NodeIndexMap, SideIndexMap};
