//! Mirror element kinds and the permutations between tensor (GLL) ordering and
//! the mirror's canonical node and side ordering.
//!
//! # Canonical node ordering
//! Nodes are given as integer positions on the element's tensor grid, `p` points
//! per direction (`p = 2` first order, `p = 3` second order):
//!
//! - **Quad4**: `(0,0) (1,0) (1,1) (0,1)`, counter-clockwise.
//! - **Quad9**: Quad4 corners, then edge midpoints of sides `0-1, 1-2, 2-3, 3-0`,
//!   then the center.
//! - **Hex8**: bottom face counter-clockwise, then the top face above it.
//! - **Hex27**: Hex8 corners, the 12 edge midpoints (bottom ring, vertical edges,
//!   top ring), the 6 side centers in side order, then the center.
//!
//! The tensor index of a grid position `(i, j, k)` is `i + p j + p² k`. Both
//! permutations are derived from these positions; nothing is tabulated by hand.

use crate::backend::SOLVER_FACE_CORNERS;
use crate::coupling_error::CouplingError;
use serde::Deserialize;

/// Interpolation order of the mirror mesh (zero-indexed: `First` = 0).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorOrder {
    #[default]
    First,
    Second,
}

impl MirrorOrder {
    /// Zero-indexed order value.
    pub fn index(self) -> usize {
        match self {
            MirrorOrder::First => 0,
            MirrorOrder::Second => 1,
        }
    }

    /// Mirror points per direction (`order + 2`).
    pub fn points_per_dim(self) -> usize {
        self.index() + 2
    }

    /// Parse the user-facing spelling.
    pub fn parse(value: &str) -> Result<Self, CouplingError> {
        match value.to_ascii_lowercase().as_str() {
            "first" => Ok(MirrorOrder::First),
            "second" => Ok(MirrorOrder::Second),
            _ => Err(CouplingError::UnhandledVariant {
                kind: "mirror order",
                value: value.to_string(),
            }),
        }
    }
}

/// Element kinds the mirror mesh is built from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ElementKind {
    Quad4,
    Quad9,
    Hex8,
    Hex27,
}

/// Canonical hex sides as corner node lists, outward-facing.
pub const HEX_SIDES: [[usize; 4]; 6] = [
    [0, 3, 2, 1],
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
    [4, 5, 6, 7],
];

const QUAD_CORNERS: [[usize; 3]; 4] = [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]];
const QUAD_EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];
const HEX_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];
const HEX_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
    [4, 5],
    [5, 6],
    [6, 7],
    [7, 4],
];

impl ElementKind {
    /// Surface (boundary) or volume element for the given order.
    pub fn for_mode(volume: bool, order: MirrorOrder) -> Self {
        match (volume, order) {
            (false, MirrorOrder::First) => ElementKind::Quad4,
            (false, MirrorOrder::Second) => ElementKind::Quad9,
            (true, MirrorOrder::First) => ElementKind::Hex8,
            (true, MirrorOrder::Second) => ElementKind::Hex27,
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            ElementKind::Quad4 | ElementKind::Quad9 => 2,
            ElementKind::Hex8 | ElementKind::Hex27 => 3,
        }
    }

    pub fn order(self) -> MirrorOrder {
        match self {
            ElementKind::Quad4 | ElementKind::Hex8 => MirrorOrder::First,
            ElementKind::Quad9 | ElementKind::Hex27 => MirrorOrder::Second,
        }
    }

    pub fn points_per_dim(self) -> usize {
        self.order().points_per_dim()
    }

    /// Nodes per element, equal to the tensor grid size.
    pub fn n_nodes(self) -> usize {
        self.points_per_dim().pow(self.dimension() as u32)
    }

    pub fn n_corners(self) -> usize {
        1 << self.dimension()
    }

    /// Grid positions of the nodes in canonical order.
    pub fn reference_nodes(self) -> Vec<[usize; 3]> {
        let scale = self.points_per_dim() - 1;
        let corners: &[[usize; 3]] = match self.dimension() {
            2 => &QUAD_CORNERS,
            _ => &HEX_CORNERS,
        };
        let mut nodes: Vec<[usize; 3]> = corners
            .iter()
            .map(|c| [c[0] * scale, c[1] * scale, c[2] * scale])
            .collect();
        if self.order() == MirrorOrder::First {
            return nodes;
        }

        let midpoint = |ids: &[usize], nodes: &[[usize; 3]]| -> [usize; 3] {
            let mut sum = [0usize; 3];
            for &id in ids {
                for d in 0..3 {
                    sum[d] += nodes[id][d];
                }
            }
            [sum[0] / ids.len(), sum[1] / ids.len(), sum[2] / ids.len()]
        };

        let n_corners = nodes.len();
        let edges: &[[usize; 2]] = match self.dimension() {
            2 => &QUAD_EDGES,
            _ => &HEX_EDGES,
        };
        for edge in edges {
            let m = midpoint(edge, &nodes);
            nodes.push(m);
        }
        if self.dimension() == 3 {
            for side in &HEX_SIDES {
                let m = midpoint(side, &nodes);
                nodes.push(m);
            }
        }
        let all: Vec<usize> = (0..n_corners).collect();
        let center = midpoint(&all, &nodes);
        nodes.push(center);
        nodes
    }
}

/// Permutation between the mirror's canonical nodes and tensor (GLL) positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeIndexMap {
    kind: ElementKind,
    gll_of_node: Vec<usize>,
    node_of_gll: Vec<usize>,
}

impl NodeIndexMap {
    pub fn new(kind: ElementKind) -> Self {
        let p = kind.points_per_dim();
        let gll_of_node: Vec<usize> = kind
            .reference_nodes()
            .into_iter()
            .map(|[i, j, k]| i + p * j + p * p * k)
            .collect();
        let mut node_of_gll = vec![0; gll_of_node.len()];
        for (node, &gll) in gll_of_node.iter().enumerate() {
            node_of_gll[gll] = node;
        }
        Self {
            kind,
            gll_of_node,
            node_of_gll,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Tensor position holding mirror node `node`.
    pub fn gll_index(&self, node: usize) -> usize {
        self.gll_of_node[node]
    }

    /// Mirror node stored at tensor position `gll`.
    pub fn node_index(&self, gll: usize) -> usize {
        self.node_of_gll[gll]
    }

    pub fn len(&self) -> usize {
        self.gll_of_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gll_of_node.is_empty()
    }

    /// Reorder one element's tensor-ordered values into node order.
    pub fn to_node_order(&self, tensor: &[f64]) -> Vec<f64> {
        self.gll_of_node.iter().map(|&g| tensor[g]).collect()
    }

    /// Reorder one element's node-ordered values into tensor order.
    pub fn to_tensor_order(&self, nodal: &[f64]) -> Vec<f64> {
        self.node_of_gll.iter().map(|&n| nodal[n]).collect()
    }
}

/// Solver face number → mirror hex side number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideIndexMap {
    mirror_side: Vec<usize>,
}

impl SideIndexMap {
    /// Match each solver face's tensor corners against the canonical hex sides.
    pub fn new() -> Result<Self, CouplingError> {
        let hex = NodeIndexMap::new(ElementKind::Hex8);
        let mut mirror_side = Vec::with_capacity(SOLVER_FACE_CORNERS.len());
        for (face, corners) in SOLVER_FACE_CORNERS.iter().enumerate() {
            let mut want = *corners;
            want.sort_unstable();
            let side = HEX_SIDES.iter().position(|side| {
                let mut got = side.map(|node| hex.gll_index(node));
                got.sort_unstable();
                got == want
            });
            match side {
                Some(side) => mirror_side.push(side),
                None => {
                    return Err(CouplingError::InvalidGeometry(format!(
                        "solver face {face} matches no mirror hex side"
                    )));
                }
            }
        }
        Ok(Self { mirror_side })
    }

    pub fn mirror_side(&self, solver_face: usize) -> usize {
        self.mirror_side[solver_face]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.mirror_side
    }
}
