//! Storage for mirror-mesh fields on the host driver's side.
//!
//! The driver owns DOF numbering and ghosting; the coupling only needs to know
//! which mirror nodes the calling rank owns and how to set their values.

use crate::mirror::MirrorMesh;
use std::sync::Arc;

/// Host-side field storage on the mirror mesh.
pub trait HostField {
    /// Register a nodal variable and return its handle.
    fn add_variable(&mut self, name: &str) -> usize;
    /// Register an elemental (constant per element) variable.
    fn add_elemental_variable(&mut self, name: &str) -> usize;
    /// Handle of a registered variable.
    fn variable(&self, name: &str) -> Option<usize>;
    /// Rank of the calling process.
    fn rank(&self) -> usize;
    /// Owner of `node` of mirror element `elem`; `None` when the node is not
    /// known on this rank.
    fn node_owner(&self, elem: usize, node: usize) -> Option<usize>;
    /// Nodal value of `var` at `node` of `elem`.
    fn dof(&self, var: usize, elem: usize, node: usize) -> f64;
    /// Set the nodal value of `var` at `node` of `elem`.
    fn set_dof(&mut self, var: usize, elem: usize, node: usize, value: f64);
    /// Set the elemental value of `var` on `elem`; `false` if `elem` is not local.
    fn set_element_dof(&mut self, var: usize, elem: usize, value: f64) -> bool;
    /// Finish a batch of writes.
    fn close(&mut self);
}

#[derive(Clone, Debug)]
struct Variable {
    name: String,
    nodal: bool,
    values: Vec<f64>,
}

/// In-memory [`HostField`] holding every mirror value on every rank.
///
/// Ownership defaults to the mirror's element owners; a custom element partition
/// models drivers that distribute the mirror differently from the solver.
#[derive(Clone, Debug)]
pub struct MirrorField {
    rank: usize,
    n_elements: usize,
    nodes_per_element: usize,
    partition: Arc<[usize]>,
    variables: Vec<Variable>,
    closed: usize,
}

impl MirrorField {
    pub fn new(mesh: &MirrorMesh, rank: usize) -> Self {
        Self::with_partition(mesh, rank, Arc::from(mesh.owners()))
    }

    /// `partition[e]` is the rank owning every node of mirror element `e`.
    pub fn with_partition(mesh: &MirrorMesh, rank: usize, partition: Arc<[usize]>) -> Self {
        Self {
            rank,
            n_elements: mesh.n_elements(),
            nodes_per_element: mesh.nodes_per_element(),
            partition,
            variables: Vec::new(),
            closed: 0,
        }
    }

    /// Nodal values of `name`, `nodes_per_element` per element.
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.values.as_slice())
    }

    pub fn value(&self, var: usize, elem: usize, node: usize) -> f64 {
        self.variables[var].values[elem * self.nodes_per_element + node]
    }

    pub fn element_value(&self, var: usize, elem: usize) -> f64 {
        self.variables[var].values[elem]
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn is_nodal(&self, var: usize) -> bool {
        self.variables[var].nodal
    }

    /// Number of completed write batches.
    pub fn close_count(&self) -> usize {
        self.closed
    }

    fn register(&mut self, name: &str, nodal: bool) -> usize {
        if let Some(existing) = self.variable(name) {
            return existing;
        }
        let len = if nodal {
            self.n_elements * self.nodes_per_element
        } else {
            self.n_elements
        };
        self.variables.push(Variable {
            name: name.to_string(),
            nodal,
            values: vec![0.0; len],
        });
        self.variables.len() - 1
    }
}

impl HostField for MirrorField {
    fn add_variable(&mut self, name: &str) -> usize {
        self.register(name, true)
    }

    fn add_elemental_variable(&mut self, name: &str) -> usize {
        self.register(name, false)
    }

    fn variable(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn node_owner(&self, elem: usize, node: usize) -> Option<usize> {
        if node >= self.nodes_per_element {
            return None;
        }
        self.partition.get(elem).copied()
    }

    fn dof(&self, var: usize, elem: usize, node: usize) -> f64 {
        self.value(var, elem, node)
    }

    fn set_dof(&mut self, var: usize, elem: usize, node: usize, value: f64) {
        self.variables[var].values[elem * self.nodes_per_element + node] = value;
    }

    fn set_element_dof(&mut self, var: usize, elem: usize, value: f64) -> bool {
        if self.partition.get(elem) != Some(&self.rank) {
            return false;
        }
        self.variables[var].values[elem] = value;
        true
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_are_registered_once() {
        let mesh = MirrorMesh::build_dummy_mesh();
        let mut field = MirrorField::new(&mesh, 0);
        let t = field.add_variable("temp");
        assert_eq!(field.add_variable("temp"), t);
        let heat = field.add_elemental_variable("heat_source");
        assert!(!field.is_nodal(heat));
        field.set_dof(t, 0, 2, 4.0);
        assert_eq!(field.values("temp").unwrap(), &[0.0, 0.0, 4.0, 0.0]);
        assert!(field.set_element_dof(heat, 0, 1.5));
        assert_eq!(field.element_value(heat, 0), 1.5);
    }

    #[test]
    fn foreign_elements_are_not_written() {
        let mesh = MirrorMesh::build_dummy_mesh();
        let mut field = MirrorField::new(&mesh, 1);
        let heat = field.add_elemental_variable("heat_source");
        assert!(!field.set_element_dof(heat, 0, 1.0));
        assert_eq!(field.node_owner(0, 0), Some(0));
        assert_eq!(field.node_owner(0, 4), None);
    }
}
