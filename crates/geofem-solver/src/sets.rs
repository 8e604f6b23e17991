//! Node sets, edge sets and element sets for grouping mesh entities.

use crate::error::{Result, SolverError};
use crate::mesh::CellType;
use std::collections::{BTreeMap, BTreeSet};

/// Collection of all named sets of a mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sets {
    /// Node sets by name
    pub node_sets: BTreeMap<String, Vec<usize>>,
    /// Edge sets by name (node pairs)
    pub edge_sets: BTreeMap<String, Vec<[usize; 2]>>,
    /// Element sets by (name, cell type), holding block-local cell indices
    pub element_sets: BTreeMap<(String, CellType), Vec<usize>>,
}

impl Sets {
    /// Create an empty sets collection
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node_set(&mut self, name: impl Into<String>, nodes: Vec<usize>) {
        self.node_sets.insert(name.into(), nodes);
    }

    pub fn add_edge_set(&mut self, name: impl Into<String>, edges: Vec<[usize; 2]>) {
        self.edge_sets.insert(name.into(), edges);
    }

    pub fn add_element_set(
        &mut self,
        name: impl Into<String>,
        cell_type: CellType,
        elements: Vec<usize>,
    ) {
        self.element_sets.insert((name.into(), cell_type), elements);
    }

    /// Nodes addressed by a set name.
    ///
    /// A node set of that name wins; otherwise the unique nodes of the
    /// same-named edge set are returned in ascending order.
    pub fn nodes(&self, name: &str) -> Result<Vec<usize>> {
        if let Some(nodes) = self.node_sets.get(name) {
            return Ok(nodes.clone());
        }
        if let Some(edges) = self.edge_sets.get(name) {
            let unique: BTreeSet<usize> = edges.iter().flatten().copied().collect();
            return Ok(unique.into_iter().collect());
        }
        Err(SolverError::MissingSet(format!(
            "node_set__{name} (or edge_set__{name})"
        )))
    }

    /// Edges of an edge set
    pub fn edges(&self, name: &str) -> Result<&[[usize; 2]]> {
        self.edge_sets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SolverError::MissingSet(format!("edge_set__{name}")))
    }

    /// Cells of an element set for one cell type
    pub fn elements(&self, name: &str, cell_type: CellType) -> Result<&[usize]> {
        self.element_sets
            .get(&(name.to_string(), cell_type))
            .map(Vec::as_slice)
            .ok_or_else(|| SolverError::MissingSet(format!("elem_set__{name}__{cell_type}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_set_takes_precedence_over_edge_set() {
        let mut sets = Sets::new();
        sets.add_node_set("top", vec![7]);
        sets.add_edge_set("top", vec![[2, 3]]);
        assert_eq!(sets.nodes("top").unwrap(), vec![7]);
    }

    #[test]
    fn edge_set_nodes_are_unique_and_sorted() {
        let mut sets = Sets::new();
        sets.add_edge_set("top", vec![[5, 3], [3, 2]]);
        assert_eq!(sets.nodes("top").unwrap(), vec![2, 3, 5]);
    }

    #[test]
    fn missing_sets_are_reported_by_name() {
        let sets = Sets::new();
        let err = sets.nodes("left").unwrap_err();
        assert!(matches!(err, SolverError::MissingSet(ref s) if s.contains("left")));
        assert!(sets.edges("left").is_err());
        let err = sets.elements("soil", CellType::Quad4).unwrap_err();
        assert!(err.to_string().contains("elem_set__soil__quad4"));
    }
}
