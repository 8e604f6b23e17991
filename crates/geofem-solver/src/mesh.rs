//! Mesh data structures for 2D finite element analysis.
//!
//! A mesh is a node coordinate table plus homogeneous cell blocks and the
//! named index sets used by assignments, boundary conditions and loads.
//! Node ids are 0-based row indices into the coordinate table.

use crate::error::{Result, SolverError};
use crate::sets::Sets;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cell type of a homogeneous block.
///
/// The derived ordering is the assembly order: `tri3` blocks before `quad4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    /// 3-node linear triangle
    Tri3,
    /// 4-node bilinear quadrilateral
    Quad4,
}

impl CellType {
    pub const ALL: [CellType; 2] = [CellType::Tri3, CellType::Quad4];

    /// Number of nodes per cell
    pub fn num_nodes(&self) -> usize {
        match self {
            CellType::Tri3 => 3,
            CellType::Quad4 => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Tri3 => "tri3",
            CellType::Quad4 => "quad4",
        }
    }

    /// Parse a cell type name (`tri3`, `quad4`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "tri3" => Some(CellType::Tri3),
            "quad4" => Some(CellType::Quad4),
            _ => None,
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity of one cell type, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CellBlock {
    pub cell_type: CellType,
    connectivity: Vec<usize>,
}

impl CellBlock {
    /// Create a block from flat connectivity (`num_cells * nodes_per_cell` entries)
    pub fn new(cell_type: CellType, connectivity: Vec<usize>) -> Result<Self> {
        let stride = cell_type.num_nodes();
        if connectivity.len() % stride != 0 {
            return Err(SolverError::Contract(format!(
                "{} connectivity length {} is not a multiple of {}",
                cell_type,
                connectivity.len(),
                stride
            )));
        }
        Ok(Self {
            cell_type,
            connectivity,
        })
    }

    pub fn len(&self) -> usize {
        self.connectivity.len() / self.cell_type.num_nodes()
    }

    pub fn is_empty(&self) -> bool {
        self.connectivity.is_empty()
    }

    /// Node ids of cell `index`
    pub fn cell(&self, index: usize) -> &[usize] {
        let stride = self.cell_type.num_nodes();
        &self.connectivity[index * stride..(index + 1) * stride]
    }

    pub fn cells(&self) -> impl Iterator<Item = &[usize]> {
        self.connectivity.chunks_exact(self.cell_type.num_nodes())
    }
}

/// Immutable 2D mesh handed to a solve.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Node coordinates (x, y)
    pub points: Vec<[f64; 2]>,
    /// Cell blocks keyed by type; iteration order is assembly order
    blocks: BTreeMap<CellType, CellBlock>,
    /// Named node, edge and element sets
    pub sets: Sets,
}

impl Mesh {
    /// Create a mesh from node coordinates, with no cells yet
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self {
            points,
            blocks: BTreeMap::new(),
            sets: Sets::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.points.len()
    }

    /// Append cells of one type. Cells of a type already present are appended to its block.
    pub fn add_cells(&mut self, cell_type: CellType, connectivity: Vec<usize>) -> Result<()> {
        let incoming = CellBlock::new(cell_type, connectivity)?;
        match self.blocks.get_mut(&cell_type) {
            Some(block) => block.connectivity.extend(incoming.connectivity),
            None => {
                self.blocks.insert(cell_type, incoming);
            }
        }
        Ok(())
    }

    pub fn block(&self, cell_type: CellType) -> Option<&CellBlock> {
        self.blocks.get(&cell_type)
    }

    /// Non-empty blocks in assembly order
    pub fn blocks(&self) -> impl Iterator<Item = &CellBlock> {
        self.blocks.values().filter(|b| !b.is_empty())
    }

    pub fn num_cells(&self, cell_type: CellType) -> usize {
        self.blocks.get(&cell_type).map_or(0, CellBlock::len)
    }

    pub fn total_cells(&self) -> usize {
        self.blocks.values().map(CellBlock::len).sum()
    }

    /// Coordinates of the nodes of one cell, in connectivity order
    pub fn cell_coords(&self, connectivity: &[usize]) -> Vec<[f64; 2]> {
        connectivity.iter().map(|&n| self.points[n]).collect()
    }

    /// Check that every index references an existing node or cell.
    pub fn validate(&self) -> Result<()> {
        let n_points = self.points.len();
        if self.points.iter().flatten().any(|c| !c.is_finite()) {
            return Err(SolverError::Contract(
                "mesh.points contains non-finite coordinates".to_string(),
            ));
        }

        for block in self.blocks.values() {
            if let Some(bad) = block.connectivity.iter().find(|&&n| n >= n_points) {
                return Err(SolverError::Contract(format!(
                    "{} connectivity references node {} but mesh has {} points",
                    block.cell_type, bad, n_points
                )));
            }
        }

        for (name, nodes) in &self.sets.node_sets {
            if let Some(bad) = nodes.iter().find(|&&n| n >= n_points) {
                return Err(SolverError::Contract(format!(
                    "node set '{}' references node {} but mesh has {} points",
                    name, bad, n_points
                )));
            }
        }

        for (name, edges) in &self.sets.edge_sets {
            if let Some(bad) = edges.iter().flatten().find(|&&n| n >= n_points) {
                return Err(SolverError::Contract(format!(
                    "edge set '{}' references node {} but mesh has {} points",
                    name, bad, n_points
                )));
            }
        }

        for ((name, cell_type), elements) in &self.sets.element_sets {
            let n_cells = self.num_cells(*cell_type);
            if let Some(bad) = elements.iter().find(|&&e| e >= n_cells) {
                return Err(SolverError::Contract(format!(
                    "element set '{}' references {} cell {} but mesh has {}",
                    name, cell_type, bad, n_cells
                )));
            }
        }

        Ok(())
    }
}
