//! Flat-key JSON mesh documents.
//!
//! A mesh is one JSON object:
//!
//! ```text
//! points                       [[x, y], ...]
//! cells_tri3 / cells_quad4     [[n0, n1, n2(, n3)], ...]
//! node_set__<name>             [n, ...]
//! edge_set__<name>             [[n0, n1], ...]
//! elem_set__<name>__<type>     [local element index, ...]
//! ```
//!
//! Unknown keys are ignored with a warning.

use crate::error::{IoError, Result};
use geofem_solver::{CellType, Mesh};
use log::warn;
use serde_json::{Map, Value};

const POINTS: &str = "points";
const CELLS_PREFIX: &str = "cells_";
const NODE_SET_PREFIX: &str = "node_set__";
const EDGE_SET_PREFIX: &str = "edge_set__";
const ELEM_SET_PREFIX: &str = "elem_set__";

/// Build a mesh from a flat-key JSON object.
pub fn mesh_from_json(value: &Value) -> Result<Mesh> {
    let doc = value
        .as_object()
        .ok_or_else(|| IoError::InvalidData("mesh document must be a JSON object".into()))?;

    let points = doc
        .get(POINTS)
        .ok_or_else(|| IoError::InvalidData("mesh document has no 'points'".into()))?;
    let points = rows(points, POINTS)?
        .into_iter()
        .map(|row| match row.as_slice() {
            [x, y] | [x, y, _] => Ok([*x, *y]),
            other => Err(IoError::InvalidData(format!(
                "point with {} coordinate(s)",
                other.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut mesh = Mesh::new(points);

    for (key, value) in doc {
        if key == POINTS {
            continue;
        }
        if let Some(name) = key.strip_prefix(CELLS_PREFIX) {
            let cell_type = CellType::from_name(name)
                .ok_or_else(|| IoError::UnsupportedCellType(name.to_string()))?;
            let cells = index_rows(value, key)?;
            if let Some(row) = cells.iter().find(|c| c.len() != cell_type.num_nodes()) {
                return Err(IoError::InvalidData(format!(
                    "{key}: {cell_type} cell with {} node(s)",
                    row.len()
                )));
            }
            mesh.add_cells(cell_type, cells.into_iter().flatten().collect())?;
        } else if let Some(name) = key.strip_prefix(NODE_SET_PREFIX) {
            mesh.sets.add_node_set(name, indices(value, key)?);
        } else if let Some(name) = key.strip_prefix(EDGE_SET_PREFIX) {
            let edges = index_rows(value, key)?
                .into_iter()
                .map(|row| match row.as_slice() {
                    [a, b] => Ok([*a, *b]),
                    _ => Err(IoError::InvalidData(format!("{key}: edges need two nodes"))),
                })
                .collect::<Result<Vec<_>>>()?;
            mesh.sets.add_edge_set(name, edges);
        } else if let Some(rest) = key.strip_prefix(ELEM_SET_PREFIX) {
            let (name, type_name) = rest.rsplit_once("__").ok_or_else(|| {
                IoError::InvalidData(format!("{key}: expected elem_set__<name>__<cell_type>"))
            })?;
            let cell_type = CellType::from_name(type_name)
                .ok_or_else(|| IoError::UnsupportedCellType(type_name.to_string()))?;
            mesh.sets.add_element_set(name, cell_type, indices(value, key)?);
        } else {
            warn!("mesh: ignoring unknown key '{key}'");
        }
    }

    mesh.validate()?;
    Ok(mesh)
}

/// Flat-key JSON object for a mesh.
pub fn mesh_to_json(mesh: &Mesh) -> Value {
    let mut doc = Map::new();
    doc.insert(
        POINTS.into(),
        Value::from(mesh.points.iter().map(|p| p.to_vec()).collect::<Vec<_>>()),
    );
    for block in mesh.blocks() {
        let cells: Vec<Vec<usize>> = block.cells().map(<[usize]>::to_vec).collect();
        doc.insert(format!("{CELLS_PREFIX}{}", block.cell_type), Value::from(cells));
    }
    for (name, nodes) in &mesh.sets.node_sets {
        doc.insert(format!("{NODE_SET_PREFIX}{name}"), Value::from(nodes.clone()));
    }
    for (name, edges) in &mesh.sets.edge_sets {
        let edges: Vec<Vec<usize>> = edges.iter().map(|e| e.to_vec()).collect();
        doc.insert(format!("{EDGE_SET_PREFIX}{name}"), Value::from(edges));
    }
    for ((name, cell_type), elements) in &mesh.sets.element_sets {
        doc.insert(
            format!("{ELEM_SET_PREFIX}{name}__{cell_type}"),
            Value::from(elements.clone()),
        );
    }
    Value::Object(doc)
}

fn rows(value: &Value, key: &str) -> Result<Vec<Vec<f64>>> {
    array(value, key)?
        .iter()
        .map(|row| {
            array(row, key)?
                .iter()
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| IoError::InvalidData(format!("{key}: {v} is not a number")))
                })
                .collect()
        })
        .collect()
}

fn index_rows(value: &Value, key: &str) -> Result<Vec<Vec<usize>>> {
    array(value, key)?.iter().map(|row| indices(row, key)).collect()
}

fn indices(value: &Value, key: &str) -> Result<Vec<usize>> {
    array(value, key)?
        .iter()
        .map(|v| {
            v.as_u64()
                .map(|i| i as usize)
                .ok_or_else(|| IoError::InvalidData(format!("{key}: {v} is not an index")))
        })
        .collect()
}

fn array<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| IoError::InvalidData(format!("{key}: expected an array")))
}
