//! Shared fixtures for the solver integration tests.
#![allow(dead_code)]

use geofem_solver::{
    AnalysisMode, Assignment, BcSpec, CellType, FieldArchive, FieldArray, LoadSpec, MaterialSpec,
    Mesh, ModelSpec, OutputRequest, SolveRequest, StageSpec,
};
use serde_json::json;
use std::collections::BTreeMap;

/// Unit square split into two triangles along the (0,0)-(1,1) diagonal.
///
/// Sets: `bottom` (nodes 0, 1), `top` (edge 2-3), `left` (edge 3-0),
/// `right` (edge 1-2), `all` (both triangles).
pub fn unit_square_tris() -> Mesh {
    let mut mesh = Mesh::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    mesh.add_cells(CellType::Tri3, vec![0, 1, 2, 0, 2, 3])
        .expect("valid connectivity");
    mesh.sets.add_node_set("bottom", vec![0, 1]);
    mesh.sets.add_edge_set("top", vec![[2, 3]]);
    mesh.sets.add_edge_set("left", vec![[3, 0]]);
    mesh.sets.add_edge_set("right", vec![[1, 2]]);
    mesh.sets.add_element_set("all", CellType::Tri3, vec![0, 1]);
    mesh
}

/// 2 x 1 strip of two quads. Sets: `left` (edge 3-0), `right` (edge 2-5),
/// `all` (both quads).
pub fn quad_strip() -> Mesh {
    let mut mesh = Mesh::new(vec![
        [0.0, 0.0],
        [1.0, 0.0],
        [2.0, 0.0],
        [0.0, 1.0],
        [1.0, 1.0],
        [2.0, 1.0],
    ]);
    mesh.add_cells(CellType::Quad4, vec![0, 1, 4, 3, 1, 2, 5, 4])
        .expect("valid connectivity");
    mesh.sets.add_edge_set("left", vec![[3, 0]]);
    mesh.sets.add_edge_set("right", vec![[2, 5]]);
    mesh.sets.add_element_set("all", CellType::Quad4, vec![0, 1]);
    mesh
}

pub fn material(model_name: &str, params: &[(&str, f64)]) -> MaterialSpec {
    MaterialSpec {
        model_name: model_name.into(),
        parameters: params
            .iter()
            .map(|&(k, v)| (k.to_string(), json!(v)))
            .collect(),
    }
}

pub fn assign_all(cell_type: CellType, material_id: &str) -> Assignment {
    Assignment {
        element_set: "all".into(),
        cell_type: cell_type.as_str().into(),
        material_id: material_id.into(),
    }
}

pub fn fix_bottom() -> BcSpec {
    BcSpec {
        kind: "displacement".into(),
        set: "bottom".into(),
        value: json!({"ux": 0.0, "uy": 0.0}),
    }
}

pub fn pressure(set: &str, p: f64) -> BcSpec {
    BcSpec {
        kind: "p".into(),
        set: set.into(),
        value: json!(p),
    }
}

pub fn traction(set: &str, t: [f64; 2]) -> LoadSpec {
    LoadSpec {
        kind: "traction".into(),
        set: Some(set.into()),
        value: json!(t),
    }
}

pub fn stage(id: &str, num_steps: usize, bcs: Vec<BcSpec>, loads: Vec<LoadSpec>) -> StageSpec {
    StageSpec {
        id: Some(id.into()),
        num_steps,
        bcs,
        loads,
        ..StageSpec::default()
    }
}

pub fn every(name: &str, every_n: i64) -> OutputRequest {
    OutputRequest {
        name: name.into(),
        every_n,
    }
}

/// E = 1000, nu = 0.3 on both triangles of [`unit_square_tris`].
pub fn elastic_request(mode: AnalysisMode, stages: Vec<StageSpec>) -> SolveRequest {
    let materials: BTreeMap<_, _> =
        [("soil".to_string(), material("linear_elastic", &[("E", 1000.0), ("nu", 0.3)]))].into();
    SolveRequest {
        model: ModelSpec {
            mode,
            ..ModelSpec::default()
        },
        materials,
        assignments: vec![assign_all(CellType::Tri3, "soil")],
        stages,
        ..SolveRequest::default()
    }
}

/// Bottom fixed, top edge loaded with `[0, -10]` per unit length.
pub fn compression_request(mode: AnalysisMode, num_steps: usize) -> SolveRequest {
    elastic_request(
        mode,
        vec![stage(
            "load",
            num_steps,
            vec![fix_bottom()],
            vec![traction("top", [0.0, -10.0])],
        )],
    )
}

pub fn field<'a>(
    archive: &'a FieldArchive,
    prefix: &str,
    name: &str,
    step: usize,
) -> &'a FieldArray {
    let key = format!("{prefix}__{name}__step{step:06}");
    archive
        .get(&key)
        .unwrap_or_else(|| panic!("missing archive key {key}"))
}
