//! Steady seepage through a two-quad strip.

mod common;

use approx::assert_relative_eq;
use common::*;
use geofem_solver::{
    CellType, FieldShape, LoadSpec, RunStatus, SolveRequest, Solver, solver_by_name,
};
use std::collections::BTreeMap;

fn seepage() -> Box<dyn Solver> {
    solver_by_name("reference_seepage").expect("seepage solver registered")
}

fn strip_request(k: f64, bcs: Vec<geofem_solver::BcSpec>, loads: Vec<LoadSpec>) -> SolveRequest {
    let materials: BTreeMap<_, _> = [("sand".to_string(), material("darcy", &[("k", k)]))].into();
    SolveRequest {
        materials,
        assignments: vec![assign_all(CellType::Quad4, "sand")],
        stages: vec![stage("steady", 1, bcs, loads)],
        ..SolveRequest::default()
    }
}

#[test]
fn head_drop_is_linear() {
    let request = strip_request(1e-4, vec![pressure("left", 10.0), pressure("right", 0.0)], vec![]);
    let out = seepage().solve_quiet(&request, &quad_strip());
    assert_eq!(out.meta.status, RunStatus::Success, "{:?}", out.meta.errors);

    let p = field(&out.archive, "nodal", "p", 1);
    assert_eq!(p.shape, vec![6]);
    assert_eq!(p.data[0], 10.0);
    assert_eq!(p.data[5], 0.0);
    assert_relative_eq!(p.data[1], 5.0, epsilon = 1e-10);
    assert_relative_eq!(p.data[4], 5.0, epsilon = 1e-10);

    assert_eq!(out.meta.registry.len(), 1);
    assert_eq!(out.meta.registry[0].name, "p");
    assert_eq!(out.meta.registry[0].shape, FieldShape::Scalar);
    assert_eq!(out.meta.registry[0].unit, "Pa");
    assert_eq!(out.archive.len(), 1);
}

#[test]
fn boundary_flux_sets_the_gradient() {
    let flux = LoadSpec {
        kind: "flux".into(),
        set: Some("right".into()),
        value: serde_json::json!(1.0),
    };
    let request = strip_request(2.0, vec![pressure("left", 0.0)], vec![flux]);
    let out = seepage().solve_quiet(&request, &quad_strip());
    assert!(out.is_success());

    // k dp/dx = q  =>  p = q x / k
    let p = &field(&out.archive, "nodal", "p", 1).data;
    for (node, x) in [(1, 1.0), (2, 2.0), (4, 1.0), (5, 2.0)] {
        assert_relative_eq!(p[node], x / 2.0, epsilon = 1e-10);
    }
}

#[test]
fn elastic_payloads_are_skipped_with_warnings() {
    let gravity = LoadSpec {
        kind: "gravity".into(),
        set: None,
        value: serde_json::json!([0.0, -9.81]),
    };
    let mut request = strip_request(
        1.0,
        vec![pressure("left", 1.0), pressure("right", 1.0)],
        vec![gravity],
    );
    request.stages[0].analysis_type = Some("seepage_steady".into());
    request.output_requests = vec![every("u", 1)];

    let out = seepage().solve_quiet(&request, &quad_strip());
    assert!(out.is_success());
    assert_eq!(out.meta.warnings.len(), 2, "{:?}", out.meta.warnings);
    let p = &field(&out.archive, "nodal", "p", 1).data;
    for v in p {
        assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn darcy_solver_rejects_elastic_materials() {
    let mut request = strip_request(1.0, vec![pressure("left", 0.0)], vec![]);
    request.materials = [(
        "sand".to_string(),
        material("linear_elastic", &[("E", 1.0), ("nu", 0.2)]),
    )]
    .into();
    let out = seepage().solve_quiet(&request, &quad_strip());
    assert_eq!(out.meta.status, RunStatus::Failed);
    assert_eq!(out.meta.errors[0].code, "CONTRACT");
}

#[test]
fn solver_lookup() {
    assert!(solver_by_name("reference_thermal").is_none());
    let names: Vec<String> = geofem_solver::available_solvers()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    assert_eq!(names, vec!["reference_elastic", "reference_seepage"]);

    let caps = seepage().capabilities();
    assert_eq!(caps.bcs, vec!["p"]);
    assert_eq!(caps.loads, vec!["flux"]);
    assert_eq!(caps.contract.min, "0.2");
}
