//! Multi-step and multi-stage runs: ramping, continuation, decimation,
//! cancellation and failure reporting.

mod common;

use approx::assert_relative_eq;
use common::*;
use geofem_solver::{
    AnalysisMode, ChannelCallbacks, GlobalStep, FieldArchive, RunCallbacks, RunEvent, RunStatus,
    Solver, SolveRequest, StageSpec, solver_by_name,
};
use std::thread;

fn elastic() -> Box<dyn Solver> {
    solver_by_name("reference_elastic").expect("elastic solver registered")
}

/// Counts progress calls and cancels once `limit` steps are committed.
struct CancelAfter {
    limit: usize,
    progress: Vec<(f64, String, String, usize)>,
}

impl RunCallbacks for CancelAfter {
    fn on_progress(&mut self, fraction: f64, message: &str, stage_id: &str, step: usize) {
        self.progress
            .push((fraction, message.to_string(), stage_id.to_string(), step));
    }

    fn should_cancel(&mut self) -> bool {
        self.progress.len() >= self.limit
    }
}

#[test]
fn ramped_steps_scale_linearly() {
    let mesh = unit_square_tris();
    let full = elastic().solve_quiet(&compression_request(AnalysisMode::PlaneStrain, 1), &mesh);
    let full_u = field(&full.archive, "nodal", "u", 1).data.clone();

    for n in [1usize, 5, 20] {
        let out = elastic().solve_quiet(&compression_request(AnalysisMode::PlaneStrain, n), &mesh);
        assert!(out.is_success());
        assert_eq!(out.meta.global_steps.len(), n);
        for k in 1..=n {
            let u = field(&out.archive, "nodal", "u", k);
            let scale = k as f64 / n as f64;
            for (got, want) in u.data.iter().zip(&full_u) {
                assert_relative_eq!(*got, scale * want, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn unloaded_stage_continues_previous_state() {
    let mesh = unit_square_tris();
    let mut load = stage(
        "load",
        2,
        vec![fix_bottom()],
        vec![traction("top", [0.0, -10.0])],
    );
    load.dt = 1.0;
    let mut hold = stage("hold", 2, vec![], vec![]);
    hold.dt = 0.5;
    let request = elastic_request(AnalysisMode::PlaneStrain, vec![load, hold]);

    let out = elastic().solve_quiet(&request, &mesh);
    assert!(out.is_success());

    let ids: Vec<usize> = out.meta.global_steps.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    let times: Vec<f64> = out.meta.global_steps.iter().map(|s| s.time).collect();
    assert_eq!(times, vec![1.0, 2.0, 2.5, 3.0]);
    assert_eq!(out.meta.global_steps[2].stage_id, "hold");
    assert_eq!(out.meta.global_steps[2].stage_step, 0);

    let end_of_load = &field(&out.archive, "nodal", "u", 2).data;
    for step in [3, 4] {
        let u = &field(&out.archive, "nodal", "u", step).data;
        for (a, b) in u.iter().zip(end_of_load) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}

#[test]
fn prescribed_settlement_persists_into_later_stages() {
    let mesh = unit_square_tris();
    let settle = geofem_solver::BcSpec {
        kind: "displacement".into(),
        set: "top".into(),
        value: serde_json::json!({"uy": -0.01}),
    };
    let request = elastic_request(
        AnalysisMode::PlaneStrain,
        vec![
            stage("fix", 1, vec![fix_bottom()], vec![]),
            stage("settle", 1, vec![settle], vec![]),
            stage("wait", 1, vec![], vec![]),
        ],
    );
    let out = elastic().solve_quiet(&request, &mesh);
    assert!(out.is_success());

    assert!(field(&out.archive, "nodal", "u", 1).data.iter().all(|v| *v == 0.0));
    for step in [2, 3] {
        let u = &field(&out.archive, "nodal", "u", step).data;
        assert_eq!(u[5], -0.01);
        assert_eq!(u[7], -0.01);
    }
}

#[test]
fn decimated_output_keeps_last_step() {
    let mesh = unit_square_tris();
    let mut request = compression_request(AnalysisMode::PlaneStrain, 7);
    request.stages[0].output_requests = vec![every("u", 3)];

    let out = elastic().solve_quiet(&request, &mesh);
    assert!(out.is_success());

    let info = &out.meta.stages[0];
    assert_eq!(info.num_steps, 7);
    assert_eq!(info.output_every_n, 3);
    assert_eq!(info.output_stage_steps, vec![0, 3, 6]);
    assert_eq!(info.times, vec![1.0, 4.0, 7.0]);

    let names: Vec<&str> = out.meta.registry.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["u"]);
    assert_eq!(out.archive.len(), 3);

    // The last frame is the full-load solution
    let full = elastic().solve_quiet(&compression_request(AnalysisMode::PlaneStrain, 1), &mesh);
    let last = &field(&out.archive, "nodal", "u", 3).data;
    for (a, b) in last.iter().zip(&field(&full.archive, "nodal", "u", 1).data) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn unknown_output_names_and_bc_types_warn() {
    let mesh = unit_square_tris();
    let mut request = compression_request(AnalysisMode::PlaneStrain, 1);
    request.output_requests = vec![every("temperature", 1)];
    request.stages[0].bcs.push(pressure("bottom", 0.0));
    request.stages[0].analysis_type = Some("consolidation".into());

    let out = elastic().solve_quiet(&request, &mesh);
    assert!(out.is_success());
    assert_eq!(out.meta.warnings.len(), 3, "{:?}", out.meta.warnings);
    assert!(out.meta.warnings.iter().any(|w| w.contains("temperature")));
    // Nothing valid named: every field is written
    assert_eq!(out.meta.registry.len(), 5);
}

#[test]
fn cancellation_discards_pending_steps() {
    let mesh = unit_square_tris();
    let mut callbacks = CancelAfter {
        limit: 2,
        progress: Vec::new(),
    };
    let out = elastic().solve(
        &compression_request(AnalysisMode::PlaneStrain, 5),
        &mesh,
        &mut callbacks,
    );

    assert_eq!(out.meta.status, RunStatus::Canceled);
    assert_eq!(out.meta.errors.len(), 1);
    assert_eq!(out.meta.errors[0].code, "CANCELED");
    assert_eq!(out.meta.global_steps.len(), 2);
    assert_eq!(out.archive.len(), 2 * 5);
    assert!(out.archive.contains_key("nodal__u__step000002"));
    assert!(!out.archive.contains_key("nodal__u__step000003"));

    let (fraction, message, stage_id, step) = &callbacks.progress[1];
    assert_relative_eq!(*fraction, 0.4);
    assert_eq!(message, "reference_elastic solving...");
    assert_eq!(stage_id, "load");
    assert_eq!(*step, 1);
}

#[test]
fn channel_callbacks_stream_from_worker_thread() {
    let (callbacks, events, _cancel) = ChannelCallbacks::channel();
    let handle = thread::spawn(move || {
        let mut callbacks = callbacks;
        let mesh = unit_square_tris();
        elastic().solve(
            &compression_request(AnalysisMode::PlaneStrain, 4),
            &mesh,
            &mut callbacks,
        )
    });
    let out = handle.join().expect("worker finished");
    assert!(out.is_success());

    let events: Vec<RunEvent> = events.try_iter().collect();
    let frames: Vec<&GlobalStep> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Frame { step, .. } => Some(step),
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[3].stage_step, 3);

    let last_fraction = events.iter().rev().find_map(|e| match e {
        RunEvent::Progress { fraction, .. } => Some(*fraction),
        _ => None,
    });
    assert_eq!(last_fraction, Some(1.0));

    let first_frame: Option<&FieldArchive> = events.iter().find_map(|e| match e {
        RunEvent::Frame { arrays, .. } => Some(arrays),
        _ => None,
    });
    assert_eq!(first_frame.map(|a| a.len()), Some(5));
}

#[test]
fn cancel_flag_set_before_start_commits_nothing() {
    let (callbacks, _events, cancel) = ChannelCallbacks::channel();
    cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    let mut callbacks = callbacks.without_frames();
    let mesh = unit_square_tris();
    let out = elastic().solve(
        &compression_request(AnalysisMode::PlaneStrain, 3),
        &mesh,
        &mut callbacks,
    );
    assert_eq!(out.meta.status, RunStatus::Canceled);
    assert!(out.meta.global_steps.is_empty());
    assert!(out.archive.is_empty());
}

fn failed_code(request: &SolveRequest) -> String {
    let out = elastic().solve_quiet(request, &unit_square_tris());
    assert_eq!(out.meta.status, RunStatus::Failed);
    assert!(out.meta.global_steps.is_empty());
    assert!(out.archive.is_empty());
    out.meta.errors[0].code.clone()
}

#[test]
fn contract_failures_abort_before_solving() {
    let mut request = compression_request(AnalysisMode::PlaneStrain, 1);
    request.stages.clear();
    assert_eq!(failed_code(&request), "CONTRACT");

    let mut request = compression_request(AnalysisMode::PlaneStrain, 1);
    request.stages[0].loads = vec![traction("missing", [0.0, 1.0])];
    assert_eq!(failed_code(&request), "MISSING_SET");

    let mut request = compression_request(AnalysisMode::PlaneStrain, 1);
    request.assignments[0].material_id = "rock".into();
    assert_eq!(failed_code(&request), "UNKNOWN_MATERIAL");

    let mut request = compression_request(AnalysisMode::PlaneStrain, 1);
    request.model.mode = AnalysisMode::Axisymmetric;
    assert_eq!(failed_code(&request), "CONTRACT");
}

#[test]
fn unassigned_elements_fail_fast() {
    let mut mesh = unit_square_tris();
    mesh.sets
        .add_element_set("first", geofem_solver::CellType::Tri3, vec![0]);
    let mut request = compression_request(AnalysisMode::PlaneStrain, 1);
    request.assignments[0].element_set = "first".into();

    let out = elastic().solve_quiet(&request, &mesh);
    assert_eq!(out.meta.status, RunStatus::Failed);
    assert_eq!(out.meta.errors[0].code, "UNASSIGNED_ELEMENTS");
    assert!(out.archive.is_empty());
}

#[test]
fn floating_body_is_singular() {
    let request = elastic_request(
        AnalysisMode::PlaneStrain,
        vec![stage("free", 1, vec![], vec![traction("top", [0.0, -10.0])])],
    );
    assert_eq!(failed_code(&request), "SINGULAR_SYSTEM");
}

#[test]
fn folded_quad_fails_the_run_before_any_step() {
    use geofem_solver::{CellType, Mesh};

    #[derive(Default)]
    struct Recorder {
        progress: usize,
        frames: usize,
    }
    impl RunCallbacks for Recorder {
        fn on_progress(&mut self, _: f64, _: &str, _: &str, _: usize) {
            self.progress += 1;
        }
        fn on_frame(&mut self, _: &GlobalStep, _: &FieldArchive) {
            self.frames += 1;
        }
    }

    let mut mesh = Mesh::new(vec![
        [0.0, 0.0],
        [1.0, 0.0],
        [2.0, 0.0],
        [0.0, 1.0],
        [1.0, 1.0],
        [2.0, 1.0],
    ]);
    // Second quad ordered 1-2-4-5 crosses itself
    mesh.add_cells(CellType::Quad4, vec![0, 1, 4, 3, 1, 2, 4, 5])
        .expect("valid connectivity");
    mesh.sets.add_node_set("bottom", vec![0, 1, 2]);
    mesh.sets.add_element_set("all", CellType::Quad4, vec![0, 1]);

    let mut request = elastic_request(
        AnalysisMode::PlaneStrain,
        vec![stage("load", 2, vec![fix_bottom()], vec![])],
    );
    request.assignments = vec![assign_all(CellType::Quad4, "soil")];

    let mut recorder = Recorder::default();
    let out = elastic().solve(&request, &mesh, &mut recorder);
    assert_eq!(out.meta.status, RunStatus::Failed);
    assert_eq!(out.meta.errors.len(), 1);
    assert_eq!(out.meta.errors[0].code, "DEGENERATE_ELEMENT");
    assert!(
        out.meta.errors[0].message.contains("quad4 element 1"),
        "{}",
        out.meta.errors[0].message
    );
    assert!(out.meta.global_steps.is_empty());
    assert!(out.archive.is_empty());
    assert_eq!(recorder.frames, 0);
    assert_eq!(recorder.progress, 0);
}

#[test]
fn missing_set_in_later_stage_fails_before_any_step() {
    let mesh = unit_square_tris();
    let mut request = compression_request(AnalysisMode::PlaneStrain, 2);
    request.stages.push(StageSpec {
        id: Some("broken".into()),
        ..StageSpec::default()
    });
    // Second stage references an edge set that only exists as a node set
    request.stages[1].loads = vec![traction("bottom", [1.0, 0.0])];

    let out = elastic().solve_quiet(&request, &mesh);
    assert_eq!(out.meta.status, RunStatus::Failed);
    assert_eq!(out.meta.errors[0].code, "MISSING_SET");
    assert!(out.meta.global_steps.is_empty());
}

#[test]
fn panicking_callback_is_reported_as_runtime_failure() {
    struct Explode;
    impl RunCallbacks for Explode {
        fn on_frame(&mut self, step: &GlobalStep, _arrays: &FieldArchive) {
            if step.id == 2 {
                panic!("frame sink went away");
            }
        }
    }

    let mesh = unit_square_tris();
    let out = elastic().solve(
        &compression_request(AnalysisMode::PlaneStrain, 3),
        &mesh,
        &mut Explode,
    );
    assert_eq!(out.meta.status, RunStatus::Failed);
    assert_eq!(out.meta.errors[0].code, "SOLVER_RUNTIME");
    assert!(out.meta.errors[0].message.contains("frame sink went away"));
    assert_eq!(out.meta.global_steps.len(), 1);
}
