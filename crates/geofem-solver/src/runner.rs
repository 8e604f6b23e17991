//! Staged run controller.
//!
//! A run walks `Idle → Assembling → {StepSolving → PostProcessing}* →
//! Completed | Cancelled | Failed`. The global matrix is assembled once;
//! every scheduled step rebuilds its load vector and prescribed DOFs from the
//! stage plan, solves, recovers element fields and commits the step's arrays
//! to the archive. A step is only committed after it finished, so a failed or
//! cancelled run keeps exactly the steps completed before it stopped.
//!
//! The caller observes a run through [`RunCallbacks`]: progress after each
//! committed step, a cancellation poll before each step, and an optional
//! frame hook carrying the step's arrays.

use crate::assembly::Assembler;
use crate::backend::{BackendKind, LinearSolver};
use crate::capabilities::Capabilities;
use crate::contract::{
    ErrorRecord, FieldLocation, FieldShape, GlobalStep, ResultMeta, RunStatus, SCHEMA_VERSION,
    SolveRequest, SolverInfo, StageInfo,
};
use crate::error::{Result, SolverError};
use crate::materials::resolve_assignments;
use crate::mesh::Mesh;
use crate::output::{FieldArchive, FieldArray, FieldDef, StageSchedule};
use crate::physics::{Physics, PlaneElasticity, SteadySeepage};
use crate::postprocess::recover_element_fields;
use crate::solve::solve_step;
use crate::stages::{LoadAccumulator, StagePlan, ramp_factor};
use log::{debug, info, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Run controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Assembling,
    StepSolving,
    PostProcessing,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Assembling => "assembling",
            RunState::StepSolving => "step-solving",
            RunState::PostProcessing => "post-processing",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Hooks a caller supplies to observe and cancel a run.
///
/// None of the hooks may block indefinitely. `should_cancel` is polled once
/// before every step, never inside the element loop.
pub trait RunCallbacks {
    fn on_progress(&mut self, _fraction: f64, _message: &str, _stage_id: &str, _step: usize) {}

    fn should_cancel(&mut self) -> bool {
        false
    }

    /// Arrays written at one global step, called before they are archived.
    fn on_frame(&mut self, _step: &GlobalStep, _arrays: &FieldArchive) {}
}

/// Callbacks that observe nothing and never cancel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCallbacks;

impl RunCallbacks for NoCallbacks {}

/// Event forwarded by [`ChannelCallbacks`]
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress {
        fraction: f64,
        message: String,
        stage_id: String,
        step: usize,
    },
    Frame {
        step: GlobalStep,
        arrays: FieldArchive,
    },
}

/// Forwards progress and frames over a channel and reads cancellation from a
/// shared flag, for running a solve on a worker thread.
#[derive(Debug)]
pub struct ChannelCallbacks {
    sender: Sender<RunEvent>,
    cancel: Arc<AtomicBool>,
    forward_frames: bool,
}

impl ChannelCallbacks {
    pub fn new(sender: Sender<RunEvent>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            sender,
            cancel,
            forward_frames: true,
        }
    }

    /// Fresh channel and cancel flag wired to a new adapter.
    pub fn channel() -> (Self, Receiver<RunEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        (Self::new(tx, Arc::clone(&cancel)), rx, cancel)
    }

    /// Only forward progress events.
    pub fn without_frames(mut self) -> Self {
        self.forward_frames = false;
        self
    }
}

impl RunCallbacks for ChannelCallbacks {
    fn on_progress(&mut self, fraction: f64, message: &str, stage_id: &str, step: usize) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.sender.send(RunEvent::Progress {
            fraction,
            message: message.to_string(),
            stage_id: stage_id.to_string(),
            step,
        });
    }

    fn should_cancel(&mut self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn on_frame(&mut self, step: &GlobalStep, arrays: &FieldArchive) {
        if self.forward_frames {
            let _ = self.sender.send(RunEvent::Frame {
                step: step.clone(),
                arrays: arrays.clone(),
            });
        }
    }
}

/// Library-level run configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub backend: BackendKind,
}

/// Outcome of a run: the result metadata and the flat field archive.
#[derive(Debug, Clone)]
pub struct SolveOutput {
    pub meta: ResultMeta,
    pub archive: FieldArchive,
}

impl SolveOutput {
    pub fn is_success(&self) -> bool {
        self.meta.status == RunStatus::Success
    }
}

/// A solver variant reachable by name.
///
/// `solve` never panics or returns an error across this boundary: failures
/// are recorded in `result_meta`.
pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn solve(
        &self,
        request: &SolveRequest,
        mesh: &Mesh,
        callbacks: &mut dyn RunCallbacks,
    ) -> SolveOutput;

    /// Solve without observing the run.
    fn solve_quiet(&self, request: &SolveRequest, mesh: &Mesh) -> SolveOutput {
        self.solve(request, mesh, &mut NoCallbacks)
    }
}

/// Reference solver for one physics variant.
pub struct ReferenceSolver<P: Physics> {
    options: RunOptions,
    _physics: PhantomData<fn() -> P>,
}

impl<P: Physics> ReferenceSolver<P> {
    pub fn new() -> Self {
        Self::with_options(RunOptions::default())
    }

    pub fn with_options(options: RunOptions) -> Self {
        Self {
            options,
            _physics: PhantomData,
        }
    }
}

impl<P: Physics> Default for ReferenceSolver<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Physics> Solver for ReferenceSolver<P> {
    fn name(&self) -> &str {
        P::NAME
    }

    fn capabilities(&self) -> Capabilities {
        P::capabilities()
    }

    fn solve(
        &self,
        request: &SolveRequest,
        mesh: &Mesh,
        callbacks: &mut dyn RunCallbacks,
    ) -> SolveOutput {
        let backend = self.options.backend.create();
        let mut run = RunRecord::new(SolverInfo {
            name: P::NAME.to_string(),
            note: P::NOTE.to_string(),
            backend: backend.name().to_string(),
        });
        info!(
            "{}: run started ({} stage(s), backend {})",
            P::NAME,
            request.stages.len(),
            backend.name()
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            execute::<P>(request, mesh, backend.as_ref(), callbacks, &mut run)
        }));
        let outcome = outcome.unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(SolverError::Runtime(format!("panic: {message}")))
        });

        match outcome {
            Ok(()) => {
                run.transition(RunState::Completed);
                run.meta.status = RunStatus::Success;
            }
            Err(SolverError::Cancelled) => {
                run.transition(RunState::Cancelled);
                run.meta.status = RunStatus::Canceled;
                run.record_error(&SolverError::Cancelled);
            }
            Err(e) => {
                warn!("{}: run failed: {e}", P::NAME);
                run.transition(RunState::Failed);
                run.meta.status = RunStatus::Failed;
                run.record_error(&e);
            }
        }
        info!(
            "{}: run {} after {} committed step(s)",
            P::NAME,
            run.state,
            run.meta.global_steps.len()
        );

        SolveOutput {
            meta: run.meta,
            archive: run.archive,
        }
    }
}

/// Mutable bookkeeping of one run.
struct RunRecord {
    state: RunState,
    meta: ResultMeta,
    archive: FieldArchive,
}

impl RunRecord {
    fn new(solver_info: SolverInfo) -> Self {
        Self {
            state: RunState::Idle,
            meta: ResultMeta {
                schema_version: SCHEMA_VERSION.to_string(),
                status: RunStatus::Failed,
                solver_info,
                stages: Vec::new(),
                global_steps: Vec::new(),
                registry: Vec::new(),
                warnings: Vec::new(),
                errors: Vec::new(),
            },
            archive: FieldArchive::new(),
        }
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!("run state: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn warn(&mut self, message: String) {
        if !self.meta.warnings.contains(&message) {
            self.meta.warnings.push(message);
        }
    }

    fn record_error(&mut self, error: &SolverError) {
        self.meta.errors.push(ErrorRecord {
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }
}

fn execute<P: Physics>(
    request: &SolveRequest,
    mesh: &Mesh,
    backend: &dyn LinearSolver,
    callbacks: &mut dyn RunCallbacks,
    run: &mut RunRecord,
) -> Result<()> {
    run.transition(RunState::Assembling);

    if request.stages.is_empty() {
        return Err(SolverError::Contract("request defines no stages".into()));
    }
    mesh.validate()?;

    let physics = P::from_model(&request.model)?;
    let materials =
        resolve_assignments::<P::Material>(mesh, &request.materials, &request.assignments)?;
    let plan = StagePlan::new(&physics, mesh, &request.stages)?;
    for w in &plan.warnings {
        run.warn(w.clone());
    }

    let fields = P::fields();
    let mut schedules = Vec::with_capacity(plan.len());
    for (spec, stage) in request.stages.iter().zip(&plan.stages) {
        let (schedule, warnings) = StageSchedule::build(
            &fields,
            P::resolve_output_name,
            request.output_requests.iter().chain(&spec.output_requests),
            stage.num_steps,
        );
        for w in warnings {
            let w = format!("stage '{}': {w}", stage.label);
            warn!("{w}");
            run.warn(w);
        }
        schedules.push(schedule);
    }

    run.meta.registry = fields
        .iter()
        .filter(|f| {
            schedules
                .iter()
                .any(|s| s.strides.iter().any(|(g, _)| g == *f))
        })
        .map(|f| f.registry_entry(&request.unit_system))
        .collect();

    let assembler = Assembler::new(mesh, &physics, &materials)?;
    let system = assembler.assemble()?;
    let loads = LoadAccumulator::new(
        &system,
        plan.stage_loads(&assembler, physics.model_gravity())?,
    );

    let total_frames: usize = schedules.iter().map(|s| s.steps.len()).sum();
    let message = format!("{} solving...", P::NAME);
    let mut committed = 0usize;
    let mut stage_start = 0.0;

    for (si, (stage, schedule)) in plan.stages.iter().zip(&schedules).enumerate() {
        debug!(
            "stage '{}': {} step(s), solving {:?}",
            stage.label, stage.num_steps, schedule.steps
        );
        run.meta.stages.push(StageInfo {
            id: stage.label.clone(),
            num_steps: stage.num_steps,
            output_every_n: schedule.every_n,
            output_stage_steps: schedule.steps.clone(),
            times: Vec::new(),
        });
        let fixed = plan.fixed_dofs(si);

        for &step in &schedule.steps {
            if callbacks.should_cancel() {
                return Err(SolverError::Cancelled);
            }

            run.transition(RunState::StepSolving);
            let force = loads.load_vector(si, ramp_factor(step, stage.num_steps));
            let (u, info) = solve_step(&system, &force, &fixed, backend)?;
            if let Some(residual) = info.and_then(|i| i.residual_norm) {
                debug!("stage '{}' step {step}: relative residual {residual:.3e}", stage.label);
            }

            run.transition(RunState::PostProcessing);
            let global_id = committed + 1;
            let due = schedule.due(step);
            let arrays = step_arrays::<P, _>(
                &due,
                global_id,
                mesh,
                &u,
                || recover_element_fields(mesh, &physics, &materials, assembler.constitutive(), &u),
            )?;

            let frame = GlobalStep {
                id: global_id,
                stage_id: stage.label.clone(),
                stage_step: step,
                time: stage_start + (step + 1) as f64 * stage.dt,
            };
            callbacks.on_frame(&frame, &arrays);
            run.archive.extend(arrays);
            if let Some(info) = run.meta.stages.last_mut() {
                info.times.push(frame.time);
            }
            run.meta.global_steps.push(frame);
            committed += 1;

            callbacks.on_progress(
                committed as f64 / total_frames.max(1) as f64,
                &message,
                &stage.label,
                step,
            );
        }

        stage_start += stage.num_steps as f64 * stage.dt;
    }
    Ok(())
}

/// Arrays of the fields due at one step, keyed by their archive names.
fn step_arrays<P: Physics, F>(
    due: &[FieldDef],
    global_id: usize,
    mesh: &Mesh,
    u: &DVector<f64>,
    element_columns: F,
) -> Result<FieldArchive>
where
    F: FnOnce() -> Result<Vec<Vec<f64>>>,
{
    let mut arrays = FieldArchive::new();
    for field in due.iter().filter(|f| f.location == FieldLocation::Node) {
        let data = u.as_slice().to_vec();
        let array = match field.shape {
            FieldShape::Vector2 => FieldArray::matrix(mesh.num_nodes(), 2, data),
            FieldShape::Scalar => FieldArray::vector(data),
        };
        arrays.insert(field.key(global_id), array);
    }

    let element_fields: Vec<&FieldDef> = due
        .iter()
        .filter(|f| f.location == FieldLocation::Element)
        .collect();
    if element_fields.is_empty() {
        return Ok(arrays);
    }

    let columns = element_columns()?;
    for field in element_fields {
        let column = P::ELEMENT_FIELDS
            .iter()
            .position(|d| d == field)
            .and_then(|i| columns.get(i));
        if let Some(column) = column {
            arrays.insert(field.key(global_id), FieldArray::vector(column.clone()));
        }
    }
    Ok(arrays)
}

/// Names of the built-in solver variants.
pub const SOLVER_NAMES: &[&str] = &[PlaneElasticity::NAME, SteadySeepage::NAME];

/// Look up a solver variant by name with default options.
pub fn solver_by_name(name: &str) -> Option<Box<dyn Solver>> {
    solver_with_options(name, RunOptions::default())
}

/// Look up a solver variant by name.
pub fn solver_with_options(name: &str, options: RunOptions) -> Option<Box<dyn Solver>> {
    let name = name.trim();
    if name == PlaneElasticity::NAME {
        Some(Box::new(ReferenceSolver::<PlaneElasticity>::with_options(options)))
    } else if name == SteadySeepage::NAME {
        Some(Box::new(ReferenceSolver::<SteadySeepage>::with_options(options)))
    } else {
        None
    }
}

/// Every built-in solver variant.
pub fn available_solvers() -> Vec<Box<dyn Solver>> {
    SOLVER_NAMES.iter().filter_map(|n| solver_by_name(n)).collect()
}
