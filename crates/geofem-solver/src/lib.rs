//! Staged 2D finite-element solver engine.
//!
//! Two reference variants share one pipeline: plane elasticity
//! (`reference_elastic`, two displacement DOFs per node) and steady seepage
//! (`reference_seepage`, one pressure DOF per node). A run takes a
//! [`SolveRequest`] and a [`Mesh`] of `tri3`/`quad4` cell blocks with named
//! sets, and produces a [`ResultMeta`] plus a flat [`FieldArchive`].
//!
//! ```text
//! request + mesh
//!      │
//!      ▼
//! materials (set → element material)   stages (BCs, loads, schedules)
//!      │                                   │
//!      ▼                                   ▼
//! assembly (K once, body force)  ──►  per step: F, fixed DOFs
//!                                          │
//!                                          ▼
//!                               solve (reduced system, backend)
//!                                          │
//!                                          ▼
//!                             postprocess (stress, von Mises)
//!                                          │
//!                                          ▼
//!                                 registry + field archive
//! ```

pub mod assembly;
pub mod backend;
pub mod capabilities;
pub mod contract;
pub mod elements;
pub mod error;
pub mod materials;
pub mod mesh;
pub mod output;
pub mod physics;
pub mod postprocess;
pub mod runner;
pub mod sets;
pub mod solve;
pub mod stages;

pub use assembly::{Assembler, GlobalSystem};
pub use backend::{
    BackendError, BackendKind, DenseLuBackend, LinearSolver, LinearSystemData, SolveInfo,
    SparseCholeskyBackend, SparseTripletsF64, default_backend,
};
pub use capabilities::{Capabilities, ContractRange};
pub use contract::{
    AnalysisMode, Assignment, BcSpec, ErrorRecord, FieldLocation, FieldShape, GlobalStep,
    LoadSpec, MaterialSpec, ModelSpec, OutputRequest, RegistryEntry, ResultMeta, RunStatus,
    SCHEMA_VERSION, SolveRequest, SolverInfo, StageInfo, StageSpec, UnitSystem,
};
pub use error::{Result, SolverError};
pub use materials::{DarcyMaterial, ElasticMaterial, ElementMaterials, MaterialModel};
pub use mesh::{CellBlock, CellType, Mesh};
pub use output::{FieldArchive, FieldArray, FieldDef, format_pattern};
pub use physics::{Physics, PlaneElasticity, SteadySeepage};
pub use postprocess::{StressState2D, von_mises_2d};
pub use runner::{
    ChannelCallbacks, NoCallbacks, ReferenceSolver, RunCallbacks, RunEvent, RunOptions,
    RunState, SOLVER_NAMES, SolveOutput, Solver, available_solvers, solver_by_name,
    solver_with_options,
};
pub use sets::Sets;
