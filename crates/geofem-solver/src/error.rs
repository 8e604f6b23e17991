//! Error types for the staged solver engine.

use crate::backend::BackendError;
use crate::mesh::CellType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

/// Errors that abort a run.
///
/// Input contract violations are detected before assembly starts; numerical
/// failures are raised where they occur. Cancellation is carried as its own
/// variant so the run controller can tell it apart from a failure.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Malformed request, mesh or payload.
    #[error("contract error: {0}")]
    Contract(String),

    /// A referenced node, edge or element set does not exist in the mesh.
    #[error("missing set: {0}")]
    MissingSet(String),

    /// An assignment references a material id that is not defined.
    #[error("unknown material: {0}")]
    UnknownMaterial(String),

    /// Elements left without a material after all assignments were applied.
    #[error("{count} unassigned {cell_type} element(s), first at local index {first}")]
    UnassignedElements {
        cell_type: CellType,
        count: usize,
        first: usize,
    },

    /// Zero-area triangle or zero/inverted quadrilateral Jacobian.
    #[error("degenerate {cell_type} element {index}: {measure:e}")]
    DegenerateElement {
        cell_type: CellType,
        index: usize,
        measure: f64,
    },

    /// The reduced system has no unique solution (missing fixity, rigid-body mode).
    #[error("singular system: {0}")]
    SingularSystem(String),

    #[error("run cancelled by caller")]
    Cancelled,

    /// Anything unexpected raised inside the solver.
    #[error("solver runtime error: {0}")]
    Runtime(String),
}

impl SolverError {
    /// Stable error code recorded in `result_meta.errors`.
    pub fn code(&self) -> &'static str {
        match self {
            SolverError::Contract(_) => "CONTRACT",
            SolverError::MissingSet(_) => "MISSING_SET",
            SolverError::UnknownMaterial(_) => "UNKNOWN_MATERIAL",
            SolverError::UnassignedElements { .. } => "UNASSIGNED_ELEMENTS",
            SolverError::DegenerateElement { .. } => "DEGENERATE_ELEMENT",
            SolverError::SingularSystem(_) => "SINGULAR_SYSTEM",
            SolverError::Cancelled => "CANCELED",
            SolverError::Runtime(_) => "SOLVER_RUNTIME",
        }
    }
}

impl From<BackendError> for SolverError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Singular(msg) => SolverError::SingularSystem(msg),
            BackendError::Failed(msg) => SolverError::Runtime(msg),
        }
    }
}
