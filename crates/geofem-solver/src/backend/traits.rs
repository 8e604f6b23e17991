//! Backend trait definitions for linear solvers.
//!
//! These traits abstract over the concrete numerical library used for the
//! reduced global solve. Element-level computations remain in nalgebra
//! (small, dense matrices).

use nalgebra::DVector;
use thiserror::Error;

/// Error type for backend operations.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// The matrix has no unique solution (zero or vanishing pivot).
    #[error("{0}")]
    Singular(String),

    /// The backend could not complete for another reason.
    #[error("{0}")]
    Failed(String),
}

/// Sparse matrix in COO (coordinate/triplet) format.
///
/// This is the backend-agnostic interchange format between the solve
/// driver and any backend. Duplicate entries are summed.
#[derive(Debug, Clone, Default)]
pub struct SparseTripletsF64 {
    pub nrows: usize,
    pub ncols: usize,
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseTripletsF64 {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            ..Self::default()
        }
    }

    /// Append one entry
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
    }

    /// Number of stored entries (duplicates counted separately).
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

/// A reduced linear system ready for solving: K * u = F.
///
/// Produced by the solve driver after fixed DOFs have been eliminated.
pub struct LinearSystemData {
    /// Free-free stiffness block in COO triplet format
    pub stiffness: SparseTripletsF64,
    /// Reduced right-hand side `F - K_fc * u_c`
    pub force: DVector<f64>,
    /// Number of unknowns in the reduced system
    pub num_dofs: usize,
}

/// Solver diagnostic info.
#[derive(Debug, Clone)]
pub struct SolveInfo {
    /// Human-readable solver name (e.g., "nalgebra-sparse-Cholesky")
    pub solver_name: String,
    /// Relative residual `|K u - F| / |F|` when the backend computes it
    pub residual_norm: Option<f64>,
}

/// Trait for a linear solver backend.
///
/// Implementations solve K * u = F given the reduced system data.
pub trait LinearSolver: Send + Sync {
    /// Solve K * u = F and return the solution vector.
    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}
