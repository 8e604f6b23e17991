//! Numerical backend abstraction layer.
//!
//! The solve driver hands a reduced system to a [`LinearSolver`]; the concrete
//! backend is chosen at runtime through [`BackendKind`].
//!
//! ```text
//! Element kernels (nalgebra DMatrix, small and dense)
//!         │
//!         ▼
//! Assembly (COO triplets -> CSR)
//!         │
//!         ▼
//! Solve driver (free/fixed partition, reduced triplets + RHS)
//!         │
//!    ┌────┴─────┐
//!    ▼          ▼
//! Sparse     Dense
//! Cholesky   LU
//! ```

pub mod native;
pub mod traits;

pub use native::{DenseLuBackend, SparseCholeskyBackend};
pub use traits::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selectable linear solver backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    SparseCholesky,
    DenseLu,
}

impl BackendKind {
    /// Instantiate the backend.
    pub fn create(self) -> Box<dyn LinearSolver> {
        match self {
            BackendKind::SparseCholesky => Box::new(SparseCholeskyBackend),
            BackendKind::DenseLu => Box::new(DenseLuBackend),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::SparseCholesky => "sparse-cholesky",
            BackendKind::DenseLu => "dense-lu",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sparse-cholesky" | "cholesky" => Ok(BackendKind::SparseCholesky),
            "dense-lu" | "lu" => Ok(BackendKind::DenseLu),
            other => Err(format!(
                "unknown backend '{other}' (expected sparse-cholesky or dense-lu)"
            )),
        }
    }
}

/// Returns the default solver backend.
pub fn default_backend() -> Box<dyn LinearSolver> {
    BackendKind::default().create()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_names_and_aliases() {
        assert_eq!("dense-lu".parse::<BackendKind>(), Ok(BackendKind::DenseLu));
        assert_eq!("Cholesky".parse::<BackendKind>(), Ok(BackendKind::SparseCholesky));
        assert!("petsc".parse::<BackendKind>().is_err());
    }

    #[test]
    fn default_backend_is_sparse_cholesky() {
        assert_eq!(default_backend().name(), "nalgebra-sparse-Cholesky");
        assert_eq!(BackendKind::DenseLu.create().name(), "nalgebra-LU");
    }
}
