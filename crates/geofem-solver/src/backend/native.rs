//! Native backends built on nalgebra and nalgebra-sparse.
//!
//! - [`SparseCholeskyBackend`]: sparse direct solve via `CscCholesky` (default)
//! - [`DenseLuBackend`]: dense LU, for small systems and cross-checking

use super::traits::*;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Pivots smaller than this fraction of the original diagonal entry are
/// treated as a vanishing pivot (rigid-body mode or missing fixity).
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Sparse Cholesky backend.
///
/// Reduced stiffness matrices are symmetric; they are positive definite
/// exactly when enough DOFs are fixed, so a failed or vanishing pivot is
/// reported as [`BackendError::Singular`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SparseCholeskyBackend;

impl LinearSolver for SparseCholeskyBackend {
    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        let n = system.num_dofs;
        if n == 0 {
            return Ok((DVector::zeros(0), info(self.name(), None)));
        }
        check_dimensions(system)?;

        let t = &system.stiffness;
        let coo = CooMatrix::try_from_triplets(
            t.nrows,
            t.ncols,
            t.row_indices.clone(),
            t.col_indices.clone(),
            t.values.clone(),
        )
        .map_err(|e| BackendError::Failed(format!("invalid triplets: {e}")))?;
        let csc = CscMatrix::from(&coo);

        let mut diagonal = vec![0.0; n];
        for (i, j, v) in csc.triplet_iter() {
            if i == j {
                diagonal[i] = *v;
            }
        }

        let chol = CscCholesky::factor(&csc).map_err(|e| {
            BackendError::Singular(format!("Cholesky factorization failed: {e:?}"))
        })?;

        for (i, j, l) in chol.l().triplet_iter() {
            if i == j {
                let pivot = l * l;
                if !pivot.is_finite() || pivot <= PIVOT_TOLERANCE * diagonal[i].abs() {
                    return Err(BackendError::Singular(format!(
                        "vanishing pivot {pivot:e} at reduced dof {i}"
                    )));
                }
            }
        }

        let rhs = DMatrix::from_column_slice(n, 1, system.force.as_slice());
        let u: DVector<f64> = chol.solve(&rhs).column(0).into_owned();
        check_finite(&u)?;

        let residual = relative_residual(system, &u);
        Ok((u, info(self.name(), Some(residual))))
    }

    fn name(&self) -> &str {
        "nalgebra-sparse-Cholesky"
    }
}

/// Dense LU backend.
///
/// Reconstructs the full matrix from triplets; only suitable for small
/// systems.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseLuBackend;

impl LinearSolver for DenseLuBackend {
    fn solve_linear(
        &self,
        system: &LinearSystemData,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        let n = system.num_dofs;
        if n == 0 {
            return Ok((DVector::zeros(0), info(self.name(), None)));
        }
        check_dimensions(system)?;

        let mut k = DMatrix::zeros(n, n);
        let t = &system.stiffness;
        for i in 0..t.nnz() {
            k[(t.row_indices[i], t.col_indices[i])] += t.values[i];
        }

        let lu = k.lu();
        let u_factor = lu.u();
        let (min_pivot, max_pivot) = u_factor
            .diagonal()
            .iter()
            .map(|d: &f64| d.abs())
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), d| (lo.min(d), hi.max(d)));
        if max_pivot == 0.0 || min_pivot / max_pivot < PIVOT_TOLERANCE {
            return Err(BackendError::Singular(format!(
                "LU pivot ratio {:e} below tolerance",
                if max_pivot == 0.0 { 0.0 } else { min_pivot / max_pivot }
            )));
        }

        let u = lu
            .solve(&system.force)
            .ok_or_else(|| BackendError::Singular("singular matrix in LU solve".into()))?;
        check_finite(&u)?;

        let residual = relative_residual(system, &u);
        Ok((u, info(self.name(), Some(residual))))
    }

    fn name(&self) -> &str {
        "nalgebra-LU"
    }
}

fn info(name: &str, residual_norm: Option<f64>) -> SolveInfo {
    SolveInfo {
        solver_name: name.to_string(),
        residual_norm,
    }
}

fn check_dimensions(system: &LinearSystemData) -> Result<(), BackendError> {
    let t = &system.stiffness;
    let n = system.num_dofs;
    if t.nrows != n || t.ncols != n || system.force.len() != n {
        return Err(BackendError::Failed(format!(
            "dimension mismatch: matrix {}x{}, rhs {}, dofs {}",
            t.nrows,
            t.ncols,
            system.force.len(),
            n
        )));
    }
    Ok(())
}

fn check_finite(u: &DVector<f64>) -> Result<(), BackendError> {
    if let Some(i) = u.iter().position(|v| !v.is_finite()) {
        return Err(BackendError::Singular(format!(
            "non-finite solution component at reduced dof {i}"
        )));
    }
    Ok(())
}

fn relative_residual(system: &LinearSystemData, u: &DVector<f64>) -> f64 {
    let t = &system.stiffness;
    let mut r = -system.force.clone();
    for i in 0..t.nnz() {
        r[t.row_indices[i]] += t.values[i] * u[t.col_indices[i]];
    }
    let f_norm = system.force.norm();
    if f_norm > 0.0 { r.norm() / f_norm } else { r.norm() }
}
