//! Linear solve driver: eliminate fixed DOFs, solve the reduced system,
//! reassemble the full solution.

use crate::assembly::GlobalSystem;
use crate::backend::{LinearSolver, LinearSystemData, SolveInfo, SparseTripletsF64};
use crate::error::{Result, SolverError};
use log::trace;
use nalgebra::DVector;
use std::collections::BTreeMap;

/// Split of global DOFs into free and fixed sets.
#[derive(Debug, Clone)]
pub struct DofPartition {
    /// Free DOFs in ascending order
    pub free: Vec<usize>,
    /// Global DOF -> reduced index, `None` when fixed
    reduced: Vec<Option<usize>>,
}

impl DofPartition {
    pub fn new(num_dofs: usize, fixed: &BTreeMap<usize, f64>) -> Self {
        let mut reduced = vec![None; num_dofs];
        let mut free = Vec::with_capacity(num_dofs.saturating_sub(fixed.len()));
        for (dof, slot) in reduced.iter_mut().enumerate() {
            if !fixed.contains_key(&dof) {
                *slot = Some(free.len());
                free.push(dof);
            }
        }
        Self { free, reduced }
    }

    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    pub fn reduced_index(&self, dof: usize) -> Option<usize> {
        self.reduced[dof]
    }
}

/// Solve `K u = F` with `u[d] = fixed[d]` on the prescribed DOFs.
///
/// Returns the full solution and the backend info (`None` when every DOF is
/// prescribed and no solve was needed).
pub fn solve_step(
    system: &GlobalSystem,
    force: &DVector<f64>,
    fixed: &BTreeMap<usize, f64>,
    backend: &dyn LinearSolver,
) -> Result<(DVector<f64>, Option<SolveInfo>)> {
    let n = system.num_dofs;
    if force.len() != n {
        return Err(SolverError::Runtime(format!(
            "load vector has {} entries, system has {} dofs",
            force.len(),
            n
        )));
    }
    if let Some((&dof, _)) = fixed.range(n..).next() {
        return Err(SolverError::Runtime(format!(
            "prescribed dof {dof} outside system of {n} dofs"
        )));
    }

    let mut u = DVector::zeros(n);
    for (&dof, &value) in fixed {
        u[dof] = value;
    }

    let partition = DofPartition::new(n, fixed);
    let m = partition.num_free();
    if m == 0 {
        return Ok((u, None));
    }

    // Reduced system: K_ff u_f = F_f - K_fc u_c
    let mut triplets = SparseTripletsF64::new(m, m);
    let mut rhs = DVector::from_iterator(m, partition.free.iter().map(|&d| force[d]));
    for (i, j, &v) in system.stiffness.triplet_iter() {
        let Some(ri) = partition.reduced_index(i) else {
            continue;
        };
        match partition.reduced_index(j) {
            Some(rj) => triplets.push(ri, rj, v),
            None => rhs[ri] -= v * u[j],
        }
    }
    trace!("reduced system: {} free dofs, {} entries", m, triplets.nnz());

    let reduced = LinearSystemData {
        stiffness: triplets,
        force: rhs,
        num_dofs: m,
    };
    let (u_free, info) = backend.solve_linear(&reduced)?;

    for (k, &dof) in partition.free.iter().enumerate() {
        u[dof] = u_free[k];
    }
    Ok((u, Some(info)))
}
