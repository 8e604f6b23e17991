//! Element kernels for 2D continuum elements.
//!
//! Each cell type provides its integration points (shape values, physical
//! gradients and weights). The element matrix and load vector are then
//! formed generically from a gradient operator `B` and a constitutive
//! matrix `D`:
//!
//! ```text
//! k_e = Σ_gp Bᵀ·D·B·w      f_e = Σ_gp Nᵀ·s·w
//! ```
//!
//! All functions here are pure: the same coordinates and material give the
//! same matrices.

use crate::error::SolverError;
use crate::mesh::CellType;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

pub mod quad4;
pub mod tri3;

/// Shape data at one integration point
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationPoint {
    /// Shape function values N_i
    pub shape: Vec<f64>,
    /// Physical gradients [dN_i/dx, dN_i/dy]
    pub grads: Vec<[f64; 2]>,
    /// Integration weight including the area measure
    pub weight: f64,
}

/// Zero area or zero/inverted Jacobian.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("degenerate {cell_type} geometry (measure {measure:e})")]
pub struct DegenerateGeometry {
    pub cell_type: CellType,
    pub measure: f64,
}

impl DegenerateGeometry {
    /// Attach the block-local element index.
    pub fn at(self, index: usize) -> SolverError {
        SolverError::DegenerateElement {
            cell_type: self.cell_type,
            index,
            measure: self.measure,
        }
    }
}

/// Integration points for one element of the given type.
pub fn integration_points(
    cell_type: CellType,
    coords: &[[f64; 2]],
) -> Result<Vec<IntegrationPoint>, DegenerateGeometry> {
    match cell_type {
        CellType::Tri3 => tri3::integration_points(coords),
        CellType::Quad4 => quad4::integration_points(coords),
    }
}

/// Strain-displacement operator (3 × 2n) for plane elasticity.
///
/// Rows are `[εx, εy, γxy]`, columns interleave `(ux, uy)` per node.
pub fn strain_displacement(grads: &[[f64; 2]]) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(3, 2 * grads.len());
    for (i, &[dndx, dndy]) in grads.iter().enumerate() {
        b[(0, 2 * i)] = dndx;
        b[(1, 2 * i + 1)] = dndy;
        b[(2, 2 * i)] = dndy;
        b[(2, 2 * i + 1)] = dndx;
    }
    b
}

/// Gradient operator (2 × n) for a scalar field.
pub fn scalar_gradient(grads: &[[f64; 2]]) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(2, grads.len());
    for (i, &[dndx, dndy]) in grads.iter().enumerate() {
        b[(0, i)] = dndx;
        b[(1, i)] = dndy;
    }
    b
}

/// Element matrix `Σ Bᵀ·D·B·w`.
pub fn element_matrix<F>(
    points: &[IntegrationPoint],
    b_operator: F,
    d: &DMatrix<f64>,
) -> DMatrix<f64>
where
    F: Fn(&[[f64; 2]]) -> DMatrix<f64>,
{
    let mut ke: Option<DMatrix<f64>> = None;
    for gp in points {
        let b = b_operator(&gp.grads);
        let contrib = b.transpose() * d * &b * gp.weight;
        ke = Some(match ke {
            Some(acc) => acc + contrib,
            None => contrib,
        });
    }
    ke.unwrap_or_else(|| DMatrix::zeros(0, 0))
}

/// Consistent load vector `Σ Nᵀ·s·w` for a constant source with one
/// component per DOF of a node.
pub fn element_load(points: &[IntegrationPoint], source: &[f64]) -> DVector<f64> {
    let dofs_per_node = source.len();
    let num_nodes = points.first().map_or(0, |gp| gp.shape.len());
    let mut fe = DVector::zeros(num_nodes * dofs_per_node);
    for gp in points {
        for (i, n) in gp.shape.iter().enumerate() {
            for (c, s) in source.iter().enumerate() {
                fe[dofs_per_node * i + c] += n * s * gp.weight;
            }
        }
    }
    fe
}

/// Map element node ids to global DOF indices (`dofs_per_node * node + c`).
pub fn global_dofs(connectivity: &[usize], dofs_per_node: usize) -> Vec<usize> {
    connectivity
        .iter()
        .flat_map(|&n| (0..dofs_per_node).map(move |c| dofs_per_node * n + c))
        .collect()
}
