//! 4-node bilinear quadrilateral with 2×2 Gauss integration.
//!
//! Node ordering in the parent square:
//! ```text
//!   4 (-1,+1) ---- 3 (+1,+1)
//!       |              |
//!   1 (-1,-1) ---- 2 (+1,-1)
//! ```

use super::{DegenerateGeometry, IntegrationPoint};
use crate::mesh::CellType;
use nalgebra::Matrix2;

const G: f64 = 0.577_350_269_189_625_8; // 1/sqrt(3)

/// Gauss points (ξ, η), all with unit weight
pub const GAUSS_POINTS: [(f64, f64); 4] = [(-G, -G), (G, -G), (G, G), (-G, G)];

/// Bilinear shape functions at (ξ, η)
pub fn shape_functions(xi: f64, eta: f64) -> [f64; 4] {
    [
        0.25 * (1.0 - xi) * (1.0 - eta),
        0.25 * (1.0 + xi) * (1.0 - eta),
        0.25 * (1.0 + xi) * (1.0 + eta),
        0.25 * (1.0 - xi) * (1.0 + eta),
    ]
}

/// Parametric derivatives `(dN/dξ, dN/dη)` at (ξ, η)
pub fn shape_derivatives(xi: f64, eta: f64) -> ([f64; 4], [f64; 4]) {
    let dn_dxi = [
        -0.25 * (1.0 - eta),
        0.25 * (1.0 - eta),
        0.25 * (1.0 + eta),
        -0.25 * (1.0 + eta),
    ];
    let dn_deta = [
        -0.25 * (1.0 - xi),
        -0.25 * (1.0 + xi),
        0.25 * (1.0 + xi),
        0.25 * (1.0 - xi),
    ];
    (dn_dxi, dn_deta)
}

/// Jacobian `[[∂x/∂ξ, ∂y/∂ξ], [∂x/∂η, ∂y/∂η]]`
pub fn jacobian(coords: &[[f64; 2]], dn_dxi: &[f64; 4], dn_deta: &[f64; 4]) -> Matrix2<f64> {
    let mut j = Matrix2::zeros();
    for (i, &[x, y]) in coords.iter().take(4).enumerate() {
        j[(0, 0)] += dn_dxi[i] * x;
        j[(0, 1)] += dn_dxi[i] * y;
        j[(1, 0)] += dn_deta[i] * x;
        j[(1, 1)] += dn_deta[i] * y;
    }
    j
}

/// Integration points with physical gradients.
///
/// Fails when any Gauss-point Jacobian determinant is zero, or when the
/// determinants change sign (self-intersecting element). Either orientation
/// is accepted; `|detJ|` is the weight.
pub fn integration_points(
    coords: &[[f64; 2]],
) -> Result<Vec<IntegrationPoint>, DegenerateGeometry> {
    let degenerate = |measure| DegenerateGeometry {
        cell_type: CellType::Quad4,
        measure,
    };

    let mut points = Vec::with_capacity(GAUSS_POINTS.len());
    let mut orientation = 0.0_f64;

    for &(xi, eta) in &GAUSS_POINTS {
        let (dn_dxi, dn_deta) = shape_derivatives(xi, eta);
        let j = jacobian(coords, &dn_dxi, &dn_deta);
        let det_j = j.determinant();

        if det_j == 0.0 || !det_j.is_finite() {
            return Err(degenerate(det_j));
        }
        if orientation == 0.0 {
            orientation = det_j.signum();
        } else if det_j.signum() != orientation {
            return Err(degenerate(det_j));
        }

        let inv_j = j.try_inverse().ok_or_else(|| degenerate(det_j))?;
        // [dN/dx, dN/dy]ᵀ = J⁻¹ · [dN/dξ, dN/dη]ᵀ
        let grads = (0..4)
            .map(|i| {
                [
                    inv_j[(0, 0)] * dn_dxi[i] + inv_j[(0, 1)] * dn_deta[i],
                    inv_j[(1, 0)] * dn_dxi[i] + inv_j[(1, 1)] * dn_deta[i],
                ]
            })
            .collect();

        points.push(IntegrationPoint {
            shape: shape_functions(xi, eta).to_vec(),
            grads,
            weight: det_j.abs(),
        });
    }

    Ok(points)
}
