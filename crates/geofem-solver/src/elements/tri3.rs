//! 3-node constant-strain triangle.
//!
//! Shape-function gradients are constant over the element, so a single
//! integration point at the centroid with weight `|A|` is exact.

use super::{DegenerateGeometry, IntegrationPoint};
use crate::mesh::CellType;

/// Signed area from the shoelace determinant (positive for counter-clockwise nodes).
pub fn signed_area(coords: &[[f64; 2]]) -> f64 {
    let [x1, y1] = coords[0];
    let [x2, y2] = coords[1];
    let [x3, y3] = coords[2];
    0.5 * ((x2 - x1) * (y3 - y1) - (x3 - x1) * (y2 - y1))
}

/// Physical shape-function gradients `[dN_i/dx, dN_i/dy]`.
pub fn gradients(coords: &[[f64; 2]]) -> Result<[[f64; 2]; 3], DegenerateGeometry> {
    let area = signed_area(coords);
    if area == 0.0 || !area.is_finite() {
        return Err(DegenerateGeometry {
            cell_type: CellType::Tri3,
            measure: area,
        });
    }
    let [x1, y1] = coords[0];
    let [x2, y2] = coords[1];
    let [x3, y3] = coords[2];
    let inv = 1.0 / (2.0 * area);
    Ok([
        [(y2 - y3) * inv, (x3 - x2) * inv],
        [(y3 - y1) * inv, (x1 - x3) * inv],
        [(y1 - y2) * inv, (x2 - x1) * inv],
    ])
}

pub fn integration_points(
    coords: &[[f64; 2]],
) -> Result<Vec<IntegrationPoint>, DegenerateGeometry> {
    let grads = gradients(coords)?;
    Ok(vec![IntegrationPoint {
        shape: vec![1.0 / 3.0; 3],
        grads: grads.to_vec(),
        weight: signed_area(coords).abs(),
    }])
}
