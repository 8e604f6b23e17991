//! Post-processing: element stress recovery and derived invariants.
//!
//! The gradient operator is recomputed from the element geometry rather than
//! cached from assembly, so recovery always matches the kernel that built
//! the stiffness.

use crate::elements::{self, IntegrationPoint};
use crate::error::Result;
use crate::materials::ElementMaterials;
use crate::mesh::Mesh;
use crate::physics::Physics;
use nalgebra::{DMatrix, DVector};

/// Plane stress components `[σx, σy, τxy]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressState2D {
    pub sx: f64,
    pub sy: f64,
    pub sxy: f64,
}

impl StressState2D {
    pub fn new(sx: f64, sy: f64, sxy: f64) -> Self {
        Self { sx, sy, sxy }
    }

    pub fn von_mises(&self) -> f64 {
        von_mises_2d(self.sx, self.sy, self.sxy)
    }
}

/// Von Mises equivalent stress from in-plane components.
///
/// σ_vm = sqrt(σx² − σx·σy + σy² + 3·τxy²)
pub fn von_mises_2d(sx: f64, sy: f64, sxy: f64) -> f64 {
    (sx * sx - sx * sy + sy * sy + 3.0 * sxy * sxy).sqrt()
}

/// Mean of `D·B·u_e` over the integration points of one element.
pub fn element_average<F>(
    points: &[IntegrationPoint],
    b_operator: F,
    d: &DMatrix<f64>,
    u_e: &DVector<f64>,
) -> DVector<f64>
where
    F: Fn(&[[f64; 2]]) -> DMatrix<f64>,
{
    let mut sum = DVector::zeros(d.nrows());
    for gp in points {
        let strain = b_operator(&gp.grads) * u_e;
        sum += d * strain;
    }
    if !points.is_empty() {
        sum /= points.len() as f64;
    }
    sum
}

/// Element field values for every element, in assembly order (tri3 then quad4).
///
/// Returns one column per element field of the physics variant; empty when
/// the variant defines none.
pub fn recover_element_fields<P: Physics>(
    mesh: &Mesh,
    physics: &P,
    materials: &ElementMaterials<P::Material>,
    constitutive: &[DMatrix<f64>],
    u: &DVector<f64>,
) -> Result<Vec<Vec<f64>>> {
    let n_fields = P::ELEMENT_FIELDS.len();
    let mut columns = vec![Vec::with_capacity(mesh.total_cells()); n_fields];
    if n_fields == 0 {
        return Ok(columns);
    }

    for block in mesh.blocks() {
        let cell_type = block.cell_type;
        for (index, conn) in block.cells().enumerate() {
            let coords = mesh.cell_coords(conn);
            let points = elements::integration_points(cell_type, &coords)
                .map_err(|e| e.at(index))?;
            let dofs = elements::global_dofs(conn, P::DOFS_PER_NODE);
            let u_e = DVector::from_iterator(dofs.len(), dofs.iter().map(|&g| u[g]));
            let d = &constitutive[materials.index_of(cell_type, index)];

            let averaged =
                element_average(&points, |g| physics.gradient_operator(g), d, &u_e);
            for (column, value) in columns.iter_mut().zip(physics.element_values(&averaged)) {
                column.push(value);
            }
        }
    }
    Ok(columns)
}
