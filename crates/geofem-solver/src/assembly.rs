//! Global system assembly.
//!
//! Elements are visited in a fixed order (tri3 block, then quad4 block, each
//! by local index). Element matrices are scattered as `(row, col, value)`
//! triplets into a COO accumulator, which is converted once to CSR; duplicate
//! entries are summed by the conversion.
//!
//! The stiffness matrix is assembled once per run. Load vectors (body force,
//! gravity deltas, edge loads) are separate so stages can recombine them.

use crate::elements::{self, IntegrationPoint};
use crate::error::Result;
use crate::materials::ElementMaterials;
use crate::mesh::{CellType, Mesh};
use crate::physics::Physics;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Assembled global system
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    /// Global stiffness (or conductivity) matrix in CSR format
    pub stiffness: CsrMatrix<f64>,
    /// Equivalent nodal body force for the model gravity
    pub body_force: DVector<f64>,
    /// Number of degrees of freedom
    pub num_dofs: usize,
}

/// Element loop over a mesh for one physics variant.
pub struct Assembler<'a, P: Physics> {
    mesh: &'a Mesh,
    physics: &'a P,
    materials: &'a ElementMaterials<P::Material>,
    /// Constitutive matrix per resolved material
    constitutive: Vec<DMatrix<f64>>,
}

impl<'a, P: Physics> Assembler<'a, P> {
    pub fn new(
        mesh: &'a Mesh,
        physics: &'a P,
        materials: &'a ElementMaterials<P::Material>,
    ) -> Result<Self> {
        let constitutive = materials
            .materials
            .iter()
            .map(|m| physics.constitutive(m))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            mesh,
            physics,
            materials,
            constitutive,
        })
    }

    pub fn num_dofs(&self) -> usize {
        self.mesh.num_nodes() * P::DOFS_PER_NODE
    }

    /// Constitutive matrices indexed like `ElementMaterials::materials`
    pub fn constitutive(&self) -> &[DMatrix<f64>] {
        &self.constitutive
    }

    /// Visit every element in assembly order.
    fn for_each_element<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(CellType, usize, &[usize], &[IntegrationPoint]) -> Result<()>,
    {
        for block in self.mesh.blocks() {
            let cell_type = block.cell_type;
            for (index, conn) in block.cells().enumerate() {
                let coords = self.mesh.cell_coords(conn);
                let points = elements::integration_points(cell_type, &coords)
                    .map_err(|e| e.at(index))?;
                visit(cell_type, index, conn, &points)?;
            }
        }
        Ok(())
    }

    /// Assemble the stiffness matrix and the model-gravity body force.
    pub fn assemble(&self) -> Result<GlobalSystem> {
        let num_dofs = self.num_dofs();
        let gravity = self.physics.model_gravity();
        let mut coo = CooMatrix::new(num_dofs, num_dofs);
        let mut body_force = DVector::zeros(num_dofs);
        let mut n_elements = 0usize;

        self.for_each_element(|cell_type, index, conn, points| {
            let material_index = self.materials.index_of(cell_type, index);
            let d = &self.constitutive[material_index];
            let ke = elements::element_matrix(points, |g| self.physics.gradient_operator(g), d);
            let dofs = elements::global_dofs(conn, P::DOFS_PER_NODE);

            for (a, &row) in dofs.iter().enumerate() {
                for (b, &col) in dofs.iter().enumerate() {
                    coo.push(row, col, ke[(a, b)]);
                }
            }

            let material = &self.materials.materials[material_index];
            if let Some(source) = self.physics.body_source(material, gravity) {
                let fe = elements::element_load(points, &source);
                for (a, &row) in dofs.iter().enumerate() {
                    body_force[row] += fe[a];
                }
            }
            n_elements += 1;
            Ok(())
        })?;

        let stiffness = CsrMatrix::from(&coo);
        debug!(
            "assembled {} element(s): {} dofs, {} triplets, {} stored entries",
            n_elements,
            num_dofs,
            coo.nnz(),
            stiffness.nnz()
        );

        Ok(GlobalSystem {
            stiffness,
            body_force,
            num_dofs,
        })
    }

    /// Equivalent nodal body force `ρ·g` for an arbitrary gravity vector.
    pub fn body_load(&self, gravity: [f64; 2]) -> Result<DVector<f64>> {
        let mut force = DVector::zeros(self.num_dofs());
        self.for_each_element(|cell_type, index, conn, points| {
            let material = self.materials.get(cell_type, index);
            if let Some(source) = self.physics.body_source(material, gravity) {
                let fe = elements::element_load(points, &source);
                for (a, &row) in elements::global_dofs(conn, P::DOFS_PER_NODE).iter().enumerate() {
                    force[row] += fe[a];
                }
            }
            Ok(())
        })?;
        Ok(force)
    }

    /// Uniform per-length load on edges: half of `value · L` to each endpoint.
    pub fn edge_load(&self, edges: &[[usize; 2]], value: &[f64]) -> DVector<f64> {
        edge_load(&self.mesh.points, edges, value, self.num_dofs())
    }
}

/// Lumped edge load with `value.len()` components per node.
pub fn edge_load(
    points: &[[f64; 2]],
    edges: &[[usize; 2]],
    value: &[f64],
    num_dofs: usize,
) -> DVector<f64> {
    let dofs_per_node = value.len();
    let mut force = DVector::zeros(num_dofs);
    for &[n1, n2] in edges {
        let [x1, y1] = points[n1];
        let [x2, y2] = points[n2];
        let half_length = 0.5 * (x2 - x1).hypot(y2 - y1);
        for (c, v) in value.iter().enumerate() {
            force[dofs_per_node * n1 + c] += v * half_length;
            force[dofs_per_node * n2 + c] += v * half_length;
        }
    }
    force
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Assignment, MaterialSpec, ModelSpec};
    use crate::materials::{ElasticMaterial, resolve_assignments};
    use crate::physics::PlaneElasticity;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn square_mesh() -> Mesh {
        let mut mesh = Mesh::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        mesh.add_cells(CellType::Tri3, vec![0, 1, 2, 0, 2, 3]).unwrap();
        mesh.sets.add_element_set("all", CellType::Tri3, vec![0, 1]);
        mesh
    }

    fn soil(rho: f64) -> BTreeMap<String, MaterialSpec> {
        [(
            "soil".to_string(),
            MaterialSpec {
                model_name: "linear_elastic".into(),
                parameters: [
                    ("E".to_string(), json!(1000.0)),
                    ("nu".to_string(), json!(0.3)),
                    ("rho".to_string(), json!(rho)),
                ]
                .into_iter()
                .collect(),
            },
        )]
        .into()
    }

    fn assignment() -> Vec<Assignment> {
        vec![Assignment {
            element_set: "all".into(),
            cell_type: "tri3".into(),
            material_id: "soil".into(),
        }]
    }

    #[test]
    fn stiffness_is_symmetric_with_rigid_body_modes() {
        let mesh = square_mesh();
        let physics = PlaneElasticity::from_model(&ModelSpec::default()).unwrap();
        let materials =
            resolve_assignments::<ElasticMaterial>(&mesh, &soil(0.0), &assignment()).unwrap();
        let assembler = Assembler::new(&mesh, &physics, &materials).unwrap();
        let system = assembler.assemble().unwrap();
        assert_eq!(system.num_dofs, 8);

        let dense = DMatrix::from(&system.stiffness);
        for i in 0..8 {
            for j in 0..8 {
                assert_relative_eq!(dense[(i, j)], dense[(j, i)], epsilon = 1e-9);
            }
        }
        // Rigid translation in x produces no force
        let ux = DVector::from_iterator(8, (0..8).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }));
        assert!((&dense * &ux).norm() < 1e-9);
    }

    #[test]
    fn body_force_totals_weight() {
        let mesh = square_mesh();
        let model = ModelSpec {
            gravity: [0.0, -10.0],
            ..ModelSpec::default()
        };
        let physics = PlaneElasticity::from_model(&model).unwrap();
        let materials =
            resolve_assignments::<ElasticMaterial>(&mesh, &soil(2.0), &assignment()).unwrap();
        let assembler = Assembler::new(&mesh, &physics, &materials).unwrap();
        let system = assembler.assemble().unwrap();
        let fy: f64 = (0..4).map(|n| system.body_force[2 * n + 1]).sum();
        assert_relative_eq!(fy, -20.0, epsilon = 1e-12);

        let extra = assembler.body_load([1.0, 0.0]).unwrap();
        let fx: f64 = (0..4).map(|n| extra[2 * n]).sum();
        assert_relative_eq!(fx, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn edge_load_splits_per_endpoint() {
        let points = [[0.0, 1.0], [3.0, 5.0]];
        let f = edge_load(&points, &[[0, 1]], &[0.0, -2.0], 4);
        assert_eq!(f.as_slice(), &[0.0, -5.0, 0.0, -5.0]);
        let q = edge_load(&points, &[[1, 0]], &[1.0], 2);
        assert_eq!(q.as_slice(), &[2.5, 2.5]);
    }

    #[test]
    fn degenerate_element_is_located() {
        let mut mesh = Mesh::new(vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0]]);
        mesh.add_cells(CellType::Tri3, vec![0, 1, 3, 0, 1, 2]).unwrap();
        mesh.sets.add_element_set("all", CellType::Tri3, vec![0, 1]);
        let physics = PlaneElasticity::from_model(&ModelSpec::default()).unwrap();
        let materials =
            resolve_assignments::<ElasticMaterial>(&mesh, &soil(0.0), &assignment()).unwrap();
        let err = Assembler::new(&mesh, &physics, &materials)
            .unwrap()
            .assemble()
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::SolverError::DegenerateElement { index: 1, .. }
        ));
    }
}
