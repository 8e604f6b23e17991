//! Steady seepage (Darcy / Poisson) with one pressure DOF per node.

use super::{Constraint, LoadKind, Physics, require_set, scalar};
use crate::capabilities::Capabilities;
use crate::contract::{AnalysisMode, BcSpec, FieldShape, LoadSpec, ModelSpec};
use crate::elements::scalar_gradient;
use crate::error::{Result, SolverError};
use crate::materials::DarcyMaterial;
use crate::output::{FieldDef, UnitKind};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteadySeepage;

impl Physics for SteadySeepage {
    type Material = DarcyMaterial;

    const NAME: &'static str = "reference_seepage";
    const NOTE: &'static str = "steady seepage reference solver (nalgebra-sparse)";
    const DOFS_PER_NODE: usize = 1;
    const NODAL_FIELD: FieldDef = FieldDef::nodal("p", FieldShape::Scalar, UnitKind::Pressure);
    const ELEMENT_FIELDS: &'static [FieldDef] = &[];

    fn capabilities() -> Capabilities {
        Capabilities::new(
            Self::NAME,
            &[AnalysisMode::PlaneStrain, AnalysisMode::PlaneStress],
            &["seepage_steady"],
            &["darcy"],
            &["p"],
            &["flux"],
            &["p"],
            &["p"],
        )
    }

    fn from_model(model: &ModelSpec) -> Result<Self> {
        if model.dimension != 2 {
            return Err(SolverError::Contract(format!(
                "{} supports only 2D models, got dimension {}",
                Self::NAME,
                model.dimension
            )));
        }
        if model.mode == AnalysisMode::Axisymmetric {
            return Err(SolverError::Contract(format!(
                "{} does not support axisymmetric models",
                Self::NAME
            )));
        }
        Ok(Self)
    }

    fn gradient_operator(&self, grads: &[[f64; 2]]) -> DMatrix<f64> {
        scalar_gradient(grads)
    }

    fn constitutive(&self, material: &DarcyMaterial) -> Result<DMatrix<f64>> {
        Ok(DMatrix::identity(2, 2) * material.permeability)
    }

    fn body_source(&self, _material: &DarcyMaterial, _gravity: [f64; 2]) -> Option<Vec<f64>> {
        None
    }

    fn model_gravity(&self) -> [f64; 2] {
        [0.0, 0.0]
    }

    fn parse_constraint(&self, bc: &BcSpec) -> Result<Option<Constraint>> {
        if bc.kind != "p" {
            return Ok(None);
        }
        let set = require_set("p", Some(bc.set.as_str()))?;
        let value = scalar(&bc.value, "p.value")?;
        Ok(Some(Constraint {
            set,
            components: vec![(0, value)],
        }))
    }

    fn parse_load(&self, load: &LoadSpec) -> Result<Option<LoadKind>> {
        if load.kind != "flux" {
            return Ok(None);
        }
        let set = require_set("flux", load.set.as_deref())?;
        let q = scalar(&load.value, "flux.value")?;
        Ok(Some(LoadKind::Edge {
            set,
            value: vec![q],
        }))
    }

    fn element_values(&self, _averaged: &DVector<f64>) -> Vec<f64> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conductivity_is_isotropic() {
        let d = SteadySeepage
            .constitutive(&DarcyMaterial { permeability: 2e-5 })
            .unwrap();
        assert_eq!(d[(0, 0)], 2e-5);
        assert_eq!(d[(1, 1)], 2e-5);
        assert_eq!(d[(0, 1)], 0.0);
    }

    #[test]
    fn pressure_bc_and_flux_load() {
        let bc = BcSpec {
            kind: "p".into(),
            set: "left".into(),
            value: json!(10.0),
        };
        let c = SteadySeepage.parse_constraint(&bc).unwrap().unwrap();
        assert_eq!(c.components, vec![(0, 10.0)]);

        let flux = LoadSpec {
            kind: "flux".into(),
            set: Some("right".into()),
            value: json!(-0.5),
        };
        assert_eq!(
            SteadySeepage.parse_load(&flux).unwrap(),
            Some(LoadKind::Edge {
                set: "right".into(),
                value: vec![-0.5]
            })
        );
    }

    #[test]
    fn displacement_and_gravity_are_foreign() {
        let bc = BcSpec {
            kind: "displacement".into(),
            set: "bottom".into(),
            value: json!({"ux": 0.0}),
        };
        assert_eq!(SteadySeepage.parse_constraint(&bc).unwrap(), None);
        let g = LoadSpec {
            kind: "gravity".into(),
            set: None,
            value: json!([0.0, -9.81]),
        };
        assert_eq!(SteadySeepage.parse_load(&g).unwrap(), None);
    }

    #[test]
    fn fields_are_pressure_only() {
        let fields = SteadySeepage::fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "p");
        assert_eq!(SteadySeepage::resolve_output_name("p"), vec!["p"]);
        assert!(SteadySeepage::resolve_output_name("u").is_empty());
    }
}
