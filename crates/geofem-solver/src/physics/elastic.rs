//! Small-strain plane elasticity (static).

use super::{Constraint, LoadKind, Physics, require_set, scalar, vector2};
use crate::capabilities::Capabilities;
use crate::contract::{AnalysisMode, BcSpec, FieldShape, LoadSpec, ModelSpec};
use crate::elements::strain_displacement;
use crate::error::{Result, SolverError};
use crate::materials::ElasticMaterial;
use crate::output::{FieldDef, UnitKind};
use crate::postprocess::StressState2D;
use nalgebra::{DMatrix, DVector};

/// Plane strain / plane stress elasticity with two DOFs `(ux, uy)` per node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneElasticity {
    pub mode: AnalysisMode,
    pub gravity: [f64; 2],
}

impl Physics for PlaneElasticity {
    type Material = ElasticMaterial;

    const NAME: &'static str = "reference_elastic";
    const NOTE: &'static str = "linear elastic reference solver (nalgebra-sparse)";
    const DOFS_PER_NODE: usize = 2;
    const NODAL_FIELD: FieldDef = FieldDef::nodal("u", FieldShape::Vector2, UnitKind::Length);
    const ELEMENT_FIELDS: &'static [FieldDef] = &[
        FieldDef::element("sx", UnitKind::Pressure),
        FieldDef::element("sy", UnitKind::Pressure),
        FieldDef::element("sxy", UnitKind::Pressure),
        FieldDef::element("vm", UnitKind::Pressure),
    ];

    fn capabilities() -> Capabilities {
        Capabilities::new(
            Self::NAME,
            &[AnalysisMode::PlaneStrain, AnalysisMode::PlaneStress],
            &["static"],
            &["linear_elastic"],
            &["displacement"],
            &["gravity", "traction"],
            &["u", "sx", "sy", "sxy", "vm"],
            &["u", "stress", "vm"],
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
        match model.mode {
            AnalysisMode::PlaneStrain | AnalysisMode::PlaneStress => Ok(Self {
                mode: model.mode,
                gravity: model.gravity,
            }),
            other => Err(SolverError::Contract(format!(
                "{} supports only plane_strain/plane_stress, got {}",
                Self::NAME,
                other.as_str()
            ))),
        }
    }

    fn gradient_operator(&self, grads: &[[f64; 2]]) -> DMatrix<f64> {
        strain_displacement(grads)
    }

    fn constitutive(&self, material: &ElasticMaterial) -> Result<DMatrix<f64>> {
        let d = material.plane_d(self.mode)?;
        Ok(DMatrix::from_column_slice(3, 3, d.as_slice()))
    }

    fn body_source(&self, material: &ElasticMaterial, gravity: [f64; 2]) -> Option<Vec<f64>> {
        Some(vec![material.density * gravity[0], material.density * gravity[1]])
    }

    fn model_gravity(&self) -> [f64; 2] {
        self.gravity
    }

    fn parse_constraint(&self, bc: &BcSpec) -> Result<Option<Constraint>> {
        if bc.kind != "displacement" {
            return Ok(None);
        }
        let set = require_set("displacement", Some(bc.set.as_str()))?;
        let value = bc.value.as_object().ok_or_else(|| {
            SolverError::Contract(format!(
                "displacement on '{set}': value must be an object with ux and/or uy"
            ))
        })?;

        let mut components = Vec::with_capacity(2);
        for (component, key) in ["ux", "uy"].into_iter().enumerate() {
            if let Some(v) = value.get(key).filter(|v| !v.is_null()) {
                components.push((component, scalar(v, &format!("displacement.{key}"))?));
            }
        }
        if components.is_empty() {
            return Err(SolverError::Contract(format!(
                "displacement on '{set}' fixes neither ux nor uy"
            )));
        }
        Ok(Some(Constraint { set, components }))
    }

    fn parse_load(&self, load: &LoadSpec) -> Result<Option<LoadKind>> {
        match load.kind.as_str() {
            "gravity" => Ok(Some(LoadKind::Gravity(vector2(&load.value, "gravity.value")?))),
            "traction" => {
                let set = require_set("traction", load.set.as_deref())?;
                let t = vector2(&load.value, "traction.value")?;
                Ok(Some(LoadKind::Edge {
                    set,
                    value: t.to_vec(),
                }))
            }
            _ => Ok(None),
        }
    }

    fn element_values(&self, averaged: &DVector<f64>) -> Vec<f64> {
        let stress = StressState2D::new(averaged[0], averaged[1], averaged[2]);
        vec![stress.sx, stress.sy, stress.sxy, stress.von_mises()]
    }

    fn resolve_output_name(name: &str) -> Vec<&'static str> {
        match name {
            "stress" => vec!["sx", "sy", "sxy"],
            "u" => vec!["u"],
            "sx" => vec!["sx"],
            "sy" => vec!["sy"],
            "sxy" => vec!["sxy"],
            "vm" => vec!["vm"],
            _ => Vec::new(),
        }
    }
}
