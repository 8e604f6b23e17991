//! Physics variants sharing one assembly, staging and solve pipeline.
//!
//! A variant fixes the number of DOFs per node, the gradient operator built
//! from shape-function gradients, the constitutive operator, how BC and load
//! payloads are read, and which fields it writes. Everything else is generic.

pub mod elastic;
pub mod seepage;

pub use elastic::PlaneElasticity;
pub use seepage::SteadySeepage;

use crate::capabilities::Capabilities;
use crate::contract::{BcSpec, LoadSpec, ModelSpec};
use crate::error::{Result, SolverError};
use crate::materials::MaterialModel;
use crate::output::FieldDef;
use nalgebra::{DMatrix, DVector};
use serde_json::Value;

/// Prescribed values on the nodes of a set, per DOF component.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub set: String,
    /// `(component, value)` pairs
    pub components: Vec<(usize, f64)>,
}

/// A parsed stage load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadKind {
    /// Gravity vector replacing the model gravity for this stage's contribution
    Gravity([f64; 2]),
    /// Uniform value per unit length on an edge set, one entry per DOF component
    Edge { set: String, value: Vec<f64> },
}

/// Element kernel interface of one physics variant.
pub trait Physics: Sized + Send + Sync {
    type Material: MaterialModel;

    /// Solver name reported in results and used for lookup
    const NAME: &'static str;
    const NOTE: &'static str;
    const DOFS_PER_NODE: usize;
    /// The solved nodal field
    const NODAL_FIELD: FieldDef;
    /// Per-element fields derived in post-processing, in output order
    const ELEMENT_FIELDS: &'static [FieldDef];

    fn capabilities() -> Capabilities;

    /// Configure the variant from the request model section.
    fn from_model(model: &ModelSpec) -> Result<Self>;

    /// Gradient operator `B` from physical shape-function gradients.
    fn gradient_operator(&self, grads: &[[f64; 2]]) -> DMatrix<f64>;

    /// Constitutive operator `D` of a material.
    fn constitutive(&self, material: &Self::Material) -> Result<DMatrix<f64>>;

    /// Body source per unit area for a gravity vector, `None` if the variant
    /// has no body load.
    fn body_source(&self, material: &Self::Material, gravity: [f64; 2]) -> Option<Vec<f64>>;

    /// Gravity from the model section
    fn model_gravity(&self) -> [f64; 2];

    /// Read a BC entry. `Ok(None)` for BC types the variant does not handle.
    fn parse_constraint(&self, bc: &BcSpec) -> Result<Option<Constraint>>;

    /// Read a load entry. `Ok(None)` for load types the variant does not handle.
    fn parse_load(&self, load: &LoadSpec) -> Result<Option<LoadKind>>;

    /// Element field values (same order as [`Self::ELEMENT_FIELDS`]) from the
    /// element-averaged `D·B·u`.
    fn element_values(&self, averaged: &DVector<f64>) -> Vec<f64>;

    /// Field names covered by an output request name.
    fn resolve_output_name(name: &str) -> Vec<&'static str> {
        Self::fields()
            .into_iter()
            .filter(|f| f.name == name)
            .map(|f| f.name)
            .collect()
    }

    /// Nodal field followed by element fields
    fn fields() -> Vec<FieldDef> {
        std::iter::once(Self::NODAL_FIELD)
            .chain(Self::ELEMENT_FIELDS.iter().copied())
            .collect()
    }
}

pub(crate) fn require_set(kind: &str, set: Option<&str>) -> Result<String> {
    match set.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(SolverError::Contract(format!("{kind}: 'set' is required"))),
    }
}

pub(crate) fn scalar(value: &Value, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| SolverError::Contract(format!("{what} must be a number, got {value}")))
}

pub(crate) fn vector2(value: &Value, what: &str) -> Result<[f64; 2]> {
    let items = value.as_array().filter(|a| a.len() >= 2).ok_or_else(|| {
        SolverError::Contract(format!("{what} must be [x, y], got {value}"))
    })?;
    Ok([scalar(&items[0], what)?, scalar(&items[1], what)?])
}
