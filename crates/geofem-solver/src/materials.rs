//! Material records and the element-set material resolver.

use crate::contract::{AnalysisMode, Assignment, MaterialSpec};
use crate::error::{Result, SolverError};
use crate::mesh::{CellType, Mesh};
use log::{debug, warn};
use nalgebra::Matrix3;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A material law usable by one physics variant.
pub trait MaterialModel: Sized + Clone + std::fmt::Debug {
    /// `model_name` this record is built from
    const MODEL_NAME: &'static str;

    /// Parse and validate the parameter map of material `id`.
    fn from_parameters(id: &str, parameters: &BTreeMap<String, Value>) -> Result<Self>;
}

fn number(id: &str, parameters: &BTreeMap<String, Value>, key: &str) -> Result<Option<f64>> {
    match parameters.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            SolverError::Contract(format!("material '{id}': parameter '{key}' must be a number"))
        }),
    }
}

fn required(id: &str, parameters: &BTreeMap<String, Value>, key: &str) -> Result<f64> {
    number(id, parameters, key)?.ok_or_else(|| {
        SolverError::Contract(format!("material '{id}': missing parameter '{key}'"))
    })
}

/// Isotropic linear elastic material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticMaterial {
    /// Young's modulus (E)
    pub youngs_modulus: f64,
    /// Poisson's ratio (ν)
    pub poissons_ratio: f64,
    /// Density (ρ), defaults to 0
    pub density: f64,
}

impl ElasticMaterial {
    pub fn new(youngs_modulus: f64, poissons_ratio: f64, density: f64) -> Self {
        Self {
            youngs_modulus,
            poissons_ratio,
            density,
        }
    }

    /// Plane constitutive matrix `D` relating `[εx, εy, γxy]` to `[σx, σy, τxy]`.
    pub fn plane_d(&self, mode: AnalysisMode) -> Result<Matrix3<f64>> {
        let e = self.youngs_modulus;
        let nu = self.poissons_ratio;
        match mode {
            AnalysisMode::PlaneStress => {
                let c = e / (1.0 - nu * nu);
                Ok(Matrix3::new(
                    c,
                    c * nu,
                    0.0,
                    c * nu,
                    c,
                    0.0,
                    0.0,
                    0.0,
                    c * (1.0 - nu) / 2.0,
                ))
            }
            AnalysisMode::PlaneStrain => {
                if nu >= 0.5 {
                    return Err(SolverError::Contract(format!(
                        "plane strain needs nu < 0.5, got {nu}"
                    )));
                }
                let c = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
                Ok(Matrix3::new(
                    c * (1.0 - nu),
                    c * nu,
                    0.0,
                    c * nu,
                    c * (1.0 - nu),
                    0.0,
                    0.0,
                    0.0,
                    c * (1.0 - 2.0 * nu) / 2.0,
                ))
            }
            other => Err(SolverError::Contract(format!(
                "unsupported mode for plane elasticity: {}",
                other.as_str()
            ))),
        }
    }
}

impl MaterialModel for ElasticMaterial {
    const MODEL_NAME: &'static str = "linear_elastic";

    fn from_parameters(id: &str, parameters: &BTreeMap<String, Value>) -> Result<Self> {
        let e = required(id, parameters, "E")?;
        let nu = required(id, parameters, "nu")?;
        let rho = number(id, parameters, "rho")?.unwrap_or(0.0);

        if !(e.is_finite() && e > 0.0) {
            return Err(SolverError::Contract(format!(
                "material '{id}': E must be positive, got {e}"
            )));
        }
        // 0.5 is allowed here; plane strain rejects it when building D
        if !(nu > -1.0 && nu <= 0.5) {
            return Err(SolverError::Contract(format!(
                "material '{id}': nu must lie in (-1, 0.5], got {nu}"
            )));
        }
        if !rho.is_finite() {
            return Err(SolverError::Contract(format!(
                "material '{id}': rho must be finite"
            )));
        }
        Ok(Self::new(e, nu, rho))
    }
}

/// Isotropic Darcy permeability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DarcyMaterial {
    pub permeability: f64,
}

impl MaterialModel for DarcyMaterial {
    const MODEL_NAME: &'static str = "darcy";

    fn from_parameters(id: &str, parameters: &BTreeMap<String, Value>) -> Result<Self> {
        let k = required(id, parameters, "k")?;
        if !(k.is_finite() && k > 0.0) {
            return Err(SolverError::Contract(format!(
                "material '{id}': k must be positive, got {k}"
            )));
        }
        Ok(Self { permeability: k })
    }
}

/// Per-element material indices for every cell block of a mesh.
#[derive(Debug, Clone)]
pub struct ElementMaterials<M> {
    /// Resolved records, indexed by first-use order
    pub materials: Vec<M>,
    by_block: BTreeMap<CellType, Vec<usize>>,
}

impl<M> ElementMaterials<M> {
    /// Index into [`Self::materials`] of cell `index` in block `cell_type`
    pub fn index_of(&self, cell_type: CellType, index: usize) -> usize {
        self.by_block[&cell_type][index]
    }

    /// Material of cell `index` in block `cell_type`
    pub fn get(&self, cell_type: CellType, index: usize) -> &M {
        &self.materials[self.index_of(cell_type, index)]
    }
}

/// Resolves material ids to records, caching each id after first use.
struct MaterialResolver<'a, M> {
    specs: &'a BTreeMap<String, MaterialSpec>,
    cache: HashMap<String, usize>,
    materials: Vec<M>,
}

impl<'a, M: MaterialModel> MaterialResolver<'a, M> {
    fn new(specs: &'a BTreeMap<String, MaterialSpec>) -> Self {
        Self {
            specs,
            cache: HashMap::new(),
            materials: Vec::new(),
        }
    }

    fn index_of(&mut self, id: &str) -> Result<usize> {
        if let Some(&idx) = self.cache.get(id) {
            return Ok(idx);
        }
        let spec = self
            .specs
            .get(id)
            .ok_or_else(|| SolverError::UnknownMaterial(id.to_string()))?;
        if spec.model_name != M::MODEL_NAME {
            return Err(SolverError::Contract(format!(
                "material '{id}' has model '{}', this solver supports only {}",
                spec.model_name,
                M::MODEL_NAME
            )));
        }
        let record = M::from_parameters(id, &spec.parameters)?;
        let idx = self.materials.len();
        self.materials.push(record);
        self.cache.insert(id.to_string(), idx);
        Ok(idx)
    }
}

/// Stamp every element with the material of its assignment.
///
/// Later assignments overwrite earlier ones for shared elements. Every
/// element of every non-empty block must end up with a material.
pub fn resolve_assignments<M: MaterialModel>(
    mesh: &Mesh,
    specs: &BTreeMap<String, MaterialSpec>,
    assignments: &[Assignment],
) -> Result<ElementMaterials<M>> {
    const UNASSIGNED: usize = usize::MAX;

    let mut resolver = MaterialResolver::<M>::new(specs);
    let mut by_block: BTreeMap<CellType, Vec<usize>> = CellType::ALL
        .iter()
        .map(|&ct| (ct, vec![UNASSIGNED; mesh.num_cells(ct)]))
        .collect();

    for assignment in assignments {
        let set = assignment.element_set.trim();
        let material_id = assignment.material_id.trim();
        let cell_type_name = assignment.cell_type.trim();
        if set.is_empty() || material_id.is_empty() || cell_type_name.is_empty() {
            warn!("skipping incomplete assignment {:?}", assignment);
            continue;
        }
        let cell_type = CellType::from_name(cell_type_name).ok_or_else(|| {
            SolverError::Contract(format!("unsupported cell_type in assignment: {cell_type_name}"))
        })?;
        let idx = resolver.index_of(material_id)?;
        let elements = mesh.sets.elements(set, cell_type)?;
        let slots = by_block
            .get_mut(&cell_type)
            .ok_or_else(|| SolverError::Runtime(format!("no block slot for {cell_type}")))?;
        for &e in elements {
            let slot = slots.get_mut(e).ok_or_else(|| {
                SolverError::Contract(format!(
                    "element set '{set}' references {cell_type} cell {e} out of range"
                ))
            })?;
            *slot = idx;
        }
    }

    for (&cell_type, slots) in &by_block {
        let count = slots.iter().filter(|&&s| s == UNASSIGNED).count();
        if count > 0 {
            let first = slots.iter().position(|&s| s == UNASSIGNED).unwrap_or(0);
            return Err(SolverError::UnassignedElements {
                cell_type,
                count,
                first,
            });
        }
    }

    debug!(
        "resolved {} material(s) for {} element(s)",
        resolver.materials.len(),
        mesh.total_cells()
    );

    Ok(ElementMaterials {
        materials: resolver.materials,
        by_block,
    })
}
