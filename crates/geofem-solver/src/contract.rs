//! Request and result documents exchanged at the solver boundary.
//!
//! The request is deserialized from JSON as-is; physics-specific payloads
//! (BC and load values, material parameters) stay as [`serde_json::Value`]
//! and are interpreted by the active physics variant.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Contract version written into every result and advertised by capabilities.
pub const SCHEMA_VERSION: &str = "0.2";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_dimension() -> u8 {
    2
}

fn default_every_n() -> i64 {
    1
}

/// Stride as an integer or an integral float (`2.0`).
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
        _ => Err(serde::de::Error::custom(format!(
            "every_n must be an integer, got {number}"
        ))),
    }
}

/// Complete solve request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub unit_system: UnitSystem,
    #[serde(default)]
    pub model: ModelSpec,
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialSpec>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    /// Output requests applied to every stage
    #[serde(default)]
    pub output_requests: Vec<OutputRequest>,
}

impl Default for SolveRequest {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            unit_system: UnitSystem::default(),
            model: ModelSpec::default(),
            materials: BTreeMap::new(),
            assignments: Vec::new(),
            stages: Vec::new(),
            output_requests: Vec::new(),
        }
    }
}

/// Units attached to registry entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSystem {
    #[serde(default = "UnitSystem::default_length")]
    pub length: String,
    #[serde(default = "UnitSystem::default_pressure")]
    pub pressure: String,
}

impl UnitSystem {
    fn default_length() -> String {
        "m".to_string()
    }

    fn default_pressure() -> String {
        "Pa".to_string()
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self {
            length: Self::default_length(),
            pressure: Self::default_pressure(),
        }
    }
}

/// 2D kinematic assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    PlaneStrain,
    PlaneStress,
    Axisymmetric,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::PlaneStrain => "plane_strain",
            AnalysisMode::PlaneStress => "plane_stress",
            AnalysisMode::Axisymmetric => "axisymmetric",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default = "default_dimension")]
    pub dimension: u8,
    #[serde(default)]
    pub mode: AnalysisMode,
    /// Gravity acceleration vector; body force is `rho * gravity`
    #[serde(default)]
    pub gravity: [f64; 2],
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            mode: AnalysisMode::default(),
            gravity: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub model_name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

/// `(element_set, cell_type, material_id)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub element_set: String,
    pub cell_type: String,
    pub material_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(default, alias = "uid", alias = "name", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    /// Number of load sub-steps; 0 means 1
    #[serde(default)]
    pub num_steps: usize,
    /// Time increment per sub-step; 0 means 1.0
    #[serde(default)]
    pub dt: f64,
    #[serde(default)]
    pub bcs: Vec<BcSpec>,
    #[serde(default)]
    pub loads: Vec<LoadSpec>,
    #[serde(default)]
    pub output_requests: Vec<OutputRequest>,
}

impl StageSpec {
    /// Stage label, `stage_<n>` (1-based) when no id is given
    pub fn label(&self, index: usize) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("stage_{}", index + 1),
        }
    }

    pub fn steps(&self) -> usize {
        self.num_steps.max(1)
    }

    pub fn time_step(&self) -> f64 {
        if self.dt == 0.0 { 1.0 } else { self.dt }
    }
}

impl Default for StageSpec {
    fn default() -> Self {
        Self {
            id: None,
            analysis_type: None,
            num_steps: 1,
            dt: 1.0,
            bcs: Vec::new(),
            loads: Vec::new(),
            output_requests: Vec::new(),
        }
    }
}

/// Boundary condition entry; `value` is interpreted by the physics variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BcSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub value: Value,
}

/// Load entry; `set` is required for edge loads only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// Requested output field with write stride. A blank name applies the stride
/// to every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_every_n", deserialize_with = "integral")]
    pub every_n: i64,
}

// ---------------------------------------------------------------------------
// Result side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverInfo {
    pub name: String,
    pub note: String,
    #[serde(default)]
    pub backend: String,
}

/// Per-stage summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    pub id: String,
    pub num_steps: usize,
    pub output_every_n: usize,
    /// Stage-local step indices that were solved and written
    pub output_stage_steps: Vec<usize>,
    pub times: Vec<f64>,
}

/// One written step; also the frame header passed to `on_frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStep {
    /// 1-based global step counter used in archive keys
    pub id: usize,
    pub stage_id: String,
    pub stage_step: usize,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLocation {
    Node,
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldShape {
    Scalar,
    Vector2,
}

/// Manifest entry describing one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub location: FieldLocation,
    pub shape: FieldShape,
    pub unit: String,
    /// Archive key template with a `{step:06d}` placeholder
    #[serde(alias = "npz_pattern")]
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
}

/// Run summary returned next to the field archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    pub schema_version: String,
    pub status: RunStatus,
    pub solver_info: SolverInfo,
    pub stages: Vec<StageInfo>,
    pub global_steps: Vec<GlobalStep>,
    pub registry: Vec<RegistryEntry>,
    pub warnings: Vec<String>,
    pub errors: Vec<ErrorRecord>,
}
