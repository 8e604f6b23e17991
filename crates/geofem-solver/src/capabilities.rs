//! Static capability descriptors advertised by each solver variant.

use crate::contract::{AnalysisMode, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

/// Supported contract version range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRange {
    pub min: String,
    pub max: String,
}

/// What a solver variant accepts and produces.
///
/// Upstream validation reads this to reject unsupported requests before a
/// run starts; the solver itself only skips unsupported entries with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub name: String,
    pub contract: ContractRange,
    pub modes: Vec<String>,
    pub analysis_types: Vec<String>,
    pub materials: Vec<String>,
    pub bcs: Vec<String>,
    pub loads: Vec<String>,
    pub fields: Vec<String>,
    pub results: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Capabilities {
    /// Build a descriptor for the current contract version.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        modes: &[AnalysisMode],
        analysis_types: &[&str],
        materials: &[&str],
        bcs: &[&str],
        loads: &[&str],
        fields: &[&str],
        results: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            contract: ContractRange {
                min: SCHEMA_VERSION.to_string(),
                max: SCHEMA_VERSION.to_string(),
            },
            modes: modes.iter().map(|m| m.as_str().to_string()).collect(),
            analysis_types: strings(analysis_types),
            materials: strings(materials),
            bcs: strings(bcs),
            loads: strings(loads),
            fields: strings(fields),
            results: strings(results),
        }
    }

    pub fn supports_mode(&self, mode: AnalysisMode) -> bool {
        self.modes.iter().any(|m| m == mode.as_str())
    }

    pub fn supports_analysis_type(&self, analysis_type: &str) -> bool {
        self.analysis_types.iter().any(|t| t == analysis_type)
    }

    pub fn supports_bc(&self, kind: &str) -> bool {
        self.bcs.iter().any(|b| b == kind)
    }

    pub fn supports_load(&self, kind: &str) -> bool {
        self.loads.iter().any(|l| l == kind)
    }
}
