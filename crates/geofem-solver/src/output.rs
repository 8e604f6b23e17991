//! Output fields: definitions, registry entries, the field archive and
//! per-stage output scheduling.

use crate::contract::{FieldLocation, FieldShape, OutputRequest, RegistryEntry, UnitSystem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder substituted by the global step id in registry patterns
pub const STEP_PLACEHOLDER: &str = "{step:06d}";

/// Physical quantity of a field, used to pick its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Length,
    Pressure,
}

/// Static description of one output field of a physics variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub location: FieldLocation,
    pub shape: FieldShape,
    pub unit: UnitKind,
}

impl FieldDef {
    pub const fn nodal(name: &'static str, shape: FieldShape, unit: UnitKind) -> Self {
        Self {
            name,
            location: FieldLocation::Node,
            shape,
            unit,
        }
    }

    pub const fn element(name: &'static str, unit: UnitKind) -> Self {
        Self {
            name,
            location: FieldLocation::Element,
            shape: FieldShape::Scalar,
            unit,
        }
    }

    /// Archive key template, e.g. `nodal__u__step{step:06d}`
    pub fn pattern(&self) -> String {
        let prefix = match self.location {
            FieldLocation::Node => "nodal",
            FieldLocation::Element => "elem",
        };
        format!("{prefix}__{}__step{STEP_PLACEHOLDER}", self.name)
    }

    /// Archive key for a global step id
    pub fn key(&self, step: usize) -> String {
        format_pattern(&self.pattern(), step)
    }

    pub fn registry_entry(&self, units: &UnitSystem) -> RegistryEntry {
        let unit = match self.unit {
            UnitKind::Length => units.length.clone(),
            UnitKind::Pressure => units.pressure.clone(),
        };
        RegistryEntry {
            name: self.name.to_string(),
            location: self.location,
            shape: self.shape,
            unit,
            pattern: self.pattern(),
        }
    }
}

/// Instantiate a registry pattern.
///
/// Supports `{step}` and zero-padded `{step:0Nd}` placeholders.
pub fn format_pattern(pattern: &str, step: usize) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;
    while let Some(start) = rest.find("{step") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let spec = &rest[start + "{step".len()..start + len];
        let width = spec
            .strip_prefix(":0")
            .and_then(|s| s.strip_suffix('d'))
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        out.push_str(&format!("{step:0width$}"));
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

/// One archived array in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl FieldArray {
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// `rows × cols` array from row-major data
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(rows * cols, data.len());
        Self {
            shape: vec![rows, cols],
            data,
        }
    }
}

/// Flat mapping from instantiated pattern keys to arrays.
pub type FieldArchive = BTreeMap<String, FieldArray>;

/// Which fields are written at which stage-local steps.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSchedule {
    /// Wanted fields and their write stride
    pub strides: Vec<(FieldDef, usize)>,
    /// Smallest stride among wanted fields
    pub every_n: usize,
    /// Stage-local steps that are solved, ascending
    pub steps: Vec<usize>,
    last_step: usize,
}

impl StageSchedule {
    /// Build the schedule from global and stage output requests.
    ///
    /// `resolve` maps a requested name to the field names it covers. A blank
    /// name applies its stride to every field. When no request names a known
    /// field, every field is written. Returns warnings for ignored requests.
    pub fn build<'r, R>(
        fields: &[FieldDef],
        resolve: R,
        requests: impl IntoIterator<Item = &'r OutputRequest>,
        num_steps: usize,
    ) -> (Self, Vec<String>)
    where
        R: Fn(&str) -> Vec<&'static str>,
    {
        let num_steps = num_steps.max(1);
        let mut warnings = Vec::new();
        let mut named: BTreeSet<&'static str> = BTreeSet::new();
        let mut strides: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut blank_stride: Option<usize> = None;

        for req in requests {
            let name = req.name.trim();
            let stride = if req.every_n >= 1 {
                Some(req.every_n as usize)
            } else {
                warnings.push(format!(
                    "output request '{}' has every_n {} < 1; stride ignored",
                    name, req.every_n
                ));
                None
            };

            if name.is_empty() {
                if let Some(s) = stride {
                    blank_stride = Some(blank_stride.map_or(s, |b| b.min(s)));
                }
                continue;
            }

            let targets: Vec<&'static str> = resolve(name)
                .into_iter()
                .filter(|t| fields.iter().any(|f| f.name == *t))
                .collect();
            if targets.is_empty() {
                warnings.push(format!("ignoring output request for unknown field '{name}'"));
                continue;
            }
            for t in targets {
                named.insert(t);
                if let Some(s) = stride {
                    strides.entry(t).and_modify(|v| *v = (*v).min(s)).or_insert(s);
                }
            }
        }

        let wanted: Vec<FieldDef> = fields
            .iter()
            .filter(|f| named.is_empty() || named.contains(f.name))
            .copied()
            .collect();

        let strides: Vec<(FieldDef, usize)> = wanted
            .into_iter()
            .map(|f| {
                let own = strides.get(f.name).copied();
                let s = match (own, blank_stride) {
                    (Some(a), Some(b)) => a.min(b),
                    (Some(a), None) => a,
                    (None, Some(b)) => b,
                    (None, None) => 1,
                };
                (f, s)
            })
            .collect();

        let last_step = num_steps - 1;
        let mut steps: BTreeSet<usize> = BTreeSet::new();
        for &(_, s) in &strides {
            steps.extend((0..num_steps).step_by(s));
        }
        steps.insert(last_step);

        let every_n = strides.iter().map(|&(_, s)| s).min().unwrap_or(1);

        (
            Self {
                strides,
                every_n,
                steps: steps.into_iter().collect(),
                last_step,
            },
            warnings,
        )
    }

    /// Fields written at stage-local step `step`
    pub fn due(&self, step: usize) -> Vec<FieldDef> {
        self.strides
            .iter()
            .filter(|&&(_, s)| step % s == 0 || step == self.last_step)
            .map(|&(f, _)| f)
            .collect()
    }
}
