//! Stage load and boundary-condition accumulation.
//!
//! Stages are processed in order. For the active stage `i` at ramp factor
//! `f ∈ (0, 1]`:
//!
//! - fixed DOFs come from every BC of stages `0..=i`, later entries
//!   overwriting earlier ones per individual DOF component;
//! - the load vector is `F_body + Σ_{j<i} L_j + f·L_i`, where `L_j` is the
//!   full-magnitude load of stage `j`.
//!
//! Each `L_j` is computed once, and every step rebuilds `F` from scratch, so
//! a step's field is the exact solution for the cumulative boundary state.

use crate::assembly::{Assembler, GlobalSystem};
use crate::contract::StageSpec;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::physics::{LoadKind, Physics};
use log::warn;
use nalgebra::DVector;
use std::collections::BTreeMap;

/// A load with its edge set resolved
#[derive(Debug, Clone, PartialEq)]
enum ResolvedLoad {
    Gravity([f64; 2]),
    Edge {
        edges: Vec<[usize; 2]>,
        value: Vec<f64>,
    },
}

/// One stage with payloads parsed and sets resolved.
#[derive(Debug, Clone)]
pub struct PlannedStage {
    pub label: String,
    pub num_steps: usize,
    pub dt: f64,
    /// `(dof, value)` in declaration order
    pub prescribed: Vec<(usize, f64)>,
    loads: Vec<ResolvedLoad>,
}

/// Parsed stage list plus the warnings raised while reading it.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub stages: Vec<PlannedStage>,
    pub warnings: Vec<String>,
}

impl StagePlan {
    /// Parse and resolve every stage up front so malformed payloads and
    /// missing sets fail before assembly.
    pub fn new<P: Physics>(physics: &P, mesh: &Mesh, specs: &[StageSpec]) -> Result<Self> {
        let caps = P::capabilities();
        let mut warnings = Vec::new();
        let mut stages = Vec::with_capacity(specs.len());

        for (si, spec) in specs.iter().enumerate() {
            let label = spec.label(si);

            if let Some(at) = spec.analysis_type.as_deref()
                && !at.is_empty()
                && !caps.supports_analysis_type(at)
            {
                warnings.push(format!(
                    "stage '{label}': analysis_type '{at}' is not supported by {}, solving as {}",
                    P::NAME,
                    caps.analysis_types.join("|")
                ));
            }

            let mut prescribed = Vec::new();
            for bc in &spec.bcs {
                match physics.parse_constraint(bc)? {
                    Some(constraint) => {
                        let nodes = mesh.sets.nodes(&constraint.set)?;
                        for &(component, value) in &constraint.components {
                            for &n in &nodes {
                                prescribed.push((n * P::DOFS_PER_NODE + component, value));
                            }
                        }
                    }
                    None => warnings.push(format!(
                        "stage '{label}': ignoring unsupported bc type '{}'",
                        bc.kind
                    )),
                }
            }

            let mut loads = Vec::new();
            for load in &spec.loads {
                match physics.parse_load(load)? {
                    Some(LoadKind::Gravity(g)) => loads.push(ResolvedLoad::Gravity(g)),
                    Some(LoadKind::Edge { set, value }) => loads.push(ResolvedLoad::Edge {
                        edges: mesh.sets.edges(&set)?.to_vec(),
                        value,
                    }),
                    None => warnings.push(format!(
                        "stage '{label}': ignoring unsupported load type '{}'",
                        load.kind
                    )),
                }
            }

            stages.push(PlannedStage {
                label,
                num_steps: spec.steps(),
                dt: spec.time_step(),
                prescribed,
                loads,
            });
        }

        for w in &warnings {
            warn!("{w}");
        }
        Ok(Self { stages, warnings })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Prescribed DOF values in effect during stage `current`.
    pub fn fixed_dofs(&self, current: usize) -> BTreeMap<usize, f64> {
        let mut fixed = BTreeMap::new();
        for stage in self.stages.iter().take(current + 1) {
            for &(dof, value) in &stage.prescribed {
                fixed.insert(dof, value);
            }
        }
        fixed
    }

    /// Full-magnitude load vector of every stage.
    ///
    /// A gravity load contributes `ρ·(g_stage − g_model)`, so a zero gravity
    /// override cancels the model gravity rather than being skipped.
    pub fn stage_loads<P: Physics>(
        &self,
        assembler: &Assembler<'_, P>,
        model_gravity: [f64; 2],
    ) -> Result<Vec<DVector<f64>>> {
        self.stages
            .iter()
            .map(|stage| {
                let mut total = DVector::zeros(assembler.num_dofs());
                for load in &stage.loads {
                    match load {
                        ResolvedLoad::Gravity(g) => {
                            let delta = [g[0] - model_gravity[0], g[1] - model_gravity[1]];
                            if delta != [0.0, 0.0] {
                                total += assembler.body_load(delta)?;
                            }
                        }
                        ResolvedLoad::Edge { edges, value } => {
                            total += assembler.edge_load(edges, value);
                        }
                    }
                }
                Ok(total)
            })
            .collect()
    }
}

/// Combines the body force with per-stage load vectors.
#[derive(Debug, Clone)]
pub struct LoadAccumulator {
    body_force: DVector<f64>,
    stage_loads: Vec<DVector<f64>>,
}

impl LoadAccumulator {
    pub fn new(system: &GlobalSystem, stage_loads: Vec<DVector<f64>>) -> Self {
        Self {
            body_force: system.body_force.clone(),
            stage_loads,
        }
    }

    /// `F_body + Σ_{j<current} L_j + ramp·L_current`
    pub fn load_vector(&self, current: usize, ramp: f64) -> DVector<f64> {
        let mut f = self.body_force.clone();
        for (j, l) in self.stage_loads.iter().enumerate().take(current + 1) {
            if j < current {
                f += l;
            } else {
                f += l * ramp;
            }
        }
        f
    }
}

/// Ramp factor of stage-local step `step` out of `num_steps`.
pub fn ramp_factor(step: usize, num_steps: usize) -> f64 {
    (step + 1) as f64 / num_steps.max(1) as f64
}
