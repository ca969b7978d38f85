// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-routine and per-module lowering entry points.

use std::time::Instant;

use rayon::prelude::*;
use weft_ast::{Module, RoutineDecl};
use weft_types::{ContextTable, ModuleFacts, RoutineMode};
use weft_vir::VirFunction;

use crate::divergence::{self, DivergencePlan};
use crate::layout::{self, LayoutPlan};
use crate::lower::{lower_variant, RoutineCx};
use crate::{abi, LoweringConfig, LoweringError};

/// Everything the analyses decided about one routine variant.
#[derive(Debug, Clone)]
pub struct RoutineAnalysis {
    pub mode: RoutineMode,
    pub table: ContextTable,
    pub plan: DivergencePlan,
    pub layout: LayoutPlan,
}

/// Run the unifier, divergence analysis and layout planner for one variant.
pub fn analyze_routine(
    module: &Module,
    routine: &RoutineDecl,
    mode: RoutineMode,
    facts: &ModuleFacts,
    config: &LoweringConfig,
) -> Result<RoutineAnalysis, LoweringError> {
    config.validate()?;
    abi::check_declaration(routine)?;
    abi::check_call_sites(module, routine)?;
    let (table, plan) = divergence::analyze(module, routine, mode, facts, config)?;
    let layout = layout::plan_layout(module, routine, &table, config.lane_width)?;
    Ok(RoutineAnalysis {
        mode,
        table,
        plan,
        layout,
    })
}

#[derive(Debug, Clone)]
pub struct RoutineOutput {
    pub routine: String,
    pub scalar: VirFunction,
    /// `name.simd<W>`, for `simd` routines.
    pub vector: Option<VirFunction>,
    /// `name.simd<W>.aos`, when classes cross the vector boundary.
    pub aos_entry: Option<VirFunction>,
    pub lanes: Option<u32>,
}

impl RoutineOutput {
    pub fn functions(&self) -> impl Iterator<Item = &VirFunction> {
        std::iter::once(&self.scalar)
            .chain(self.vector.iter())
            .chain(self.aos_entry.iter())
    }
}

#[derive(Debug, Clone)]
pub struct RoutineFailure {
    pub routine: String,
    pub error: LoweringError,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleOutput {
    pub routines: Vec<RoutineOutput>,
    pub failures: Vec<RoutineFailure>,
}

impl ModuleOutput {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &VirFunction> {
        self.routines.iter().flat_map(RoutineOutput::functions)
    }

    pub fn function(&self, name: &str) -> Option<&VirFunction> {
        self.functions().find(|f| f.name == name)
    }

    /// Check every routine's calls against the whole module. A routine with
    /// an implicit layout crossing moves from `routines` to `failures`.
    pub fn verify_layouts(&mut self) {
        let failed: Vec<RoutineFailure> = {
            let all: Vec<&VirFunction> = self.functions().collect();
            self.routines
                .iter()
                .filter_map(|routine| {
                    let own: Vec<&VirFunction> = routine.functions().collect();
                    let error = layout::verify_calls_into(&own, &all).err()?;
                    Some(RoutineFailure {
                        routine: routine.routine.clone(),
                        error: error.into(),
                    })
                })
                .collect()
        };
        for failure in &failed {
            tracing::warn!(
                target: "pipeline",
                stage = "simd.verify.layout",
                status = "error",
                routine = %failure.routine,
                error = %failure.error
            );
        }
        self.routines.retain(|r| !failed.iter().any(|f| f.routine == r.routine));
        self.failures.extend(failed);
    }
}

/// Lower both variants of one routine.
pub fn lower_routine(
    module: &Module,
    routine: &RoutineDecl,
    facts: &ModuleFacts,
    config: &LoweringConfig,
) -> Result<RoutineOutput, LoweringError> {
    let start = Instant::now();
    let cx = RoutineCx {
        module,
        routine,
        facts,
        config,
    };

    let scalar_analysis = analyze_routine(module, routine, RoutineMode::Scalar, facts, config)?;
    let scalar = lower_variant(&cx, &scalar_analysis)?;
    let mut output = RoutineOutput {
        routine: routine.name.clone(),
        scalar,
        vector: None,
        aos_entry: None,
        lanes: None,
    };

    if routine.is_simd {
        let analysis = analyze_routine(module, routine, RoutineMode::Vector, facts, config)?;
        let lanes = analysis.layout.routine_lanes();
        tracing::debug!(
            target: "weft::simd",
            routine = %routine.name,
            lanes = lanes.unwrap_or(0),
            promoted = analysis.plan.promoted().count(),
            "vector variant planned"
        );
        output.vector = Some(lower_variant(&cx, &analysis)?);
        if let (true, Some(lanes)) = (config.emit_aos_entry, lanes) {
            output.aos_entry = abi::emit_aos_entry(module, routine, lanes)?;
        }
        output.lanes = lanes;
    }

    if config.verify {
        let functions: Vec<&VirFunction> = output.functions().collect();
        layout::verify_layouts(&functions)?;
    }

    tracing::info!(
        target: "pipeline",
        stage = "simd.lower.routine",
        status = "ok",
        routine = %routine.name,
        lanes = output.lanes.unwrap_or(0),
        functions = output.functions().count(),
        elapsed_ms = start.elapsed().as_millis() as u64
    );
    Ok(output)
}

/// Lower every routine of `module` in parallel. A routine that fails does
/// not stop the others; its error is collected in `failures`.
pub fn lower_module(module: &Module, config: &LoweringConfig) -> ModuleOutput {
    let start = Instant::now();
    let facts = ModuleFacts::analyze(module);
    let results: Vec<(String, Result<RoutineOutput, LoweringError>)> = module
        .routines
        .par_iter()
        .map(|routine| {
            (
                routine.name.clone(),
                lower_routine(module, routine, &facts, config),
            )
        })
        .collect();

    let mut output = ModuleOutput::default();
    for (routine, result) in results {
        match result {
            Ok(lowered) => output.routines.push(lowered),
            Err(error) => {
                tracing::warn!(
                    target: "pipeline",
                    stage = "simd.lower.routine",
                    status = "error",
                    routine = %routine,
                    error = %error
                );
                output.failures.push(RoutineFailure { routine, error });
            }
        }
    }

    // Calls between routines are only checkable once every callee exists.
    if config.verify {
        output.verify_layouts();
    }

    tracing::info!(
        target: "pipeline",
        stage = "simd.lower.module",
        status = if output.is_ok() { "ok" } else { "error" },
        routines = module.routines.len(),
        failed = output.failures.len(),
        elapsed_ms = start.elapsed().as_millis() as u64
    );
    output
}
