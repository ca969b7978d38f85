// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Analysis commands: check, plan.

use std::path::Path;

use serde::Serialize;
use weft_ast::{Module, RoutineDecl};
use weft_diagnostics::json::DiagnosticReport;
use weft_diagnostics::{Diagnostic, ToDiagnostic};
use weft_simd::{
    analyze_routine, ControlTag, ExitTag, LoweringConfig, RoutineAnalysis, RoutineFailure,
};
use weft_types::{EffectiveType, ModuleFacts, RoutineMode};

use super::{json_report, load_module, print_human, print_json, report};
use crate::config::ConfigArgs;
use crate::error::{CliError, Result};
use crate::{output, Format};

fn variants(routine: &RoutineDecl) -> &'static [RoutineMode] {
    if routine.is_simd {
        &[RoutineMode::Scalar, RoutineMode::Vector]
    } else {
        &[RoutineMode::Scalar]
    }
}

fn mode_name(mode: RoutineMode) -> &'static str {
    match mode {
        RoutineMode::Scalar => "scalar",
        RoutineMode::Vector => "vector",
    }
}

fn select<'m>(module: &'m Module, only: Option<&str>) -> Result<Vec<&'m RoutineDecl>> {
    match only {
        Some(name) => module
            .routine(name)
            .map(|r| vec![r])
            .ok_or_else(|| CliError::UnknownRoutine(name.to_string())),
        None => Ok(module.routines.iter().collect()),
    }
}

/// Analyze every variant of `routine`, stopping at the first failure.
fn analyze_variants(
    module: &Module,
    routine: &RoutineDecl,
    facts: &ModuleFacts,
    config: &LoweringConfig,
) -> std::result::Result<Vec<RoutineAnalysis>, Diagnostic> {
    variants(routine)
        .iter()
        .map(|&mode| {
            analyze_routine(module, routine, mode, facts, config).map_err(|error| {
                RoutineFailure {
                    routine: routine.name.clone(),
                    error,
                }
                .to_diagnostic()
            })
        })
        .collect()
}

// ============================================================================
// check
// ============================================================================

pub fn cmd_check(input: &Path, args: &ConfigArgs, format: Format) -> Result<bool> {
    let module = load_module(input)?;
    let config = args.resolve()?;
    let facts = ModuleFacts::analyze(&module);

    let diagnostics: Vec<Diagnostic> = module
        .routines
        .iter()
        .filter_map(|routine| analyze_variants(&module, routine, &facts, &config).err())
        .collect();

    Ok(report(&module, &diagnostics, "check", format))
}

// ============================================================================
// plan
// ============================================================================

#[derive(Serialize)]
struct PlanReport {
    routines: Vec<RoutinePlan>,
    diagnostics: DiagnosticReport,
}

#[derive(Serialize)]
struct RoutinePlan {
    name: String,
    simd: bool,
    variants: Vec<VariantPlan>,
}

#[derive(Serialize)]
struct VariantPlan {
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lanes: Option<u32>,
    vars: Vec<VarPlan>,
    controls: Vec<ControlPlan>,
    exits: Vec<ExitPlan>,
    promoted: Vec<String>,
    ranges: Vec<RangePlan>,
}

#[derive(Serialize)]
struct VarPlan {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    pinned: bool,
}

#[derive(Serialize)]
struct ControlPlan {
    node: u32,
    kind: &'static str,
    divergent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mask: Option<String>,
}

#[derive(Serialize)]
struct ExitPlan {
    node: u32,
    kind: &'static str,
    retires: bool,
}

#[derive(Serialize)]
struct RangePlan {
    node: u32,
    lanes: u32,
}

impl VariantPlan {
    fn new(analysis: &RoutineAnalysis) -> Self {
        let vars = analysis
            .table
            .vars()
            .map(|(name, info)| VarPlan {
                name: name.to_string(),
                ty: EffectiveType {
                    base: info.ty.clone(),
                    shape: info.shape,
                }
                .to_string(),
                pinned: info.pinned,
            })
            .collect();
        let controls = analysis
            .plan
            .controls()
            .map(|(id, node)| ControlPlan {
                node: id.0,
                kind: node.kind.name(),
                divergent: matches!(node.tag, ControlTag::Divergent(_)),
                mask: match &node.tag {
                    ControlTag::Divergent(mask) => Some(mask.to_string()),
                    ControlTag::Uniform => None,
                },
            })
            .collect();
        let exits = analysis
            .plan
            .exits()
            .map(|(id, exit)| ExitPlan {
                node: id.0,
                kind: exit.kind.name(),
                retires: exit.tag == ExitTag::Retire,
            })
            .collect();
        Self {
            mode: mode_name(analysis.mode),
            lanes: analysis.layout.routine_lanes(),
            vars,
            controls,
            exits,
            promoted: analysis.plan.promoted().map(str::to_string).collect(),
            ranges: analysis
                .layout
                .ranges()
                .map(|(id, lanes)| RangePlan { node: id.0, lanes })
                .collect(),
        }
    }
}

pub fn cmd_plan(input: &Path, only: Option<&str>, args: &ConfigArgs, format: Format) -> Result<bool> {
    let module = load_module(input)?;
    let config = args.resolve()?;
    let facts = ModuleFacts::analyze(&module);

    let mut routines = Vec::new();
    let mut diagnostics = Vec::new();
    for routine in select(&module, only)? {
        match analyze_variants(&module, routine, &facts, &config) {
            Ok(analyses) => routines.push(RoutinePlan {
                name: routine.name.clone(),
                simd: routine.is_simd,
                variants: analyses.iter().map(VariantPlan::new).collect(),
            }),
            Err(diag) => diagnostics.push(diag),
        }
    }

    match format {
        Format::Human => {
            for routine in &routines {
                print_routine_plan(routine);
            }
            print_human(&module, &diagnostics, "plan");
        }
        Format::Json => print_json(&PlanReport {
            routines,
            diagnostics: json_report(&module, &diagnostics, "plan"),
        }),
    }
    Ok(diagnostics.is_empty())
}

fn print_routine_plan(routine: &RoutinePlan) {
    let kind = if routine.simd { "simd routine" } else { "routine" };
    println!("{} {}", output::dim(kind), output::routine_name(&routine.name));
    for variant in &routine.variants {
        match variant.lanes {
            Some(lanes) => println!(
                "  {}",
                output::section_header(&format!("{} variant, {} lanes", variant.mode, lanes))
            ),
            None => println!("  {}", output::section_header(&format!("{} variant", variant.mode))),
        }
        for var in &variant.vars {
            let pinned = if var.pinned { " (pinned)" } else { "" };
            println!("    {}: {}{}", var.name, var.ty, output::dim(pinned));
        }
        for range in &variant.ranges {
            println!("    simd block #{}: {} lanes", range.node, range.lanes);
        }
        for control in &variant.controls {
            match &control.mask {
                Some(mask) => println!(
                    "    {} #{}: divergent under {}",
                    control.kind, control.node, mask
                ),
                None => println!("    {} #{}: uniform", control.kind, control.node),
            }
        }
        for exit in &variant.exits {
            let tag = if exit.retires { "retire" } else { "native" };
            println!("    {} #{}: {}", exit.kind, exit.node, tag);
        }
        if !variant.promoted.is_empty() {
            println!("    promoted: {}", variant.promoted.join(", "));
        }
    }
}
