// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `weft lower`: run the whole pipeline and print the vector IR.

use std::fs;
use std::path::Path;

use serde::Serialize;
use weft_diagnostics::formatter::DiagnosticFormatter;
use weft_diagnostics::json::DiagnosticReport;
use weft_diagnostics::{Diagnostic, ToDiagnostic};
use weft_simd::{lower_module, RoutineOutput};

use super::{file_name, json_report, load_module, print_json, source};
use crate::config::ConfigArgs;
use crate::error::{CliError, Result};
use crate::{output, Format};

#[derive(Serialize)]
struct LowerReport {
    functions: Vec<LoweredFunction>,
    diagnostics: DiagnosticReport,
}

#[derive(Serialize)]
struct LoweredFunction {
    name: String,
    routine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lanes: Option<u32>,
    text: String,
}

pub fn cmd_lower(
    input: &Path,
    only: Option<&str>,
    out_path: Option<&Path>,
    args: &ConfigArgs,
    format: Format,
) -> Result<bool> {
    let module = load_module(input)?;
    let config = args.resolve()?;
    if let Some(name) = only {
        if module.routine(name).is_none() {
            return Err(CliError::UnknownRoutine(name.to_string()));
        }
    }

    // Everything is lowered so calls into other routines still verify.
    let lowered = lower_module(&module, &config);
    let selected: Vec<&RoutineOutput> = lowered
        .routines
        .iter()
        .filter(|r| only.map_or(true, |name| r.routine == name))
        .collect();
    let diagnostics: Vec<Diagnostic> = lowered
        .failures
        .iter()
        .filter(|f| only.map_or(true, |name| f.routine == name || f.routine.is_empty()))
        .map(ToDiagnostic::to_diagnostic)
        .collect();
    let ok = diagnostics.is_empty();

    match format {
        Format::Human => {
            let text = selected
                .iter()
                .copied()
                .flat_map(|r| r.functions())
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            match out_path {
                Some(path) => {
                    fs::write(path, &text).map_err(|source| CliError::Write {
                        path: path.to_path_buf(),
                        source,
                    })?;
                    if ok {
                        println!(
                            "{} {}",
                            output::banner_ok("lower"),
                            output::file_path(&path.display().to_string())
                        );
                    }
                }
                None => print!("{}", text),
            }
            if !ok {
                let formatter =
                    DiagnosticFormatter::new(source(&module)).with_file_name(file_name(&module));
                eprintln!("{}", formatter.format_all(&diagnostics));
                eprintln!("{}", output::banner_fail("lower", diagnostics.len()));
            }
        }
        Format::Json => {
            let functions = selected
                .iter()
                .copied()
                .flat_map(|r| {
                    r.functions().map(move |f| LoweredFunction {
                        name: f.name.clone(),
                        routine: r.routine.clone(),
                        lanes: r.lanes.filter(|_| f.name != r.routine),
                        text: f.to_string(),
                    })
                })
                .collect();
            let report = LowerReport {
                functions,
                diagnostics: json_report(&module, &diagnostics, "lower"),
            };
            match out_path {
                Some(path) => {
                    let text = serde_json::to_string_pretty(&report).unwrap_or_default();
                    fs::write(path, text).map_err(|source| CliError::Write {
                        path: path.to_path_buf(),
                        source,
                    })?;
                }
                None => print_json(&report),
            }
        }
    }

    tracing::info!(
        target: "pipeline",
        stage = "cli.lower",
        status = if ok { "ok" } else { "error" },
        functions = selected.iter().map(|r| r.functions().count()).sum::<usize>(),
        failed = diagnostics.len()
    );
    Ok(ok)
}
