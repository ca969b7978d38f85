// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Subcommand implementations. Each returns `Ok(false)` when it reported
//! lowering errors and `Err` when it could not run at all.

mod analysis;
mod lower;
mod tools;

pub use analysis::{cmd_check, cmd_plan};
pub use lower::cmd_lower;
pub use tools::cmd_explain;

use std::fs;
use std::path::Path;

use weft_ast::Module;
use weft_diagnostics::formatter::DiagnosticFormatter;
use weft_diagnostics::json::{to_json_report, DiagnosticReport};
use weft_diagnostics::Diagnostic;

use crate::error::{CliError, Result};
use crate::{output, Format};

/// Read a typed AST. The file name fills in `Module::file` when the front-end
/// left it out.
pub(crate) fn load_module(path: &Path) -> Result<Module> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut module: Module = serde_json::from_str(&text).map_err(|source| CliError::Module {
        path: path.to_path_buf(),
        source,
    })?;
    if module.file.is_none() {
        module.file = Some(path.display().to_string());
    }
    tracing::debug!(
        target: "weft::cli",
        file = %path.display(),
        classes = module.classes.len(),
        routines = module.routines.len(),
        "module loaded"
    );
    Ok(module)
}

fn file_name(module: &Module) -> &str {
    module.file.as_deref().unwrap_or("<input>")
}

fn source(module: &Module) -> &str {
    module.source.as_deref().unwrap_or("")
}

pub(crate) fn json_report(module: &Module, diagnostics: &[Diagnostic], phase: &str) -> DiagnosticReport {
    to_json_report(diagnostics, source(module), file_name(module), phase)
}

/// Print diagnostics to stderr, followed by the phase banner.
pub(crate) fn print_human(module: &Module, diagnostics: &[Diagnostic], phase: &str) {
    let formatter = DiagnosticFormatter::new(source(module)).with_file_name(file_name(module));
    for diag in diagnostics {
        eprintln!("{}", formatter.format(diag));
    }
    if diagnostics.is_empty() {
        println!("{}", output::banner_ok(phase));
    } else {
        eprintln!("{}", output::banner_fail(phase, diagnostics.len()));
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{}: {}", output::error_label(), e),
    }
}

pub(crate) fn report(module: &Module, diagnostics: &[Diagnostic], phase: &str, format: Format) -> bool {
    match format {
        Format::Human => print_human(module, diagnostics, phase),
        Format::Json => print_json(&json_report(module, diagnostics, phase)),
    }
    diagnostics.is_empty()
}
