// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON diagnostic output for machine consumption.
//!
//! Use `--format json` with any weft command to get this output.

use serde::Serialize;
use weft_ast::{LineMap, Span};

use crate::codes::ErrorCodeRegistry;
use crate::{Diagnostic, LabelStyle};

/// All diagnostics of one run over one input.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    /// Schema version.
    pub version: u32,
    pub file: String,
    /// No errors were reported.
    pub success: bool,
    /// The command that produced these diagnostics (`check`, `lower`, ...).
    pub phase: String,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub error_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Phase category of the code ("Type", "Divergence", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub labels: Vec<JsonLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// Primary location. Line and column are only known when the input
/// carried its source text.
#[derive(Debug, Serialize)]
pub struct SourceLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub byte_offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JsonLabel {
    /// "primary" or "secondary".
    pub role: LabelStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub start: usize,
    pub end: usize,
}

/// Convert diagnostics to a structured JSON report. `source` may be empty.
pub fn to_json_report(
    diagnostics: &[Diagnostic],
    source: &str,
    file: &str,
    phase: &str,
) -> DiagnosticReport {
    let registry = ErrorCodeRegistry::default();
    let line_map = (!source.is_empty()).then(|| LineMap::new(source));

    let json_diags: Vec<JsonDiagnostic> = diagnostics
        .iter()
        .map(|d| to_json_diagnostic(d, source, line_map.as_ref(), &registry))
        .collect();
    let error_count = diagnostics.len();

    DiagnosticReport {
        version: 1,
        file: file.to_string(),
        success: error_count == 0,
        phase: phase.to_string(),
        diagnostics: json_diags,
        error_count,
    }
}

fn to_json_diagnostic(
    diag: &Diagnostic,
    source: &str,
    line_map: Option<&LineMap>,
    registry: &ErrorCodeRegistry,
) -> JsonDiagnostic {
    let code = diag.code.as_ref().map(|c| c.0.clone());
    let category = code
        .as_deref()
        .and_then(|c| registry.get(c))
        .map(|info| info.category.to_string());

    JsonDiagnostic {
        code,
        category,
        message: diag.message.clone(),
        location: diag
            .primary_span()
            .map(|span| locate(span, source, line_map)),
        labels: diag
            .labels
            .iter()
            .map(|l| JsonLabel {
                role: l.style,
                message: l.message.clone(),
                start: l.span.start,
                end: l.span.end,
            })
            .collect(),
        notes: diag.notes.clone(),
        help: diag.help.as_ref().map(|h| h.message.clone()),
    }
}

fn locate(span: Span, source: &str, line_map: Option<&LineMap>) -> SourceLocation {
    let Some(map) = line_map else {
        return SourceLocation {
            line: None,
            column: None,
            byte_offset: span.start,
            source_line: None,
        };
    };
    let (line, col) = map.offset_to_line_col(span.start.min(source.len()));
    SourceLocation {
        line: Some(line as usize),
        column: Some(col as usize),
        byte_offset: span.start,
        source_line: map.line_text(source, line).map(str::to_string),
    }
}

/// Serialize a diagnostic report to pretty JSON.
pub fn to_json_string(report: &DiagnosticReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
