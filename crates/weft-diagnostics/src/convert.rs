// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Conversions from lowering error types to `Diagnostic`.

use weft_simd::{AbiError, DivergenceError, LayoutError, LoweringError, RoutineFailure};
use weft_types::TypeError;

use crate::{Diagnostic, ToDiagnostic};

// ============================================================================
// Type Errors
// ============================================================================

impl ToDiagnostic for TypeError {
    fn to_diagnostic(&self) -> Diagnostic {
        let span = self.span();
        match self {
            TypeError::NonSimdCall { .. } => Diagnostic::error(self.to_string())
                .with_code("E0900")
                .with_primary(span, "called with per-lane arguments")
                .with_help("declare the routine `simd` or pass uniform arguments"),

            TypeError::VectorInScalarPosition { what, .. } => Diagnostic::error(self.to_string())
                .with_code("E0901")
                .with_primary(span, format!("{} must be uniform", what))
                .with_help("use any/all/sum/min/max or an explicit lane extract"),

            TypeError::LaneAccessOutsideSimd { .. } => Diagnostic::error(self.to_string())
                .with_code("E0902")
                .with_primary(span, "not in vector code"),

            TypeError::NestedSimdBlock { .. } => Diagnostic::error(self.to_string())
                .with_code("E0903")
                .with_primary(span, "already running on every lane"),

            TypeError::NotAContainer { .. } => Diagnostic::error(self.to_string())
                .with_code("E0904")
                .with_primary(span, "expected a `simd{T}` container"),

            TypeError::UnknownRoutine { .. } => Diagnostic::error(self.to_string())
                .with_code("E0905")
                .with_primary(span, "not declared in this module"),

            TypeError::UnknownClass { .. } => Diagnostic::error(self.to_string())
                .with_code("E0906")
                .with_primary(span, "not declared in this module"),

            TypeError::UnknownVariable { .. } => Diagnostic::error(self.to_string())
                .with_code("E0907")
                .with_primary(span, "not found in this routine"),

            TypeError::UnknownField { .. } => Diagnostic::error(self.to_string())
                .with_code("E0908")
                .with_primary(span, "unknown field"),

            TypeError::NotAssignable { .. } => Diagnostic::error(self.to_string())
                .with_code("E0909")
                .with_primary(span, "not a place"),
        }
    }
}

// ============================================================================
// Divergence Errors
// ============================================================================

impl ToDiagnostic for DivergenceError {
    fn to_diagnostic(&self) -> Diagnostic {
        let span = self.span();
        match self {
            DivergenceError::ForeignCallUnderDivergence { .. } => {
                Diagnostic::error(self.to_string())
                    .with_code("E0910")
                    .with_primary(span, "only some lanes reach this call")
                    .with_note("foreign calls cannot be masked")
                    .with_help("move the call out of the per-lane branch")
            }

            DivergenceError::ForeignCallRejected { .. } => Diagnostic::error(self.to_string())
                .with_code("E0911")
                .with_primary(span, "foreign call in vector code")
                .with_note("the foreign call policy is `reject`"),

            DivergenceError::UniformAssignUnderDivergence { .. } => {
                Diagnostic::error(self.to_string())
                    .with_code("E0912")
                    .with_primary(span, "written while only some lanes are active")
            }

            DivergenceError::EscapeFromSimdBlock { .. } => Diagnostic::error(self.to_string())
                .with_code("E0913")
                .with_primary(span, "leaves the simd block"),

            DivergenceError::ExitOutsideLoop { .. } => Diagnostic::error(self.to_string())
                .with_code("E0914")
                .with_primary(span, "no enclosing loop"),
        }
    }
}

// ============================================================================
// Layout Errors
// ============================================================================

impl ToDiagnostic for LayoutError {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        let Some(span) = self.span() else {
            return match self {
                LayoutError::ImplicitCrossing { .. } => diag
                    .with_code("E0926")
                    .with_note("this is a bug in the lowering, not in the routine"),
                _ => diag
                    .with_code("E0927")
                    .with_help("use a nonzero fixed width or register size"),
            };
        };

        match self {
            LayoutError::NotSimdClass { .. } => diag
                .with_code("E0920")
                .with_primary(span, "batched here")
                .with_help("declare it as `simd class`"),

            LayoutError::NotVectorizable { widths, .. } => diag
                .with_code("E0921")
                .with_primary(span, "batched here")
                .with_note(format!("field lane counts: {}", join_widths(widths))),

            LayoutError::NestedAggregate { .. } => diag
                .with_code("E0922")
                .with_primary(span, "batched here"),

            LayoutError::UnknownClass { .. } => diag
                .with_code("E0923")
                .with_primary(span, "not declared in this module"),

            LayoutError::AmbiguousLaneWidth { widths, .. } => diag
                .with_code("E0924")
                .with_primary(span, "different simd lengths used in this simd statement")
                .with_note(format!("lane counts in use: {}", join_widths(widths))),

            LayoutError::LaneWidthMismatch { expected, found, .. } => diag
                .with_code("E0925")
                .with_primary(span, format!("callee runs {} lanes", found))
                .with_note(format!("this code runs {} lanes", expected)),

            LayoutError::ImplicitCrossing { .. } | LayoutError::InvalidPolicy { .. } => diag,
        }
    }
}

fn join_widths(widths: &[u32]) -> String {
    widths
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// ABI Errors
// ============================================================================

impl ToDiagnostic for AbiError {
    fn to_diagnostic(&self) -> Diagnostic {
        let span = self.span();
        match self {
            AbiError::ReturnArity { expected, .. } => Diagnostic::error(self.to_string())
                .with_code("E0930")
                .with_primary(span, format!("expected {} targets", expected)),

            AbiError::ParamArity { expected, .. } => Diagnostic::error(self.to_string())
                .with_code("E0931")
                .with_primary(span, format!("expected {} arguments", expected)),

            AbiError::InoutNotPlace { .. } => Diagnostic::error(self.to_string())
                .with_code("E0932")
                .with_primary(span, "cannot be written back"),

            AbiError::UniformInout { .. } => Diagnostic::error(self.to_string())
                .with_code("E0933")
                .with_primary(span, "declared here")
                .with_help("drop the `scalar` qualifier"),
        }
    }
}

// ============================================================================
// Lowering Errors
// ============================================================================

impl ToDiagnostic for LoweringError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LoweringError::Type(e) => e.to_diagnostic(),
            LoweringError::Divergence(e) => e.to_diagnostic(),
            LoweringError::Layout(e) => e.to_diagnostic(),
            LoweringError::Abi(e) => e.to_diagnostic(),
            LoweringError::Unsupported { span, .. } => Diagnostic::error(self.to_string())
                .with_code("E0939")
                .with_primary(*span, "no vector lowering"),
        }
    }
}

impl ToDiagnostic for RoutineFailure {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = self.error.to_diagnostic();
        if self.routine.is_empty() {
            diag
        } else {
            diag.with_note(format!("while lowering routine `{}`", self.routine))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::ErrorCodeRegistry;
    use weft_ast::Span;
    use weft_simd::LaneWidthPolicy;

    fn code(diag: &Diagnostic) -> &str {
        diag.code.as_ref().map(|c| c.0.as_str()).unwrap_or("")
    }

    #[test]
    fn every_converted_code_is_registered() {
        let span = Span::new(3, 7);
        let errors: Vec<LoweringError> = vec![
            TypeError::NestedSimdBlock { span }.into(),
            DivergenceError::ExitOutsideLoop { what: "break", span }.into(),
            LayoutError::AmbiguousLaneWidth {
                widths: vec![2, 4],
                span,
            }
            .into(),
            LayoutError::InvalidPolicy {
                policy: LaneWidthPolicy::Fixed { lanes: 0 },
            }
            .into(),
            AbiError::InoutNotPlace {
                param: "acc".into(),
                span,
            }
            .into(),
            LoweringError::Unsupported {
                what: "goto".into(),
                span,
            },
        ];
        let registry = ErrorCodeRegistry::default();
        for error in &errors {
            let diag = error.to_diagnostic();
            assert!(registry.get(code(&diag)).is_some(), "{}", error);
        }
    }

    #[test]
    fn foreign_call_points_at_the_call() {
        let err = DivergenceError::ForeignCallUnderDivergence {
            name: "rand".into(),
            span: Span::new(10, 16),
        };
        let diag = err.to_diagnostic();
        assert_eq!(code(&diag), "E0910");
        assert_eq!(diag.primary_span(), Some(Span::new(10, 16)));
        assert!(diag.message.contains("rand"));
        assert!(diag.help.is_some());
    }

    #[test]
    fn spanless_layout_errors_have_no_labels() {
        let err = LayoutError::ImplicitCrossing {
            function: "f.simd4".into(),
            detail: "field of an aos batch".into(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(code(&diag), "E0926");
        assert!(diag.labels.is_empty());
    }

    #[test]
    fn failure_names_the_routine() {
        let failure = RoutineFailure {
            routine: "caller".into(),
            error: LayoutError::LaneWidthMismatch {
                callee: "half".into(),
                expected: 4,
                found: 2,
                span: Span::new(0, 1),
            }
            .into(),
        };
        let diag = failure.to_diagnostic();
        assert_eq!(code(&diag), "E0925");
        assert!(diag.notes.iter().any(|n| n.contains("`caller`")));
    }
}
