// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Unifier error types.

use weft_ast::Span;

/// A scalar/vector context mismatch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("routine `{routine}` is not `simd` and cannot run on per-lane values")]
    NonSimdCall { routine: String, span: Span },
    #[error("per-lane value used as {what}; reduce it or select a lane first")]
    VectorInScalarPosition { what: String, span: Span },
    #[error("{what} is only available inside vector code")]
    LaneAccessOutsideSimd { what: String, span: Span },
    #[error("simd block nested inside vector code")]
    NestedSimdBlock { span: Span },
    #[error("`{name}` is not a container")]
    NotAContainer { name: String, span: Span },
    #[error("unknown routine `{name}`")]
    UnknownRoutine { name: String, span: Span },
    #[error("unknown class `{name}`")]
    UnknownClass { name: String, span: Span },
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String, span: Span },
    #[error("class `{class}` has no field `{field}`")]
    UnknownField {
        class: String,
        field: String,
        span: Span,
    },
    #[error("expression cannot be assigned to")]
    NotAssignable { span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::NonSimdCall { span, .. }
            | TypeError::VectorInScalarPosition { span, .. }
            | TypeError::LaneAccessOutsideSimd { span, .. }
            | TypeError::NestedSimdBlock { span }
            | TypeError::NotAContainer { span, .. }
            | TypeError::UnknownRoutine { span, .. }
            | TypeError::UnknownClass { span, .. }
            | TypeError::UnknownVariable { span, .. }
            | TypeError::UnknownField { span, .. }
            | TypeError::NotAssignable { span } => *span,
        }
    }
}
