// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lowering errors.

use weft_ast::Span;
use weft_types::TypeError;

use crate::LaneWidthPolicy;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DivergenceError {
    #[error("`c_call {name}` under per-lane control cannot be masked")]
    ForeignCallUnderDivergence { name: String, span: Span },
    #[error("`c_call {name}` is not allowed in vector code")]
    ForeignCallRejected { name: String, span: Span },
    #[error("uniform variable `{name}` is assigned under per-lane control")]
    UniformAssignUnderDivergence { name: String, span: Span },
    #[error("`{what}` cannot leave a simd block")]
    EscapeFromSimdBlock { what: &'static str, span: Span },
    #[error("`{what}` outside of a loop")]
    ExitOutsideLoop { what: &'static str, span: Span },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("class `{class}` is not declared `simd class`")]
    NotSimdClass { class: String, span: Span },
    #[error("class `{class}` cannot be batched: its fields need {widths:?} lanes")]
    NotVectorizable {
        class: String,
        widths: Vec<u32>,
        span: Span,
    },
    #[error("field `{field}` of class `{class}` is not a primitive")]
    NestedAggregate {
        class: String,
        field: String,
        span: Span,
    },
    #[error("unknown class `{class}`")]
    UnknownClass { class: String, span: Span },
    #[error("different simd lengths in one vector body: {widths:?}")]
    AmbiguousLaneWidth { widths: Vec<u32>, span: Span },
    #[error("`{callee}` runs {found} lanes, the caller runs {expected}")]
    LaneWidthMismatch {
        callee: String,
        expected: u32,
        found: u32,
        span: Span,
    },
    #[error("in `{function}`: {detail}")]
    ImplicitCrossing { function: String, detail: String },
    #[error("lane width policy {policy:?} yields no lanes")]
    InvalidPolicy { policy: LaneWidthPolicy },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbiError {
    #[error("`{callee}` has {expected} return slots but the call binds {found}")]
    ReturnArity {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("`{callee}` takes {expected} arguments, found {found}")]
    ParamArity {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("argument for `inout` parameter `{param}` is not assignable")]
    InoutNotPlace { param: String, span: Span },
    #[error("`inout` parameter `{param}` of a simd routine cannot be `scalar`")]
    UniformInout { param: String, span: Span },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoweringError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Divergence(#[from] DivergenceError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Abi(#[from] AbiError),
    #[error("{what} cannot be lowered")]
    Unsupported { what: String, span: Span },
}

impl DivergenceError {
    pub fn span(&self) -> Span {
        match self {
            DivergenceError::ForeignCallUnderDivergence { span, .. }
            | DivergenceError::ForeignCallRejected { span, .. }
            | DivergenceError::UniformAssignUnderDivergence { span, .. }
            | DivergenceError::EscapeFromSimdBlock { span, .. }
            | DivergenceError::ExitOutsideLoop { span, .. } => *span,
        }
    }
}

impl LayoutError {
    /// Source location, when the error is tied to one.
    pub fn span(&self) -> Option<Span> {
        match self {
            LayoutError::NotSimdClass { span, .. }
            | LayoutError::NotVectorizable { span, .. }
            | LayoutError::NestedAggregate { span, .. }
            | LayoutError::UnknownClass { span, .. }
            | LayoutError::AmbiguousLaneWidth { span, .. }
            | LayoutError::LaneWidthMismatch { span, .. } => Some(*span),
            LayoutError::ImplicitCrossing { .. } | LayoutError::InvalidPolicy { .. } => None,
        }
    }
}

impl AbiError {
    pub fn span(&self) -> Span {
        match self {
            AbiError::ReturnArity { span, .. }
            | AbiError::ParamArity { span, .. }
            | AbiError::InoutNotPlace { span, .. }
            | AbiError::UniformInout { span, .. } => *span,
        }
    }
}

impl LoweringError {
    pub fn span(&self) -> Option<Span> {
        match self {
            LoweringError::Type(e) => Some(e.span()),
            LoweringError::Divergence(e) => Some(e.span()),
            LoweringError::Layout(e) => e.span(),
            LoweringError::Abi(e) => Some(e.span()),
            LoweringError::Unsupported { span, .. } => Some(*span),
        }
    }
}
