// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Interpreter errors.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpError {
    #[error("undefined function `{0}`")]
    UndefinedFunction(String),

    #[error("`{function}` expects {expected} argument{}, got {got}", if *.expected == 1 { "" } else { "s" })]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("index {index} out of bounds for container of length {len}")]
    OutOfBounds { index: i128, len: usize },

    #[error("division by zero; check divisor before dividing")]
    DivisionByZero,

    #[error("invalid container handle")]
    DanglingBuffer,

    #[error("reached an unreachable block in `{0}`")]
    Unreachable(String),

    #[error("step limit of {0} exceeded")]
    StepLimit(u64),
}
