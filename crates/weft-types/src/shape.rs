// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Value shapes and execution contexts.

use std::fmt;

use weft_ast::Type;

/// Whether a value is the same on every lane or varies per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    Scalar,
    Vector,
}

impl Shape {
    pub fn join(self, other: Shape) -> Shape {
        self.max(other)
    }

    pub fn is_vector(self) -> bool {
        self == Shape::Vector
    }
}

/// Context a statement executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecContext {
    /// Ordinary code operating on one instance.
    Scalar,
    /// Code executed for every active lane of a batch.
    Vector,
}

/// Which variant of a routine is being unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineMode {
    /// The scalar twin: only `simd` range bodies run in vector context.
    Scalar,
    /// The vector variant of a `simd` routine: the whole body is vector code.
    Vector,
}

/// `T` or `simd{T}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectiveType {
    pub base: Type,
    pub shape: Shape,
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Shape::Scalar => write!(f, "{}", self.base),
            Shape::Vector => write!(f, "simd{{{}}}", self.base),
        }
    }
}

impl fmt::Display for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecContext::Scalar => write!(f, "scalar"),
            ExecContext::Vector => write!(f, "vector"),
        }
    }
}
