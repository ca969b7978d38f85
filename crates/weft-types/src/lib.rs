// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type unifier for dual scalar/vector execution.
//!
//! Classifies every expression of a routine as uniform (`T`) or per-lane
//! (`simd{T}`), records the execution context of every statement, and
//! rejects programs that would need an implicit vector-to-scalar collapse.

mod errors;
mod facts;
mod shape;
mod table;
mod unify;

pub use errors::TypeError;
pub use facts::ModuleFacts;
pub use shape::{EffectiveType, ExecContext, RoutineMode, Shape};
pub use table::{CallKind, ContextTable, Region, VarInfo, VarOrigin};
pub use unify::unify_routine;
