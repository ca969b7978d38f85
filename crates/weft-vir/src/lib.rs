// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! VIR (Vector Intermediate Representation) - non-SSA control-flow graph
//! with first-class masks.
//!
//! VIR is what the simd lowering hands to instruction selection. Divergent
//! control has already been flattened into masked straight-line code, and
//! every crossing between array-of-structures and structure-of-arrays
//! storage is an explicit statement.

mod builder;
mod display;
mod function;
mod operand;
mod stmt;
mod types;

pub use builder::BlockBuilder;
pub use function::{BlockId, LocalId, VirBlock, VirFunction, VirLocal};
pub use operand::{BinOp, FunctionRef, ReduceOp, UnaryOp, VirConst, VirOperand, VirRValue};
pub use stmt::{VirStmt, VirTerminator};
pub use types::{AggregateLayout, VirType};
