// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Typed syntax tree consumed by the simd lowering pipeline.
//!
//! The front-end hands over a fully type-checked module: every expression
//! carries its resolved type, overloads are resolved to routine names, and
//! `simd` qualifiers are kept exactly as written on classes, routines and
//! range statements.

pub mod build;
pub mod decl;
pub mod expr;
pub mod span;
pub mod stmt;
pub mod types;

pub use decl::{ClassDecl, FieldDecl, Module, Param, ParamMode, ReturnSlot, RoutineDecl};
pub use expr::{BinOp, Expr, ExprKind, ReduceOp, UnaryOp};
pub use span::{LineMap, Span};
pub use stmt::{Stmt, StmtKind};
pub use types::{ScalarKind, Type};

/// Unique identifier for AST nodes.
///
/// Analysis passes key their side tables by node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
