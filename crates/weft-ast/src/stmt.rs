// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement nodes.

use crate::{Expr, NodeId, Span, Type};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtKind {
    /// Local declaration; a missing initializer means zero.
    Let {
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    /// `simd{T} c = Nx`
    Container {
        name: String,
        elem: Type,
        len: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    /// `a, b = f(x)`: binds every return slot of a multi-slot call.
    AssignMulti {
        targets: Vec<Expr>,
        call: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// Body runs at least once; exits when `until` holds.
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
    },
    Break,
    Continue,
    /// Return slots carry the results; `return` only ends the routine.
    Return,
    Expr(Expr),
    /// `simd[lo, hi]:` / `simd i: lo, hi`
    SimdRange {
        index: Option<String>,
        lo: Expr,
        hi: Expr,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    /// Expressions evaluated directly by this statement (not nested bodies).
    pub fn exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Let { init, .. } => init.iter().collect(),
            StmtKind::Container { len, .. } => vec![len],
            StmtKind::Assign { target, value } => vec![target, value],
            StmtKind::AssignMulti { targets, call } => {
                let mut out: Vec<&Expr> = targets.iter().collect();
                out.push(call);
                out
            }
            StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => vec![cond],
            StmtKind::Repeat { until, .. } => vec![until],
            StmtKind::Expr(e) => vec![e],
            StmtKind::SimdRange { lo, hi, .. } => vec![lo, hi],
            StmtKind::Break | StmtKind::Continue | StmtKind::Return => Vec::new(),
        }
    }

    /// Nested statement lists, in source order.
    pub fn bodies(&self) -> Vec<&[Stmt]> {
        match &self.kind {
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => vec![then_body.as_slice(), else_body.as_slice()],
            StmtKind::While { body, .. }
            | StmtKind::Repeat { body, .. }
            | StmtKind::SimdRange { body, .. } => vec![body.as_slice()],
            _ => Vec::new(),
        }
    }
}
