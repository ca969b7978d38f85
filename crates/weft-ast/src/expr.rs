// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression nodes.

use crate::{NodeId, Span, Type};

/// A typed expression. `ty` is the scalar-context type the front-end
/// resolved; the unifier decides whether it is widened.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    Int(i64),
    Real(f64),
    Bool(bool),
    Ident(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Call of a resolved routine. A multi-slot routine may only be called
    /// through `StmtKind::AssignMulti`.
    Call {
        routine: String,
        args: Vec<Expr>,
    },
    /// `c_call name(args)`: opaque foreign leaf.
    CCall {
        name: String,
        args: Vec<Expr>,
    },
    Field {
        object: Box<Expr>,
        field: String,
    },
    /// `c[i]`: one element of a container.
    Index {
        container: Box<Expr>,
        index: Box<Expr>,
    },
    /// `c@`: the current batch of a container inside a range block.
    LaneAt {
        container: Box<Expr>,
    },
    /// `simd e`: broadcast a uniform value to every lane.
    Broadcast(Box<Expr>),
    /// `simd_range{T}`: the lane numbers `[0, W)`.
    LaneIndex,
    /// Explicit reduction over the active lanes.
    Reduce {
        op: ReduceOp,
        operand: Box<Expr>,
    },
    /// Explicit lane select.
    Extract {
        vector: Box<Expr>,
        lane: Box<Expr>,
    },
    /// Numeric conversion to `Expr::ty`.
    Convert(Box<Expr>),
    /// Field-wise construction of a class value.
    Construct {
        class: String,
        args: Vec<Expr>,
    },
    /// `cond ? then_value : else_value`
    Ternary {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// Logical `and`; both operands are evaluated.
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    /// Operators that can fault on a zero divisor.
    pub fn is_division(self) -> bool {
        matches!(self, BinOp::Div | BinOp::Mod)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReduceOp {
    Any,
    All,
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Any => "any",
            ReduceOp::All => "all",
            ReduceOp::Sum => "sum",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
        }
    }
}

impl Expr {
    /// Name of the variable this expression ultimately writes through, for
    /// place expressions (`x`, `x.f`, `x.f.g`).
    pub fn root_var(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Field { object, .. } => object.root_var(),
            _ => None,
        }
    }

    /// Direct subexpressions, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Int(_)
            | ExprKind::Real(_)
            | ExprKind::Bool(_)
            | ExprKind::Ident(_)
            | ExprKind::LaneIndex => Vec::new(),
            ExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Unary { operand, .. } | ExprKind::Reduce { operand, .. } => {
                vec![operand.as_ref()]
            }
            ExprKind::Call { args, .. }
            | ExprKind::CCall { args, .. }
            | ExprKind::Construct { args, .. } => args.iter().collect(),
            ExprKind::Field { object, .. } => vec![object.as_ref()],
            ExprKind::Index { container, index } => vec![container.as_ref(), index.as_ref()],
            ExprKind::LaneAt { container } => vec![container.as_ref()],
            ExprKind::Broadcast(inner) | ExprKind::Convert(inner) => vec![inner.as_ref()],
            ExprKind::Extract { vector, lane } => vec![vector.as_ref(), lane.as_ref()],
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => vec![cond.as_ref(), then_value.as_ref(), else_value.as_ref()],
        }
    }

    /// Visit every subexpression, this one included, children first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        for child in self.children() {
            child.walk(f);
        }
        f(self);
    }
}
