// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Programmatic construction of typed trees.
//!
//! Tools that sit behind a real front-end never need this; tests and the
//! JSON fixtures of the CLI do. Every node gets a fresh id and a distinct
//! synthetic span so side tables and diagnostics stay unambiguous.

use crate::{
    BinOp, ClassDecl, Expr, ExprKind, FieldDecl, NodeId, Param, ParamMode, ReduceOp, ReturnSlot,
    RoutineDecl, Span, Stmt, StmtKind, Type, UnaryOp,
};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    offset: usize,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn span(&mut self) -> Span {
        let start = self.offset;
        self.offset += 1;
        Span::new(start, start + 1)
    }

    pub fn expr(&mut self, kind: ExprKind, ty: Type) -> Expr {
        Expr {
            id: self.id(),
            kind,
            ty,
            span: self.span(),
        }
    }

    pub fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.id(),
            kind,
            span: self.span(),
        }
    }

    // ── Expressions ────────────────────────────────────────────────

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Int(value), Type::int())
    }

    pub fn int_of(&mut self, value: i64, ty: Type) -> Expr {
        self.expr(ExprKind::Int(value), ty)
    }

    pub fn real(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Real(value), Type::real())
    }

    pub fn boolean(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Bool(value), Type::bool())
    }

    pub fn var(&mut self, name: &str, ty: Type) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()), ty)
    }

    /// Comparisons and logical operators produce `bool`; everything else
    /// keeps the left operand's type.
    pub fn binary(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        let ty = if op.is_comparison() || matches!(op, BinOp::And | BinOp::Or) {
            Type::bool()
        } else {
            left.ty.clone()
        };
        self.expr(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = operand.ty.clone();
        self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn call(&mut self, routine: &str, args: Vec<Expr>, ty: Type) -> Expr {
        self.expr(
            ExprKind::Call {
                routine: routine.to_string(),
                args,
            },
            ty,
        )
    }

    pub fn c_call(&mut self, name: &str, args: Vec<Expr>, ty: Type) -> Expr {
        self.expr(
            ExprKind::CCall {
                name: name.to_string(),
                args,
            },
            ty,
        )
    }

    pub fn field(&mut self, object: Expr, field: &str, ty: Type) -> Expr {
        self.expr(
            ExprKind::Field {
                object: Box::new(object),
                field: field.to_string(),
            },
            ty,
        )
    }

    pub fn index(&mut self, container: Expr, index: Expr) -> Expr {
        let ty = element_type(&container.ty);
        self.expr(
            ExprKind::Index {
                container: Box::new(container),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn lane_at(&mut self, container: Expr) -> Expr {
        let ty = element_type(&container.ty);
        self.expr(
            ExprKind::LaneAt {
                container: Box::new(container),
            },
            ty,
        )
    }

    pub fn broadcast(&mut self, value: Expr) -> Expr {
        let ty = value.ty.clone();
        self.expr(ExprKind::Broadcast(Box::new(value)), ty)
    }

    pub fn lane_index(&mut self, ty: Type) -> Expr {
        self.expr(ExprKind::LaneIndex, ty)
    }

    pub fn reduce(&mut self, op: ReduceOp, operand: Expr) -> Expr {
        let ty = match op {
            ReduceOp::Any | ReduceOp::All => Type::bool(),
            _ => operand.ty.clone(),
        };
        self.expr(
            ExprKind::Reduce {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn extract(&mut self, vector: Expr, lane: Expr) -> Expr {
        let ty = vector.ty.clone();
        self.expr(
            ExprKind::Extract {
                vector: Box::new(vector),
                lane: Box::new(lane),
            },
            ty,
        )
    }

    pub fn convert(&mut self, value: Expr, to: Type) -> Expr {
        self.expr(ExprKind::Convert(Box::new(value)), to)
    }

    pub fn construct(&mut self, class: &str, args: Vec<Expr>) -> Expr {
        self.expr(
            ExprKind::Construct {
                class: class.to_string(),
                args,
            },
            Type::class(class),
        )
    }

    pub fn ternary(&mut self, cond: Expr, then_value: Expr, else_value: Expr) -> Expr {
        let ty = then_value.ty.clone();
        self.expr(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
            },
            ty,
        )
    }

    // ── Statements ─────────────────────────────────────────────────

    pub fn let_(&mut self, name: &str, ty: Type, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Let {
            name: name.to_string(),
            ty,
            init,
        })
    }

    pub fn container(&mut self, name: &str, elem: Type, len: Expr) -> Stmt {
        self.stmt(StmtKind::Container {
            name: name.to_string(),
            elem,
            len,
        })
    }

    pub fn assign(&mut self, target: Expr, value: Expr) -> Stmt {
        self.stmt(StmtKind::Assign { target, value })
    }

    pub fn assign_multi(&mut self, targets: Vec<Expr>, call: Expr) -> Stmt {
        self.stmt(StmtKind::AssignMulti { targets, call })
    }

    pub fn if_(&mut self, cond: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            cond,
            then_body,
            else_body,
        })
    }

    pub fn while_(&mut self, cond: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While { cond, body })
    }

    pub fn repeat(&mut self, body: Vec<Stmt>, until: Expr) -> Stmt {
        self.stmt(StmtKind::Repeat { body, until })
    }

    pub fn break_(&mut self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_(&mut self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }

    pub fn ret(&mut self) -> Stmt {
        self.stmt(StmtKind::Return)
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn simd_range(&mut self, index: Option<&str>, lo: Expr, hi: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::SimdRange {
            index: index.map(str::to_string),
            lo,
            hi,
            body,
        })
    }

    // ── Declarations ───────────────────────────────────────────────

    pub fn param(&mut self, name: &str, ty: Type) -> Param {
        Param {
            name: name.to_string(),
            ty,
            mode: ParamMode::In,
            is_scalar: false,
            span: self.span(),
        }
    }

    pub fn scalar_param(&mut self, name: &str, ty: Type) -> Param {
        Param {
            is_scalar: true,
            ..self.param(name, ty)
        }
    }

    pub fn inout_param(&mut self, name: &str, ty: Type) -> Param {
        Param {
            mode: ParamMode::InOut,
            ..self.param(name, ty)
        }
    }

    pub fn slot(&mut self, name: &str, ty: Type) -> ReturnSlot {
        ReturnSlot {
            name: name.to_string(),
            ty,
        }
    }

    pub fn routine(
        &mut self,
        name: &str,
        is_simd: bool,
        params: Vec<Param>,
        returns: Vec<ReturnSlot>,
        body: Vec<Stmt>,
    ) -> RoutineDecl {
        RoutineDecl {
            id: self.id(),
            name: name.to_string(),
            is_simd,
            params,
            returns,
            body,
            span: self.span(),
        }
    }

    pub fn class(&mut self, name: &str, is_simd: bool, fields: &[(&str, Type)]) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            is_simd,
            fields: fields
                .iter()
                .map(|(name, ty)| FieldDecl {
                    name: name.to_string(),
                    ty: ty.clone(),
                })
                .collect(),
            span: self.span(),
        }
    }
}

fn element_type(container: &Type) -> Type {
    match container {
        Type::Container(elem) => (**elem).clone(),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_spans_are_unique() {
        let mut b = AstBuilder::new();
        let x = b.var("x", Type::int());
        let one = b.int(1);
        let sum = b.binary(BinOp::Add, x, one);
        match &sum.kind {
            ExprKind::Binary { left, right, .. } => {
                assert_ne!(left.id, right.id);
                assert_ne!(left.span, right.span);
                assert_ne!(sum.id, left.id);
            }
            _ => panic!("expected binary"),
        }
        assert_eq!(sum.ty, Type::int());
    }

    #[test]
    fn comparison_is_bool() {
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::real());
        let zero = b.real(0.0);
        let cmp = b.binary(BinOp::Gt, a, zero);
        assert_eq!(cmp.ty, Type::bool());
    }

    #[test]
    fn index_yields_element_type() {
        let mut b = AstBuilder::new();
        let c = b.var("c", Type::container(Type::real()));
        let i = b.int(0);
        let e = b.index(c, i);
        assert_eq!(e.ty, Type::real());
    }
}
