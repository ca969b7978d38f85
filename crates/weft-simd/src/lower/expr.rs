// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression lowering.

use weft_ast::{BinOp, Expr, ExprKind, ScalarKind, Span, Type};
use weft_types::{Shape, TypeError};
use weft_vir::{LocalId, VirConst, VirOperand, VirRValue, VirStmt, VirType};

use super::Lowerer;
use crate::LoweringError;

impl Lowerer<'_> {
    pub(super) fn expr(&mut self, e: &Expr) -> Result<VirOperand, LoweringError> {
        match &e.kind {
            ExprKind::Int(v) => Ok(match e.ty.as_scalar() {
                Some(kind) if kind.is_real() => VirOperand::real(*v as f64),
                _ => VirOperand::int(*v),
            }),
            ExprKind::Real(v) => Ok(VirOperand::real(*v)),
            ExprKind::Bool(v) => Ok(VirOperand::bool(*v)),
            ExprKind::Ident(name) => Ok(VirOperand::Local(self.local(name, e.span)?)),
            ExprKind::Binary { op, left, right } => self.binary(e, *op, left, right),
            ExprKind::Unary { op, operand } => {
                let value = self.expr(operand)?;
                let ty = self.expr_type(e)?;
                let value = self.widen(value, &ty);
                Ok(self.temp(ty, VirRValue::UnaryOp { op: *op, operand: value }))
            }
            ExprKind::Call { .. } | ExprKind::CCall { .. } => {
                let mut results = self.call(e)?;
                Ok(if results.is_empty() {
                    VirOperand::int(0)
                } else {
                    results.swap_remove(0)
                })
            }
            ExprKind::Field { object, field } => {
                let base = self.expr(object)?;
                let index = self.field_index(&object.ty, field, e.span)?;
                let ty = self.expr_type(e)?;
                Ok(self.temp(ty, VirRValue::FieldGet { base, field: index }))
            }
            ExprKind::Index { container, index } => {
                let buffer = self.container(container)?;
                let index = self.expr(index)?;
                let guard = self.uniform_guard();
                let ty = self.value_type(&e.ty, Shape::Scalar, e.span)?;
                let dst = self.builder.alloc_temp(ty);
                self.builder.push_stmt(VirStmt::Gather {
                    dst,
                    buffer,
                    index,
                    guard,
                });
                Ok(VirOperand::Local(dst))
            }
            ExprKind::LaneAt { container } => {
                let buffer = self.container(container)?;
                let base = self.batch_base(e.span)?;
                let mask = self.active(e.span)?;
                let ty = self.value_type(&e.ty, Shape::Vector, e.span)?;
                let dst = self.builder.alloc_temp(ty);
                self.builder.push_stmt(VirStmt::LoadBatch {
                    dst,
                    buffer,
                    base: VirOperand::Local(base),
                    mask: Some(VirOperand::Local(mask)),
                });
                Ok(VirOperand::Local(dst))
            }
            ExprKind::Broadcast(inner) => {
                let value = self.expr(inner)?;
                let ty = self.value_type(&e.ty, Shape::Vector, e.span)?;
                Ok(self.widen(value, &ty))
            }
            ExprKind::LaneIndex => {
                let elem = Self::scalar_kind(&e.ty, e.span)?;
                let lanes = self.lanes;
                Ok(self.temp(
                    VirType::vector(elem, lanes),
                    VirRValue::Iota { elem, lanes },
                ))
            }
            ExprKind::Reduce { op, operand } => {
                let value = self.expr(operand)?;
                let Some(mask) = self.masks.active() else {
                    // One lane: every reduction is the identity.
                    return Ok(value);
                };
                let vty = self.value_type(&operand.ty, Shape::Vector, operand.span)?;
                let value = self.widen(value, &vty);
                let ty = self.value_type(&e.ty, Shape::Scalar, e.span)?;
                Ok(self.temp(
                    ty,
                    VirRValue::Reduce {
                        op: *op,
                        value,
                        mask: Some(VirOperand::Local(mask)),
                    },
                ))
            }
            ExprKind::Extract { vector, lane } => {
                let value = self.expr(vector)?;
                if !self.table.shape(vector.id).is_vector() {
                    return Ok(value);
                }
                let lane = self.expr(lane)?;
                let ty = self.value_type(&e.ty, Shape::Scalar, e.span)?;
                Ok(self.temp(ty, VirRValue::Extract { vector: value, lane }))
            }
            ExprKind::Convert(inner) => {
                let value = self.expr(inner)?;
                if inner.ty == e.ty {
                    return Ok(value);
                }
                let to = Self::scalar_kind(&e.ty, e.span)?;
                let ty = self.expr_type(e)?;
                Ok(self.temp(ty, VirRValue::Cast { value, to }))
            }
            ExprKind::Construct { args, .. } => {
                let shape = self.table.shape(e.id);
                let mut fields = Vec::with_capacity(args.len());
                for arg in args {
                    let value = self.expr(arg)?;
                    let ty = self.value_type(&arg.ty, shape, arg.span)?;
                    fields.push(self.widen(value, &ty));
                }
                let ty = self.expr_type(e)?;
                Ok(self.temp(ty, VirRValue::Compose { fields }))
            }
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => self.ternary(e, cond, then_value, else_value),
        }
    }

    fn binary(
        &mut self,
        e: &Expr,
        op: BinOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<VirOperand, LoweringError> {
        let shape = self.table.shape(e.id);
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        let lty = self.value_type(&left.ty, shape, left.span)?;
        let rty = self.value_type(&right.ty, shape, right.span)?;
        let l = self.widen(l, &lty);
        let mut r = self.widen(r, &rty);

        // Inactive lanes may hold a zero divisor.
        let integer = rty.elem().map(ScalarKind::is_integer).unwrap_or(false);
        if op.is_division() && integer && !rty.is_batch() && self.needs_blend() {
            // A uniform divisor only matters when some lane reaches it.
            let nonzero = matches!(&r, VirOperand::Constant(VirConst::Int(d)) if *d != 0);
            if !nonzero {
                if let Some(guard) = self.uniform_guard() {
                    r = self.temp(
                        rty.clone(),
                        VirRValue::Select {
                            mask: guard,
                            then_value: r,
                            else_value: VirOperand::int(1),
                        },
                    );
                }
            }
        }
        if op.is_division() && integer && rty.is_batch() {
            if let Some(mask) = self.masks.active() {
                let one = self.temp(
                    rty.clone(),
                    VirRValue::Splat {
                        value: VirOperand::int(1),
                        lanes: rty.lanes(),
                    },
                );
                r = self.temp(
                    rty,
                    VirRValue::Select {
                        mask: VirOperand::Local(mask),
                        then_value: r,
                        else_value: one,
                    },
                );
            }
        }

        let ty = self.expr_type(e)?;
        Ok(self.temp(
            ty,
            VirRValue::BinaryOp {
                op,
                left: l,
                right: r,
            },
        ))
    }

    pub(super) fn field_index(&self, ty: &Type, field: &str, span: Span) -> Result<u32, LoweringError> {
        let index = match ty {
            Type::Class(name) => self
                .cx
                .module
                .class(name)
                .and_then(|c| c.field_index(field)),
            _ => None,
        };
        index.map(|i| i as u32).ok_or_else(|| {
            TypeError::UnknownField {
                class: ty.to_string(),
                field: field.to_string(),
                span,
            }
            .into()
        })
    }

    pub(super) fn container(&self, container: &Expr) -> Result<LocalId, LoweringError> {
        match &container.kind {
            ExprKind::Ident(name) => self.local(name, container.span),
            _ => Err(TypeError::NotAContainer {
                name: "expression".to_string(),
                span: container.span,
            }
            .into()),
        }
    }

    pub(super) fn batch_base(&self, span: Span) -> Result<LocalId, LoweringError> {
        self.batch_base.ok_or_else(|| {
            TypeError::LaneAccessOutsideSimd {
                what: "lane access `@`".to_string(),
                span,
            }
            .into()
        })
    }
}
