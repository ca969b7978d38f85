// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement lowering.

use weft_ast::{Expr, ExprKind, Stmt, StmtKind, Type};
use weft_types::{Shape, TypeError};
use weft_vir::{VirOperand, VirRValue, VirStmt};

use super::Lowerer;
use crate::LoweringError;

impl Lowerer<'_> {
    pub(super) fn block(&mut self, body: &[Stmt]) -> Result<(), LoweringError> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), LoweringError> {
        match &stmt.kind {
            StmtKind::Let { name, ty, init } => {
                let ty = self.value_type(ty, self.var_shape(name), stmt.span)?;
                let value = match init {
                    Some(init) => Some(self.expr(init)?),
                    None => None,
                };
                let dst = self.builder.alloc_local(name.clone(), ty.clone());
                self.locals.insert(name.clone(), dst);
                if ty.is_batch() && self.needs_blend() {
                    // Re-run by a loop: lanes that already left keep their value.
                    self.zero_at_entry(dst, &ty, stmt.span)?;
                    let value = match value {
                        Some(value) => value,
                        None => {
                            let zero = self.builder.alloc_temp(ty.clone());
                            self.zero_init(zero, &ty, stmt.span)?;
                            VirOperand::Local(zero)
                        }
                    };
                    self.assign_var(name, value, stmt.span)?;
                } else {
                    match value {
                        Some(value) => {
                            let value = self.widen(value, &ty);
                            self.assign(dst, VirRValue::Use(value));
                        }
                        None => self.zero_init(dst, &ty, stmt.span)?,
                    }
                }
            }
            StmtKind::Container { name, elem, len } => {
                let len = self.expr(len)?;
                let ty = self.value_type(&Type::container(elem.clone()), Shape::Scalar, stmt.span)?;
                let dst = self.builder.alloc_local(name.clone(), ty);
                self.builder.push_stmt(VirStmt::ContainerAlloc { dst, len });
                self.locals.insert(name.clone(), dst);
            }
            StmtKind::Assign { target, value } => {
                let value = self.expr(value)?;
                self.store(target, value)?;
            }
            StmtKind::AssignMulti { targets, call } => {
                let values = self.call(call)?;
                for (target, value) in targets.iter().zip(values) {
                    self.store(target, value)?;
                }
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => self.if_stmt(stmt, cond, then_body, else_body)?,
            StmtKind::While { cond, body } => self.while_stmt(stmt, cond, body)?,
            StmtKind::Repeat { body, until } => self.repeat_stmt(stmt, body, until)?,
            StmtKind::Break | StmtKind::Continue | StmtKind::Return => self.exit(stmt)?,
            StmtKind::Expr(e) => {
                self.expr(e)?;
            }
            StmtKind::SimdRange {
                index,
                lo,
                hi,
                body,
            } => self.range(stmt, index.as_deref(), lo, hi, body)?,
        }
        Ok(())
    }

    /// Write `value` through the place `target`.
    pub(super) fn store(&mut self, target: &Expr, value: VirOperand) -> Result<(), LoweringError> {
        match &target.kind {
            ExprKind::Ident(name) => self.assign_var(name, value, target.span),
            ExprKind::Field { object, field } => {
                let base = self.expr(object)?;
                let index = self.field_index(&object.ty, field, target.span)?;
                let object_shape = self.table.shape(object.id);
                let field_ty = self.value_type(&target.ty, object_shape, target.span)?;
                let value = self.widen(value, &field_ty);
                let object_ty = self.value_type(&object.ty, object_shape, object.span)?;
                let updated = self.temp(
                    object_ty,
                    VirRValue::FieldSet {
                        base,
                        field: index,
                        value,
                    },
                );
                self.store(object, updated)
            }
            ExprKind::Index { container, index } => {
                let buffer = self.container(container)?;
                let index = self.expr(index)?;
                let guard = self.uniform_guard();
                self.builder.push_stmt(VirStmt::Scatter {
                    buffer,
                    index,
                    value,
                    guard,
                });
                Ok(())
            }
            ExprKind::LaneAt { container } => {
                let buffer = self.container(container)?;
                let base = self.batch_base(target.span)?;
                let mask = self.active(target.span)?;
                let ty = self.value_type(&target.ty, Shape::Vector, target.span)?;
                let value = self.widen(value, &ty);
                self.builder.push_stmt(VirStmt::StoreBatch {
                    buffer,
                    base: VirOperand::Local(base),
                    value,
                    mask: Some(VirOperand::Local(mask)),
                });
                Ok(())
            }
            _ => Err(TypeError::NotAssignable { span: target.span }.into()),
        }
    }
}
