// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shape inference.
//!
//! Variables start uniform and only ever widen, so re-walking the body
//! until nothing widens reaches a fixpoint in at most one pass per
//! variable.

use indexmap::IndexSet;
use weft_ast::{Expr, ExprKind, Module, ParamMode, RoutineDecl, Span, Stmt, StmtKind, Type};

use crate::table::{CallKind, ContextTable, Region, VarInfo, VarOrigin};
use crate::{ExecContext, ModuleFacts, RoutineMode, Shape, TypeError};

/// Unify one variant of a routine.
///
/// `forced` names variables that must be per-lane regardless of what is
/// assigned to them (the divergence analyzer promotes variables written
/// under divergent control).
pub fn unify_routine(
    module: &Module,
    routine: &RoutineDecl,
    mode: RoutineMode,
    forced: &IndexSet<String>,
    facts: &ModuleFacts,
) -> Result<ContextTable, TypeError> {
    let mut unifier = Unifier {
        module,
        facts,
        forced,
        table: ContextTable::new(mode),
        ctx: match mode {
            RoutineMode::Scalar => ExecContext::Scalar,
            RoutineMode::Vector => ExecContext::Vector,
        },
        region: Region::Routine,
        in_range: false,
        changed: false,
    };
    unifier.declare_signature(routine);

    loop {
        unifier.changed = false;
        unifier.table.exprs.clear();
        unifier.table.stmts.clear();
        unifier.table.calls.clear();
        unifier.block(&routine.body)?;
        if !unifier.changed {
            break;
        }
    }
    Ok(unifier.table)
}

struct Unifier<'a> {
    module: &'a Module,
    facts: &'a ModuleFacts,
    forced: &'a IndexSet<String>,
    table: ContextTable,
    ctx: ExecContext,
    region: Region,
    /// Inside a range block, where `@` has a batch to address.
    in_range: bool,
    changed: bool,
}

impl<'a> Unifier<'a> {
    fn declare_signature(&mut self, routine: &RoutineDecl) {
        let vector = self.table.mode == RoutineMode::Vector;
        for param in &routine.params {
            let uniform = param.is_scalar || param.ty.is_container();
            let shape = if vector && !uniform {
                Shape::Vector
            } else {
                Shape::Scalar
            };
            let origin = if param.ty.is_container() {
                VarOrigin::Container
            } else if param.mode == ParamMode::InOut {
                VarOrigin::InOutParam
            } else {
                VarOrigin::Param
            };
            self.declare(&param.name, param.ty.clone(), shape, uniform, origin);
        }
        for slot in &routine.returns {
            let shape = if vector { Shape::Vector } else { Shape::Scalar };
            self.declare(&slot.name, slot.ty.clone(), shape, false, VarOrigin::ReturnSlot);
        }
    }

    fn declare(&mut self, name: &str, ty: Type, shape: Shape, pinned: bool, origin: VarOrigin) {
        if self.table.vars.contains_key(name) {
            return;
        }
        let shape = if !pinned && self.forced.contains(name) {
            Shape::Vector
        } else {
            shape
        };
        self.table.vars.insert(
            name.to_string(),
            VarInfo {
                ty,
                shape,
                pinned,
                region: self.region,
                origin,
            },
        );
    }

    /// Record that `name` receives a value of `shape`.
    fn widen(&mut self, name: &str, shape: Shape, span: Span) -> Result<(), TypeError> {
        if shape == Shape::Scalar {
            return Ok(());
        }
        let region = self.region;
        let var = self
            .table
            .vars
            .get_mut(name)
            .ok_or_else(|| TypeError::UnknownVariable {
                name: name.to_string(),
                span,
            })?;
        if var.shape == Shape::Vector {
            return Ok(());
        }
        if var.pinned || var.region != region {
            return Err(TypeError::VectorInScalarPosition {
                what: format!("uniform variable `{}`", name),
                span,
            });
        }
        var.shape = Shape::Vector;
        self.changed = true;
        Ok(())
    }

    fn require_vector(&self, what: &str, span: Span) -> Result<(), TypeError> {
        if self.ctx == ExecContext::Vector {
            Ok(())
        } else {
            Err(TypeError::LaneAccessOutsideSimd {
                what: what.to_string(),
                span,
            })
        }
    }

    fn require_scalar(shape: Shape, what: &str, span: Span) -> Result<(), TypeError> {
        if shape.is_vector() {
            Err(TypeError::VectorInScalarPosition {
                what: what.to_string(),
                span,
            })
        } else {
            Ok(())
        }
    }

    // ── Statements ─────────────────────────────────────────────────

    fn block(&mut self, body: &[Stmt]) -> Result<(), TypeError> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), TypeError> {
        self.table.stmts.insert(stmt.id, self.ctx);
        match &stmt.kind {
            StmtKind::Let { name, ty, init } => {
                let shape = match init {
                    Some(e) => self.expr(e)?,
                    None => Shape::Scalar,
                };
                self.declare(name, ty.clone(), Shape::Scalar, false, VarOrigin::Local);
                self.widen(name, shape, stmt.span)?;
            }
            StmtKind::Container { name, elem, len } => {
                let shape = self.expr(len)?;
                Self::require_scalar(shape, "container length", len.span)?;
                self.declare(
                    name,
                    Type::container(elem.clone()),
                    Shape::Scalar,
                    true,
                    VarOrigin::Container,
                );
            }
            StmtKind::Assign { target, value } => {
                let shape = self.expr(value)?;
                self.assign_target(target, shape)?;
            }
            StmtKind::AssignMulti { targets, call } => {
                if !matches!(call.kind, ExprKind::Call { .. }) {
                    return Err(TypeError::NotAssignable { span: call.span });
                }
                let shape = self.expr(call)?;
                for target in targets {
                    self.assign_target(target, shape)?;
                }
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond)?;
                self.block(then_body)?;
                self.block(else_body)?;
            }
            StmtKind::While { cond, body } => {
                self.expr(cond)?;
                self.block(body)?;
            }
            StmtKind::Repeat { body, until } => {
                self.block(body)?;
                self.expr(until)?;
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Return => {}
            StmtKind::Expr(e) => {
                self.expr(e)?;
            }
            StmtKind::SimdRange {
                index,
                lo,
                hi,
                body,
            } => {
                if self.ctx == ExecContext::Vector {
                    return Err(TypeError::NestedSimdBlock { span: stmt.span });
                }
                let lo_shape = self.expr(lo)?;
                Self::require_scalar(lo_shape, "range bound", lo.span)?;
                let hi_shape = self.expr(hi)?;
                Self::require_scalar(hi_shape, "range bound", hi.span)?;

                let saved = (self.ctx, self.region, self.in_range);
                self.ctx = ExecContext::Vector;
                self.region = Region::Range(stmt.id);
                self.in_range = true;
                if let Some(index) = index {
                    self.declare(index, lo.ty.clone(), Shape::Vector, false, VarOrigin::RangeIndex);
                }
                let result = self.block(body);
                (self.ctx, self.region, self.in_range) = saved;
                result?;
            }
        }
        Ok(())
    }

    fn assign_target(&mut self, target: &Expr, value: Shape) -> Result<(), TypeError> {
        match &target.kind {
            ExprKind::Ident(_) | ExprKind::Field { .. } => {
                let root = target
                    .root_var()
                    .ok_or(TypeError::NotAssignable { span: target.span })?;
                self.widen(root, value, target.span)?;
            }
            ExprKind::Index { .. } => {
                Self::require_scalar(value, "container element", target.span)?;
            }
            ExprKind::LaneAt { .. } => {}
            _ => return Err(TypeError::NotAssignable { span: target.span }),
        }
        self.expr(target)?;
        Ok(())
    }

    // ── Expressions ────────────────────────────────────────────────

    fn expr(&mut self, e: &Expr) -> Result<Shape, TypeError> {
        let shape = match &e.kind {
            ExprKind::Int(_) | ExprKind::Real(_) | ExprKind::Bool(_) => Shape::Scalar,
            ExprKind::Ident(name) => self
                .table
                .vars
                .get(name)
                .map(|v| v.shape)
                .ok_or_else(|| TypeError::UnknownVariable {
                    name: name.clone(),
                    span: e.span,
                })?,
            ExprKind::Binary { left, right, .. } => {
                let l = self.expr(left)?;
                let r = self.expr(right)?;
                l.join(r)
            }
            ExprKind::Unary { operand, .. } => self.expr(operand)?,
            ExprKind::Call { routine, args } => self.call(e, routine, args)?,
            ExprKind::CCall { args, .. } => {
                for arg in args {
                    self.expr(arg)?;
                }
                let kind = match self.ctx {
                    ExecContext::Scalar => CallKind::Scalar,
                    ExecContext::Vector => CallKind::PerLane,
                };
                self.table.calls.insert(e.id, kind);
                match kind {
                    CallKind::Scalar => Shape::Scalar,
                    _ => Shape::Vector,
                }
            }
            ExprKind::Field { object, field } => {
                let shape = self.expr(object)?;
                self.check_field(&object.ty, field, e.span)?;
                shape
            }
            ExprKind::Index { container, index } => {
                self.check_container(container)?;
                let i = self.expr(index)?;
                Self::require_scalar(i, "container index", index.span)?;
                Shape::Scalar
            }
            ExprKind::LaneAt { container } => {
                if !self.in_range {
                    return Err(TypeError::LaneAccessOutsideSimd {
                        what: "lane access `@`".to_string(),
                        span: e.span,
                    });
                }
                self.check_container(container)?;
                Shape::Vector
            }
            ExprKind::Broadcast(inner) => {
                self.require_vector("`simd` broadcast", e.span)?;
                self.expr(inner)?;
                Shape::Vector
            }
            ExprKind::LaneIndex => {
                self.require_vector("`simd_range`", e.span)?;
                Shape::Vector
            }
            ExprKind::Reduce { operand, .. } => {
                self.expr(operand)?;
                Shape::Scalar
            }
            ExprKind::Extract { vector, lane } => {
                self.expr(vector)?;
                let l = self.expr(lane)?;
                Self::require_scalar(l, "lane number", lane.span)?;
                Shape::Scalar
            }
            ExprKind::Convert(inner) => self.expr(inner)?,
            ExprKind::Construct { class, args } => {
                if self.module.class(class).is_none() {
                    return Err(TypeError::UnknownClass {
                        name: class.clone(),
                        span: e.span,
                    });
                }
                let mut shape = Shape::Scalar;
                for arg in args {
                    shape = shape.join(self.expr(arg)?);
                }
                shape
            }
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                let c = self.expr(cond)?;
                let a = self.expr(then_value)?;
                let b = self.expr(else_value)?;
                c.join(a).join(b)
            }
        };
        self.table.exprs.insert(e.id, shape);
        Ok(shape)
    }

    fn call(&mut self, e: &Expr, routine: &str, args: &[Expr]) -> Result<Shape, TypeError> {
        let module = self.module;
        let callee = module
            .routine(routine)
            .ok_or_else(|| TypeError::UnknownRoutine {
                name: routine.to_string(),
                span: e.span,
            })?;
        let mut shapes = Vec::with_capacity(args.len());
        for arg in args {
            shapes.push(self.expr(arg)?);
        }

        if self.ctx == ExecContext::Scalar {
            self.table.calls.insert(e.id, CallKind::Scalar);
            return Ok(Shape::Scalar);
        }

        let mut varying = false;
        for (param, (arg, shape)) in callee.params.iter().zip(args.iter().zip(&shapes)) {
            if param.is_scalar || param.ty.is_container() {
                Self::require_scalar(
                    *shape,
                    &format!("`scalar` parameter `{}` of `{}`", param.name, callee.name),
                    arg.span,
                )?;
            }
            varying |= shape.is_vector();
        }

        let pure = self.facts.is_pure(&callee.name);
        let kind = if callee.is_simd {
            if varying || !pure {
                CallKind::Vector
            } else {
                CallKind::Scalar
            }
        } else if !pure {
            return Err(TypeError::NonSimdCall {
                routine: callee.name.clone(),
                span: e.span,
            });
        } else if varying {
            CallKind::PerLane
        } else {
            CallKind::Scalar
        };

        if kind != CallKind::Scalar {
            for (param, arg) in callee.params.iter().zip(args) {
                if param.mode == ParamMode::InOut && !param.is_scalar {
                    if let Some(root) = arg.root_var() {
                        self.widen(root, Shape::Vector, arg.span)?;
                    }
                }
            }
        }

        self.table.calls.insert(e.id, kind);
        Ok(match kind {
            CallKind::Scalar => Shape::Scalar,
            _ => Shape::Vector,
        })
    }

    fn check_container(&mut self, container: &Expr) -> Result<(), TypeError> {
        let is_container = match &container.kind {
            ExprKind::Ident(name) => self
                .table
                .vars
                .get(name)
                .map(|v| v.ty.is_container())
                .unwrap_or(false),
            _ => false,
        };
        if !is_container {
            let name = match &container.kind {
                ExprKind::Ident(name) => name.clone(),
                _ => "expression".to_string(),
            };
            return Err(TypeError::NotAContainer {
                name,
                span: container.span,
            });
        }
        self.expr(container)?;
        Ok(())
    }

    fn check_field(&self, ty: &Type, field: &str, span: Span) -> Result<(), TypeError> {
        let found = match ty {
            Type::Class(name) => self
                .module
                .class(name)
                .map(|c| c.field_index(field).is_some())
                .unwrap_or(false),
            _ => false,
        };
        if found {
            Ok(())
        } else {
            Err(TypeError::UnknownField {
                class: ty.to_string(),
                field: field.to_string(),
                span,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::build::AstBuilder;
    use weft_ast::BinOp;

    fn unify(module: &Module, name: &str, mode: RoutineMode) -> Result<ContextTable, TypeError> {
        let facts = ModuleFacts::analyze(module);
        let routine = module.routine(name).expect("routine exists");
        unify_routine(module, routine, mode, &IndexSet::new(), &facts)
    }

    #[test]
    fn local_widens_from_vector_param() {
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::int());
        let one = b.int(1);
        let sum = b.binary(BinOp::Add, a, one);
        let sum_id = sum.id;
        let decl = b.let_("t", Type::int(), Some(sum));
        let zero = b.int(0);
        let k = b.let_("k", Type::int(), Some(zero));
        let p = b.param("a", Type::int());
        let r = b.routine("f", true, vec![p], vec![], vec![decl, k]);
        let module = Module {
            routines: vec![r],
            ..Module::default()
        };

        let table = unify(&module, "f", RoutineMode::Vector).unwrap();
        assert_eq!(table.shape(sum_id), Shape::Vector);
        assert_eq!(table.var("t").unwrap().shape, Shape::Vector);
        assert_eq!(table.var("k").unwrap().shape, Shape::Scalar);

        let scalar = unify(&module, "f", RoutineMode::Scalar).unwrap();
        assert_eq!(scalar.var("t").unwrap().shape, Shape::Scalar);
    }

    #[test]
    fn later_widening_reaches_earlier_reads() {
        // x = 0; while ...: y = x; x = a
        let mut b = AstBuilder::new();
        let zero = b.int(0);
        let x0 = b.let_("x", Type::int(), Some(zero));
        let zero = b.int(0);
        let y0 = b.let_("y", Type::int(), Some(zero));
        let x = b.var("x", Type::int());
        let y = b.var("y", Type::int());
        let copy = b.assign(y, x);
        let a = b.var("a", Type::int());
        let x = b.var("x", Type::int());
        let set = b.assign(x, a);
        let t = b.boolean(true);
        let brk = b.break_();
        let lp = b.while_(t, vec![copy, set, brk]);
        let p = b.param("a", Type::int());
        let r = b.routine("f", true, vec![p], vec![], vec![x0, y0, lp]);
        let module = Module {
            routines: vec![r],
            ..Module::default()
        };

        let table = unify(&module, "f", RoutineMode::Vector).unwrap();
        assert_eq!(table.var("x").unwrap().shape, Shape::Vector);
        assert_eq!(table.var("y").unwrap().shape, Shape::Vector);
    }

    #[test]
    fn forced_variables_start_vector() {
        let mut b = AstBuilder::new();
        let zero = b.int(0);
        let decl = b.let_("n", Type::int(), Some(zero));
        let r = b.routine("f", true, vec![], vec![], vec![decl]);
        let module = Module {
            routines: vec![r],
            ..Module::default()
        };
        let facts = ModuleFacts::analyze(&module);
        let mut forced = IndexSet::new();
        forced.insert("n".to_string());
        let table = unify_routine(
            &module,
            &module.routines[0],
            RoutineMode::Vector,
            &forced,
            &facts,
        )
        .unwrap();
        assert_eq!(table.var("n").unwrap().shape, Shape::Vector);
    }
}
