// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Call lowering: scalar calls, vector-variant calls and per-lane calls.

use weft_ast::{Expr, ExprKind, ParamMode, RoutineDecl, Span};
use weft_types::{CallKind, RoutineMode, Shape, TypeError};
use weft_vir::{FunctionRef, LocalId, VirOperand, VirStmt};

use super::Lowerer;
use crate::{abi, divergence, layout, LayoutError, LoweringError};

impl Lowerer<'_> {
    /// Lower a call and return its return-slot values. `inout` results are
    /// written back to their argument places.
    pub(super) fn call(&mut self, e: &Expr) -> Result<Vec<VirOperand>, LoweringError> {
        match &e.kind {
            ExprKind::Call { routine, args } => self.routine_call(e, routine, args),
            ExprKind::CCall { name, args } => self.foreign_call(e, name, args),
            _ => Err(TypeError::NotAssignable { span: e.span }.into()),
        }
    }

    fn routine_call(
        &mut self,
        e: &Expr,
        name: &str,
        args: &[Expr],
    ) -> Result<Vec<VirOperand>, LoweringError> {
        let module = self.cx.module;
        let callee = module
            .routine(name)
            .ok_or_else(|| TypeError::UnknownRoutine {
                name: name.to_string(),
                span: e.span,
            })?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.expr(arg)?);
        }

        let kind = self.table.call_kind(e.id).unwrap_or(CallKind::Scalar);
        let dsts = match kind {
            CallKind::Scalar => {
                let dsts = self.result_temps(callee, Shape::Scalar)?;
                let stmt = VirStmt::Call {
                    dsts: dsts.clone(),
                    func: FunctionRef::internal(callee.name.clone()),
                    args: values,
                };
                self.guarded(stmt, &dsts, e.span)?;
                dsts
            }
            CallKind::Vector => {
                let width = self.callee_width(callee, e.span)?;
                if width != self.lanes {
                    return Err(LayoutError::LaneWidthMismatch {
                        callee: callee.name.clone(),
                        expected: self.lanes,
                        found: width,
                        span: e.span,
                    }
                    .into());
                }
                let mask = self.active(e.span)?;
                let mut call_args = Vec::with_capacity(values.len() + 1);
                call_args.push(VirOperand::Local(mask));
                for (param, value) in callee.params.iter().zip(values) {
                    if abi::is_uniform_param(param) {
                        call_args.push(value);
                    } else {
                        let ty = self.value_type(&param.ty, Shape::Vector, param.span)?;
                        call_args.push(self.widen(value, &ty));
                    }
                }
                let dsts = self.result_temps(callee, Shape::Vector)?;
                self.builder.push_stmt(VirStmt::Call {
                    dsts: dsts.clone(),
                    func: FunctionRef::internal(abi::vector_name(&callee.name, width)),
                    args: call_args,
                });
                dsts
            }
            CallKind::PerLane => {
                let mask = self.active(e.span)?;
                let dsts = self.result_temps(callee, Shape::Vector)?;
                self.builder.push_stmt(VirStmt::LaneCall {
                    dsts: dsts.clone(),
                    func: FunctionRef::internal(callee.name.clone()),
                    args: values,
                    mask: VirOperand::Local(mask),
                    lanes: self.lanes,
                });
                dsts
            }
        };

        let slots = callee.returns.len();
        let inouts = callee
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mode == ParamMode::InOut)
            .map(|(i, _)| i);
        for (dst, param_index) in dsts[slots..].iter().zip(inouts) {
            self.store(&args[param_index], VirOperand::Local(*dst))?;
        }
        Ok(dsts[..slots].iter().map(|d| VirOperand::Local(*d)).collect())
    }

    /// One temporary per result: return slots, then `inout` parameters.
    fn result_temps(&mut self, callee: &RoutineDecl, shape: Shape) -> Result<Vec<LocalId>, LoweringError> {
        let types = callee
            .returns
            .iter()
            .map(|slot| (&slot.ty, callee.span))
            .chain(
                callee
                    .params
                    .iter()
                    .filter(|p| p.mode == ParamMode::InOut)
                    .map(|p| (&p.ty, p.span)),
            );
        let mut dsts = Vec::new();
        for (ty, span) in types {
            let ty = self.value_type(ty, shape, span)?;
            dsts.push(self.builder.alloc_temp(ty));
        }
        Ok(dsts)
    }

    fn foreign_call(
        &mut self,
        e: &Expr,
        name: &str,
        args: &[Expr],
    ) -> Result<Vec<VirOperand>, LoweringError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.expr(arg)?);
        }
        let func = FunctionRef::extern_c(name.to_string());
        let per_lane = self.table.call_kind(e.id) == Some(CallKind::PerLane);
        let shape = if per_lane { Shape::Vector } else { Shape::Scalar };
        let dsts = if e.ty.is_void() {
            Vec::new()
        } else {
            let ty = self.value_type(&e.ty, shape, e.span)?;
            vec![self.builder.alloc_temp(ty)]
        };

        if per_lane {
            let mask = self.active(e.span)?;
            self.builder.push_stmt(VirStmt::LaneCall {
                dsts: dsts.clone(),
                func,
                args: values,
                mask: VirOperand::Local(mask),
                lanes: self.lanes,
            });
        } else {
            let stmt = VirStmt::Call {
                dsts: dsts.clone(),
                func,
                args: values,
            };
            self.guarded(stmt, &dsts, e.span)?;
        }
        Ok(dsts.into_iter().map(VirOperand::Local).collect())
    }

    /// Width the callee's vector variant runs at.
    fn callee_width(&mut self, callee: &RoutineDecl, span: Span) -> Result<u32, LoweringError> {
        if let Some(width) = self.callee_lanes.get(&callee.name) {
            return Ok(*width);
        }
        let cx = self.cx;
        let (table, _) = divergence::analyze(cx.module, callee, RoutineMode::Vector, cx.facts, cx.config)
            .map_err(|_| LoweringError::Unsupported {
                what: format!("call to `{}`, whose vector variant does not lower", callee.name),
                span,
            })?;
        let width = layout::routine_lanes(cx.module, callee, &table, cx.config.lane_width)?;
        self.callee_lanes.insert(callee.name.clone(), width);
        Ok(width)
    }
}
