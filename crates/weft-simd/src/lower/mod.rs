// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Predicated lowering to VIR.
//!
//! Uniform control becomes ordinary blocks and branches. Divergent control
//! is flattened: both arms of a branch run under complementary masks, and a
//! divergent loop keeps a `live` mask and iterates while any lane is live.
//! Writes to per-lane variables under divergence (or after a lane has
//! returned) are blended with `select(active, new, old)`.

mod call;
mod control;
mod expr;
mod stmt;

use std::collections::HashMap;

use weft_ast::{Expr, Module, NodeId, ParamMode, RoutineDecl, ScalarKind, Span, Type};
use weft_types::{ContextTable, ModuleFacts, Shape, TypeError};
use weft_vir::{
    BlockBuilder, BlockId, LocalId, VirConst, VirFunction, VirOperand, VirRValue, VirStmt,
    VirTerminator, VirType,
};

use crate::abi::{self, ParamRole, ResultSource, RoutineAbi};
use crate::divergence::DivergencePlan;
use crate::layout::{self, LayoutPlan};
use crate::mask::{FrameKind, MaskStack};
use crate::{LoweringConfig, LoweringError, RoutineAnalysis};

/// Inputs shared by both variants of one routine.
pub(crate) struct RoutineCx<'a> {
    pub module: &'a Module,
    pub routine: &'a RoutineDecl,
    pub facts: &'a ModuleFacts,
    pub config: &'a LoweringConfig,
}

struct LoopTarget {
    id: NodeId,
    break_block: BlockId,
    continue_block: BlockId,
}

pub(crate) struct Lowerer<'a> {
    cx: &'a RoutineCx<'a>,
    table: &'a ContextTable,
    plan: &'a DivergencePlan,
    layout: &'a LayoutPlan,
    builder: BlockBuilder,
    locals: HashMap<String, LocalId>,
    masks: MaskStack,
    loops: Vec<LoopTarget>,
    /// Lanes of the code being emitted: the variant's width, a range
    /// block's width, or 1 in scalar code.
    lanes: u32,
    /// First index of the current range batch.
    batch_base: Option<LocalId>,
    exec_mask: Option<LocalId>,
    /// Values of per-lane `inout` parameters on entry.
    inout_entry: HashMap<String, LocalId>,
    epilogue: BlockId,
    /// A retiring `return` has been emitted on some path.
    retired: bool,
    callee_lanes: HashMap<String, u32>,
}

/// Lower one variant of `cx.routine`: the vector variant when the analysis
/// was run in vector mode, the scalar variant otherwise.
pub(crate) fn lower_variant(
    cx: &RoutineCx<'_>,
    analysis: &RoutineAnalysis,
) -> Result<VirFunction, LoweringError> {
    let lanes = analysis.layout.routine_lanes();
    let abi = match lanes {
        Some(lanes) => abi::vector_abi(cx.module, cx.routine, lanes)?,
        None => abi::scalar_abi(cx.module, cx.routine)?,
    };

    let mut builder = BlockBuilder::new(abi.name.clone(), abi.result_types());
    let epilogue = builder.create_block();
    let mut lowerer = Lowerer {
        cx,
        table: &analysis.table,
        plan: &analysis.plan,
        layout: &analysis.layout,
        builder,
        locals: HashMap::new(),
        masks: MaskStack::default(),
        loops: Vec::new(),
        lanes: lanes.unwrap_or(1),
        batch_base: None,
        exec_mask: None,
        inout_entry: HashMap::new(),
        epilogue,
        retired: false,
        callee_lanes: HashMap::new(),
    };

    lowerer.prologue(&abi)?;
    lowerer.block(&cx.routine.body)?;
    if lowerer.builder.current_block_unterminated() {
        lowerer.builder.terminate(VirTerminator::Goto { target: epilogue });
    }
    lowerer.epilogue(&abi)?;
    Ok(lowerer.builder.finish())
}

impl<'a> Lowerer<'a> {
    fn prologue(&mut self, abi: &RoutineAbi) -> Result<(), LoweringError> {
        for param in &abi.params {
            let id = self.builder.add_param(param.name.clone(), param.ty.clone());
            match param.role {
                ParamRole::ExecMask => self.exec_mask = Some(id),
                _ => {
                    self.locals.insert(param.name.clone(), id);
                }
            }
        }

        if let Some(exec) = self.exec_mask {
            let active = self
                .builder
                .alloc_local("active".to_string(), VirType::Mask { lanes: self.lanes });
            self.assign(active, VirRValue::Use(VirOperand::Local(exec)));
            self.masks.push(FrameKind::Routine, active, false);

            for param in &abi.params {
                if param.role == ParamRole::PerLane && param.mode == ParamMode::InOut {
                    let current = self.locals[&param.name];
                    let entry = self.builder.alloc_temp(param.ty.clone());
                    self.assign(entry, VirRValue::Use(VirOperand::Local(current)));
                    self.inout_entry.insert(param.name.clone(), entry);
                }
            }
        }

        let routine = self.cx.routine;
        for slot in &routine.returns {
            let shape = self.var_shape(&slot.name);
            let ty = self.value_type(&slot.ty, shape, routine.span)?;
            let id = self.builder.alloc_local(slot.name.clone(), ty.clone());
            self.zero_init(id, &ty, routine.span)?;
            self.locals.insert(slot.name.clone(), id);
        }
        Ok(())
    }

    fn epilogue(&mut self, abi: &RoutineAbi) -> Result<(), LoweringError> {
        self.builder.switch_to_block(self.epilogue);
        let routine = self.cx.routine;
        let mut values = Vec::with_capacity(abi.results.len());
        for result in &abi.results {
            let name = match result.source {
                ResultSource::Slot(i) => &routine.returns[i].name,
                ResultSource::InOut(i) => &routine.params[i].name,
            };
            let current = self.local(name, routine.span)?;
            let value = match (self.exec_mask, self.inout_entry.get(name).copied()) {
                (Some(exec), Some(entry)) => self.temp(
                    result.ty.clone(),
                    VirRValue::Select {
                        mask: VirOperand::Local(exec),
                        then_value: VirOperand::Local(current),
                        else_value: VirOperand::Local(entry),
                    },
                ),
                _ => VirOperand::Local(current),
            };
            values.push(value);
        }
        self.builder.terminate(VirTerminator::Return { values });
        Ok(())
    }

    // ── Emission helpers ───────────────────────────────────────────

    fn assign(&mut self, dst: LocalId, rvalue: VirRValue) {
        self.builder.push_stmt(VirStmt::Assign { dst, rvalue });
    }

    /// Evaluate `rvalue` into a fresh temporary.
    fn temp(&mut self, ty: VirType, rvalue: VirRValue) -> VirOperand {
        let dst = self.builder.alloc_temp(ty);
        self.assign(dst, rvalue);
        VirOperand::Local(dst)
    }

    /// Start a fresh block for code following an unconditional jump.
    fn dead_block(&mut self) {
        let block = self.builder.create_block();
        self.builder.switch_to_block(block);
    }

    fn goto(&mut self, target: BlockId) {
        self.builder.terminate(VirTerminator::Goto { target });
    }

    fn mask_type(&self) -> VirType {
        VirType::Mask { lanes: self.lanes }
    }

    fn local(&self, name: &str, span: Span) -> Result<LocalId, LoweringError> {
        self.locals.get(name).copied().ok_or_else(|| {
            TypeError::UnknownVariable {
                name: name.to_string(),
                span,
            }
            .into()
        })
    }

    fn local_type(&self, id: LocalId) -> VirType {
        self.builder.local_type(id).cloned().unwrap_or(VirType::Void)
    }

    fn operand_type(&self, op: &VirOperand) -> Option<VirType> {
        op.as_local().map(|id| self.local_type(id))
    }

    fn var_shape(&self, name: &str) -> Shape {
        self.table.var(name).map(|v| v.shape).unwrap_or(Shape::Scalar)
    }

    fn value_type(&self, ty: &Type, shape: Shape, span: Span) -> Result<VirType, LoweringError> {
        Ok(layout::value_type(self.cx.module, ty, shape, self.lanes, span)?)
    }

    /// VIR type of `e` as the unifier shaped it.
    fn expr_type(&self, e: &Expr) -> Result<VirType, LoweringError> {
        self.value_type(&e.ty, self.table.shape(e.id), e.span)
    }

    fn scalar_kind(ty: &Type, span: Span) -> Result<ScalarKind, LoweringError> {
        ty.as_scalar().ok_or_else(|| LoweringError::Unsupported {
            what: format!("non-primitive `{}` here", ty),
            span,
        })
    }

    fn active(&self, span: Span) -> Result<LocalId, LoweringError> {
        self.masks.active().ok_or_else(|| LoweringError::Unsupported {
            what: "per-lane operation outside vector code".to_string(),
            span,
        })
    }

    fn needs_blend(&self) -> bool {
        self.retired || self.masks.any_divergent()
    }

    /// Broadcast `op` to `ty` when `ty` is a batch and `op` is not.
    fn widen(&mut self, op: VirOperand, ty: &VirType) -> VirOperand {
        if !ty.is_batch() {
            return op;
        }
        let already = self.operand_type(&op).map(|t| t.is_batch()).unwrap_or(false);
        if already {
            return op;
        }
        self.temp(
            ty.clone(),
            VirRValue::Splat {
                value: op,
                lanes: ty.lanes(),
            },
        )
    }

    fn zero_const(kind: ScalarKind) -> VirOperand {
        VirOperand::Constant(if kind.is_real() {
            VirConst::Real(0.0)
        } else if kind.is_bool() {
            VirConst::Bool(false)
        } else {
            VirConst::Int(0)
        })
    }

    fn zero_init(&mut self, dst: LocalId, ty: &VirType, span: Span) -> Result<(), LoweringError> {
        let rvalue = match ty {
            VirType::Void => return Ok(()),
            VirType::Scalar(kind) => VirRValue::Use(Self::zero_const(*kind)),
            VirType::Vector { elem, lanes } => VirRValue::Splat {
                value: Self::zero_const(*elem),
                lanes: *lanes,
            },
            VirType::Mask { lanes } => VirRValue::Splat {
                value: VirOperand::bool(false),
                lanes: *lanes,
            },
            VirType::Aggregate { fields, lanes, .. } => {
                let single = self.temp(
                    ty.lane_type(),
                    VirRValue::Compose {
                        fields: fields.iter().map(|k| Self::zero_const(*k)).collect(),
                    },
                );
                if *lanes > 1 {
                    VirRValue::Splat {
                        value: single,
                        lanes: *lanes,
                    }
                } else {
                    VirRValue::Use(single)
                }
            }
            VirType::Buffer { .. } => {
                return Err(LoweringError::Unsupported {
                    what: "container without a length".to_string(),
                    span,
                })
            }
        };
        self.assign(dst, rvalue);
        Ok(())
    }

    /// Write `value` to variable `name`, keeping inactive lanes when
    /// control has diverged.
    fn assign_var(&mut self, name: &str, value: VirOperand, span: Span) -> Result<(), LoweringError> {
        let dst = self.local(name, span)?;
        let ty = self.local_type(dst);
        let value = self.widen(value, &ty);
        if ty.is_batch() && self.needs_blend() {
            let mask = self.active(span)?;
            self.assign(
                dst,
                VirRValue::Select {
                    mask: VirOperand::Local(mask),
                    then_value: value,
                    else_value: VirOperand::Local(dst),
                },
            );
        } else {
            self.assign(dst, VirRValue::Use(value));
        }
        Ok(())
    }

    /// Zero `dst` once, on routine entry, so lanes that skip its later
    /// writes still hold a defined value.
    fn zero_at_entry(&mut self, dst: LocalId, ty: &VirType, span: Span) -> Result<(), LoweringError> {
        let here = self.builder.current_block();
        let entry = self.builder.entry_block();
        self.builder.switch_to_block(entry);
        let result = self.zero_init(dst, ty, span);
        self.builder.switch_to_block(here);
        result
    }

    /// Emit a uniform `stmt` behind `any(active)` when control has diverged,
    /// so it never runs for an empty mask. Skipped results read as zero.
    fn guarded(&mut self, stmt: VirStmt, dsts: &[LocalId], span: Span) -> Result<(), LoweringError> {
        let guard = if self.needs_blend() {
            self.uniform_guard()
        } else {
            None
        };
        let Some(cond) = guard else {
            self.builder.push_stmt(stmt);
            return Ok(());
        };
        for &dst in dsts {
            let ty = self.local_type(dst);
            self.zero_init(dst, &ty, span)?;
        }
        let run = self.builder.create_block();
        let join = self.builder.create_block();
        self.builder.terminate(VirTerminator::Branch {
            cond,
            then_block: run,
            else_block: join,
        });
        self.builder.switch_to_block(run);
        self.builder.push_stmt(stmt);
        self.goto(join);
        self.builder.switch_to_block(join);
        Ok(())
    }

    /// `any(active)` in vector code: uniform memory operations run when at
    /// least one lane reaches them.
    fn uniform_guard(&mut self) -> Option<VirOperand> {
        let mask = self.masks.active()?;
        Some(self.temp(
            VirType::Scalar(ScalarKind::Bool),
            VirRValue::Reduce {
                op: weft_vir::ReduceOp::Any,
                value: VirOperand::Local(mask),
                mask: None,
            },
        ))
    }
}
