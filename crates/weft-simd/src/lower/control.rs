// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Control flow: branches, loops, ternaries, early exits and range blocks.

use weft_ast::{BinOp, Expr, ScalarKind, Span, Stmt, StmtKind, UnaryOp};
use weft_vir::{BlockId, LocalId, ReduceOp, VirOperand, VirRValue, VirTerminator, VirType};

use super::{LoopTarget, Lowerer};
use crate::divergence::ExitTag;
use crate::layout;
use crate::mask::{FrameKind, RetireScope};
use crate::LoweringError;

impl Lowerer<'_> {
    fn branch(&mut self, cond: VirOperand, then_block: BlockId, else_block: BlockId) {
        self.builder.terminate(VirTerminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    fn goto_if_open(&mut self, target: BlockId) {
        if self.builder.current_block_unterminated() {
            self.goto(target);
        }
    }

    /// Lower `cond` to a mask and copy it, so later writes to the variables
    /// it reads cannot change which lanes took which arm.
    fn predicate(&mut self, cond: &Expr) -> Result<VirOperand, LoweringError> {
        let value = self.expr(cond)?;
        let ty = self.mask_type();
        let value = self.widen(value, &ty);
        Ok(self.temp(ty, VirRValue::Use(value)))
    }

    fn and_mask(&mut self, dst: LocalId, left: VirOperand, right: VirOperand) {
        self.assign(
            dst,
            VirRValue::BinaryOp {
                op: BinOp::And,
                left,
                right,
            },
        );
    }

    fn not_mask(&mut self, value: VirOperand) -> VirOperand {
        let ty = self.mask_type();
        self.temp(
            ty,
            VirRValue::UnaryOp {
                op: UnaryOp::Not,
                operand: value,
            },
        )
    }

    /// Mask local for a nested frame: `parent & predicate`.
    fn sub_mask(&mut self, name: &str, parent: LocalId, predicate: VirOperand) -> LocalId {
        let mask = self.builder.alloc_local(name.to_string(), self.mask_type());
        self.and_mask(mask, VirOperand::Local(parent), predicate);
        mask
    }

    // ── Branches ───────────────────────────────────────────────────

    pub(super) fn if_stmt(
        &mut self,
        stmt: &Stmt,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: &[Stmt],
    ) -> Result<(), LoweringError> {
        if self.plan.is_divergent(stmt.id) {
            let p = self.predicate(cond)?;
            let parent = self.active(stmt.span)?;
            let then_mask = self.sub_mask("then", parent, p.clone());
            self.masks.push(FrameKind::Branch, then_mask, true);
            let result = self.block(then_body);
            self.masks.pop();
            result?;

            if !else_body.is_empty() {
                let not_p = self.not_mask(p);
                let else_mask = self.sub_mask("else", parent, not_p);
                self.masks.push(FrameKind::Branch, else_mask, true);
                let result = self.block(else_body);
                self.masks.pop();
                result?;
            }
            return Ok(());
        }

        let c = self.expr(cond)?;
        let then_block = self.builder.create_block();
        let join = self.builder.create_block();
        let else_block = if else_body.is_empty() {
            join
        } else {
            self.builder.create_block()
        };
        self.branch(c, then_block, else_block);

        self.builder.switch_to_block(then_block);
        self.block(then_body)?;
        self.goto_if_open(join);

        if !else_body.is_empty() {
            self.builder.switch_to_block(else_block);
            self.block(else_body)?;
            self.goto_if_open(join);
        }
        self.builder.switch_to_block(join);
        Ok(())
    }

    pub(super) fn ternary(
        &mut self,
        e: &Expr,
        cond: &Expr,
        then_value: &Expr,
        else_value: &Expr,
    ) -> Result<VirOperand, LoweringError> {
        let ty = self.expr_type(e)?;

        if self.plan.is_divergent(e.id) {
            let p = self.predicate(cond)?;
            let parent = self.active(e.span)?;

            let then_mask = self.sub_mask("then", parent, p.clone());
            self.masks.push(FrameKind::Branch, then_mask, true);
            let a = self.expr(then_value);
            self.masks.pop();
            let a = a?;

            let not_p = self.not_mask(p.clone());
            let else_mask = self.sub_mask("else", parent, not_p);
            self.masks.push(FrameKind::Branch, else_mask, true);
            let b = self.expr(else_value);
            self.masks.pop();
            let b = b?;

            let a = self.widen(a, &ty);
            let b = self.widen(b, &ty);
            return Ok(self.temp(
                ty,
                VirRValue::Select {
                    mask: p,
                    then_value: a,
                    else_value: b,
                },
            ));
        }

        let c = self.expr(cond)?;
        let dst = self.builder.alloc_temp(ty.clone());
        let then_block = self.builder.create_block();
        let else_block = self.builder.create_block();
        let join = self.builder.create_block();
        self.branch(c, then_block, else_block);

        for (block, arm) in [(then_block, then_value), (else_block, else_value)] {
            self.builder.switch_to_block(block);
            let value = self.expr(arm)?;
            let value = self.widen(value, &ty);
            self.assign(dst, VirRValue::Use(value));
            self.goto(join);
        }
        self.builder.switch_to_block(join);
        Ok(VirOperand::Local(dst))
    }

    // ── Loops ──────────────────────────────────────────────────────

    fn trip_counter(&mut self) -> Option<LocalId> {
        self.cx.config.loop_trip_bound?;
        let trips = self
            .builder
            .alloc_local("trips".to_string(), VirType::Scalar(ScalarKind::Int64));
        self.assign(trips, VirRValue::Use(VirOperand::int(0)));
        Some(trips)
    }

    /// Whether a divergent loop goes round again: some lane is live and the
    /// trip bound, if any, has not been reached. `within` compares the
    /// iteration count against the bound.
    fn loop_guard(&mut self, live: LocalId, trips: Option<LocalId>, within: BinOp) -> VirOperand {
        let bool_ty = VirType::Scalar(ScalarKind::Bool);
        let any = self.temp(
            bool_ty.clone(),
            VirRValue::Reduce {
                op: ReduceOp::Any,
                value: VirOperand::Local(live),
                mask: None,
            },
        );
        let (Some(trips), Some(bound)) = (trips, self.cx.config.loop_trip_bound) else {
            return any;
        };
        self.assign(
            trips,
            VirRValue::BinaryOp {
                op: BinOp::Add,
                left: VirOperand::Local(trips),
                right: VirOperand::int(1),
            },
        );
        let ok = self.temp(
            bool_ty.clone(),
            VirRValue::BinaryOp {
                op: within,
                left: VirOperand::Local(trips),
                right: VirOperand::int(i64::from(bound)),
            },
        );
        self.temp(
            bool_ty,
            VirRValue::BinaryOp {
                op: BinOp::And,
                left: any,
                right: ok,
            },
        )
    }

    /// Fresh `live` and `iter` masks for a divergent loop.
    fn loop_masks(&mut self, span: Span) -> Result<(LocalId, LocalId), LoweringError> {
        let parent = self.active(span)?;
        let live = self.builder.alloc_local("live".to_string(), self.mask_type());
        self.assign(live, VirRValue::Use(VirOperand::Local(parent)));
        let iter = self.builder.alloc_local("iter".to_string(), self.mask_type());
        Ok((live, iter))
    }

    pub(super) fn while_stmt(&mut self, stmt: &Stmt, cond: &Expr, body: &[Stmt]) -> Result<(), LoweringError> {
        let header = self.builder.create_block();
        let body_block = self.builder.create_block();
        let exit = self.builder.create_block();
        self.loops.push(LoopTarget {
            id: stmt.id,
            break_block: exit,
            continue_block: header,
        });

        if !self.plan.is_divergent(stmt.id) {
            self.goto(header);
            self.builder.switch_to_block(header);
            let c = self.expr(cond)?;
            self.branch(c, body_block, exit);
            self.builder.switch_to_block(body_block);
            self.block(body)?;
            self.goto_if_open(header);
        } else {
            let (live, iter) = self.loop_masks(stmt.span)?;
            let trips = self.trip_counter();
            self.goto(header);
            self.builder.switch_to_block(header);
            self.assign(iter, VirRValue::Use(VirOperand::Local(live)));
            self.masks.push(
                FrameKind::Loop {
                    target: stmt.id,
                    live,
                },
                iter,
                true,
            );
            let c = self.predicate(cond)?;
            self.and_mask(live, VirOperand::Local(live), c);
            self.assign(iter, VirRValue::Use(VirOperand::Local(live)));
            let go = self.loop_guard(live, trips, BinOp::Le);
            self.branch(go, body_block, exit);
            self.builder.switch_to_block(body_block);
            self.block(body)?;
            self.goto_if_open(header);
            self.masks.pop();
        }

        self.loops.pop();
        self.builder.switch_to_block(exit);
        Ok(())
    }

    pub(super) fn repeat_stmt(&mut self, stmt: &Stmt, body: &[Stmt], until: &Expr) -> Result<(), LoweringError> {
        let body_block = self.builder.create_block();
        let cond_block = self.builder.create_block();
        let exit = self.builder.create_block();
        self.loops.push(LoopTarget {
            id: stmt.id,
            break_block: exit,
            continue_block: cond_block,
        });

        if !self.plan.is_divergent(stmt.id) {
            self.goto(body_block);
            self.builder.switch_to_block(body_block);
            self.block(body)?;
            self.goto_if_open(cond_block);
            self.builder.switch_to_block(cond_block);
            let u = self.expr(until)?;
            self.branch(u, exit, body_block);
        } else {
            let (live, iter) = self.loop_masks(stmt.span)?;
            let trips = self.trip_counter();
            self.goto(body_block);
            self.builder.switch_to_block(body_block);
            self.assign(iter, VirRValue::Use(VirOperand::Local(live)));
            self.masks.push(
                FrameKind::Loop {
                    target: stmt.id,
                    live,
                },
                iter,
                true,
            );
            self.block(body)?;
            self.goto_if_open(cond_block);

            // Lanes that continued rejoin for the test.
            self.builder.switch_to_block(cond_block);
            self.assign(iter, VirRValue::Use(VirOperand::Local(live)));
            let u = self.predicate(until)?;
            let staying = self.not_mask(u);
            self.and_mask(live, VirOperand::Local(live), staying);
            self.assign(iter, VirRValue::Use(VirOperand::Local(live)));
            let go = self.loop_guard(live, trips, BinOp::Lt);
            self.branch(go, body_block, exit);
            self.masks.pop();
        }

        self.loops.pop();
        self.builder.switch_to_block(exit);
        Ok(())
    }

    // ── Exits ──────────────────────────────────────────────────────

    pub(super) fn exit(&mut self, stmt: &Stmt) -> Result<(), LoweringError> {
        let retire = self.plan.exit(stmt.id) == ExitTag::Retire;
        let target = self.loops.last().map(|l| (l.id, l.break_block, l.continue_block));
        let missing = || LoweringError::Unsupported {
            what: "loop exit outside a loop".to_string(),
            span: stmt.span,
        };

        match (&stmt.kind, retire) {
            (StmtKind::Break, false) => {
                let (_, break_block, _) = target.ok_or_else(missing)?;
                self.goto(break_block);
                self.dead_block();
            }
            (StmtKind::Continue, false) => {
                let (_, _, continue_block) = target.ok_or_else(missing)?;
                self.goto(continue_block);
                self.dead_block();
            }
            (StmtKind::Return, false) => {
                self.goto(self.epilogue);
                self.dead_block();
            }
            (StmtKind::Break, true) => {
                let (id, _, _) = target.ok_or_else(missing)?;
                self.retire(RetireScope::Break(id), stmt.span)?;
            }
            (StmtKind::Continue, true) => {
                let (id, _, _) = target.ok_or_else(missing)?;
                self.retire(RetireScope::Continue(id), stmt.span)?;
            }
            (StmtKind::Return, true) => {
                self.retire(RetireScope::Return, stmt.span)?;
                self.retired = true;
            }
            _ => {}
        }
        Ok(())
    }

    /// Clear the executing lanes from every mask the exit leaves.
    fn retire(&mut self, scope: RetireScope, span: Span) -> Result<(), LoweringError> {
        let active = self.active(span)?;
        let ty = self.mask_type();
        let leaving = self.temp(ty, VirRValue::Use(VirOperand::Local(active)));
        let staying = self.not_mask(leaving);
        let targets = self.masks.retire_targets(scope);
        for mask in targets.masks.iter().chain(&targets.lives) {
            self.and_mask(*mask, VirOperand::Local(*mask), staying.clone());
        }
        Ok(())
    }

    // ── Range blocks ───────────────────────────────────────────────

    pub(super) fn range(
        &mut self,
        stmt: &Stmt,
        index: Option<&str>,
        lo: &Expr,
        hi: &Expr,
        body: &[Stmt],
    ) -> Result<(), LoweringError> {
        let lanes = self
            .layout
            .range_lanes(stmt.id)
            .ok_or_else(|| LoweringError::Unsupported {
                what: "simd block without a planned width".to_string(),
                span: stmt.span,
            })?;
        let kind = Self::scalar_kind(&lo.ty, lo.span)?;
        let lo_value = self.expr(lo)?;
        let hi_value = self.expr(hi)?;
        let base = self.builder.alloc_local("base".to_string(), VirType::Scalar(kind));
        self.assign(base, VirRValue::Use(lo_value));
        let end = self.temp(VirType::Scalar(kind), VirRValue::Use(hi_value));

        let header = self.builder.create_block();
        let body_block = self.builder.create_block();
        let exit = self.builder.create_block();
        self.goto(header);
        self.builder.switch_to_block(header);
        let more = self.temp(
            VirType::Scalar(ScalarKind::Bool),
            VirRValue::BinaryOp {
                op: BinOp::Lt,
                left: VirOperand::Local(base),
                right: end.clone(),
            },
        );
        self.branch(more, body_block, exit);
        self.builder.switch_to_block(body_block);

        let saved = (self.lanes, self.batch_base);
        self.lanes = lanes;
        self.batch_base = Some(base);

        let vty = VirType::vector(kind, lanes);
        let iota = self.temp(vty.clone(), VirRValue::Iota { elem: kind, lanes });
        let first = self.temp(
            vty.clone(),
            VirRValue::Splat {
                value: VirOperand::Local(base),
                lanes,
            },
        );
        let lane_index = self.temp(
            vty.clone(),
            VirRValue::BinaryOp {
                op: BinOp::Add,
                left: first,
                right: iota,
            },
        );
        if let Some(name) = index {
            let var = self.builder.alloc_local(name.to_string(), vty.clone());
            self.assign(var, VirRValue::Use(lane_index.clone()));
            self.locals.insert(name.to_string(), var);
        }

        let batch = self.builder.alloc_local("batch".to_string(), self.mask_type());
        if layout::needs_tail_mask(lo, hi, lanes) {
            let limit = self.temp(vty, VirRValue::Splat { value: end, lanes });
            self.assign(
                batch,
                VirRValue::BinaryOp {
                    op: BinOp::Lt,
                    left: lane_index,
                    right: limit,
                },
            );
        } else {
            self.assign(
                batch,
                VirRValue::Splat {
                    value: VirOperand::bool(true),
                    lanes,
                },
            );
        }

        self.masks.push(FrameKind::Batch, batch, false);
        let result = self.block(body);
        self.masks.pop();
        (self.lanes, self.batch_base) = saved;
        result?;

        if self.builder.current_block_unterminated() {
            self.assign(
                base,
                VirRValue::BinaryOp {
                    op: BinOp::Add,
                    left: VirOperand::Local(base),
                    right: VirOperand::int(i64::from(lanes)),
                },
            );
            self.goto(header);
        }
        self.builder.switch_to_block(exit);
        Ok(())
    }
}
