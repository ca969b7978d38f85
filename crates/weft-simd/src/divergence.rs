// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Divergence analysis.
//!
//! Tags every branch, loop and ternary as uniform (all active lanes agree,
//! lowered to native control flow) or divergent (lowered under a mask), and
//! every `break`/`continue`/`return` as native or retiring. Variables
//! assigned under divergent control are promoted to per-lane, which can make
//! further conditions per-lane, so the analysis is iterated together with
//! the unifier until the promoted set stops growing.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use weft_ast::{Expr, ExprKind, Module, NodeId, ParamMode, RoutineDecl, Span, Stmt, StmtKind};
use weft_types::{unify_routine, ContextTable, ExecContext, ModuleFacts, Region, RoutineMode};

use crate::{DivergenceError, ForeignCallPolicy, LoweringConfig, LoweringError};

/// Symbolic mask of the lanes that run a construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskExpr {
    /// Lanes active where the construct starts.
    Active,
    /// Lanes where the condition with this node id holds.
    Predicate(NodeId),
    /// Lanes still iterating the loop with this node id.
    Live(NodeId),
    Not(Box<MaskExpr>),
    And(Box<MaskExpr>, Box<MaskExpr>),
}

impl MaskExpr {
    fn and(left: MaskExpr, right: MaskExpr) -> MaskExpr {
        MaskExpr::And(Box::new(left), Box::new(right))
    }

    fn not(inner: MaskExpr) -> MaskExpr {
        MaskExpr::Not(Box::new(inner))
    }
}

impl fmt::Display for MaskExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskExpr::Active => write!(f, "active"),
            MaskExpr::Predicate(id) => write!(f, "cond{}", id),
            MaskExpr::Live(id) => write!(f, "live{}", id),
            MaskExpr::Not(inner) => match inner.as_ref() {
                MaskExpr::And(..) => write!(f, "!({})", inner),
                _ => write!(f, "!{}", inner),
            },
            MaskExpr::And(l, r) => write!(f, "{} & {}", l, r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlTag {
    Uniform,
    Divergent(MaskExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    If,
    While,
    Repeat,
    Ternary,
}

impl ControlKind {
    pub fn name(self) -> &'static str {
        match self {
            ControlKind::If => "if",
            ControlKind::While => "while",
            ControlKind::Repeat => "repeat",
            ControlKind::Ternary => "ternary",
        }
    }
}

/// How an early exit is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitTag {
    /// Ordinary jump.
    #[default]
    Native,
    /// Clear the executing lanes from the enclosing masks and fall through.
    Retire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Break,
    Continue,
    Return,
}

impl ExitKind {
    pub fn name(self) -> &'static str {
        match self {
            ExitKind::Break => "break",
            ExitKind::Continue => "continue",
            ExitKind::Return => "return",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlNode {
    pub kind: ControlKind,
    pub span: Span,
    pub tag: ControlTag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitNode {
    pub kind: ExitKind,
    pub span: Span,
    pub tag: ExitTag,
}

/// Divergence tags for one routine variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DivergencePlan {
    controls: IndexMap<NodeId, ControlNode>,
    exits: IndexMap<NodeId, ExitNode>,
    promoted: IndexSet<String>,
    retiring_return: bool,
}

impl DivergencePlan {
    pub fn control(&self, id: NodeId) -> Option<&ControlNode> {
        self.controls.get(&id)
    }

    pub fn is_divergent(&self, id: NodeId) -> bool {
        matches!(
            self.controls.get(&id),
            Some(ControlNode {
                tag: ControlTag::Divergent(_),
                ..
            })
        )
    }

    pub fn exit(&self, id: NodeId) -> ExitTag {
        self.exits.get(&id).map(|e| e.tag).unwrap_or_default()
    }

    pub fn controls(&self) -> impl Iterator<Item = (NodeId, &ControlNode)> {
        self.controls.iter().map(|(id, node)| (*id, node))
    }

    pub fn exits(&self) -> impl Iterator<Item = (NodeId, &ExitNode)> {
        self.exits.iter().map(|(id, node)| (*id, node))
    }

    /// Variables made per-lane because they are written under divergence.
    pub fn promoted(&self) -> impl Iterator<Item = &str> {
        self.promoted.iter().map(String::as_str)
    }

    pub fn has_retiring_return(&self) -> bool {
        self.retiring_return
    }
}

impl fmt::Display for DivergencePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in &self.controls {
            match &node.tag {
                ControlTag::Uniform => writeln!(f, "{} {}: uniform", node.kind.name(), id)?,
                ControlTag::Divergent(mask) => {
                    writeln!(f, "{} {}: divergent under {}", node.kind.name(), id, mask)?
                }
            }
        }
        for (id, exit) in &self.exits {
            let tag = match exit.tag {
                ExitTag::Native => "native",
                ExitTag::Retire => "retire",
            };
            writeln!(f, "{} {}: {}", exit.kind.name(), id, tag)?;
        }
        if !self.promoted.is_empty() {
            let names: Vec<&str> = self.promoted.iter().map(String::as_str).collect();
            writeln!(f, "promoted: {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Unify `routine` in `mode` and tag its control flow, promoting variables
/// until the two analyses agree.
pub fn analyze(
    module: &Module,
    routine: &RoutineDecl,
    mode: RoutineMode,
    facts: &ModuleFacts,
    config: &LoweringConfig,
) -> Result<(ContextTable, DivergencePlan), LoweringError> {
    let mut forced = IndexSet::new();
    loop {
        let table = unify_routine(module, routine, mode, &forced, facts)?;
        let plan = Analyzer::run(module, routine, &table, config)?;
        let before = forced.len();
        forced.extend(plan.promoted.iter().cloned());
        if forced.len() == before {
            return Ok((table, plan));
        }
        tracing::trace!(
            target: "weft::divergence",
            routine = %routine.name,
            promoted = forced.len(),
            "re-unifying with promoted variables"
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Branch,
    Loop(NodeId),
    Range,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    divergent: bool,
}

struct Analyzer<'a> {
    module: &'a Module,
    table: &'a ContextTable,
    config: &'a LoweringConfig,
    frames: Vec<Frame>,
    region: Region,
    divergent_loops: IndexSet<NodeId>,
    changed: bool,
    plan: DivergencePlan,
    /// Every variable written in vector context, for retiring returns.
    written: IndexMap<String, (Span, Region)>,
}

impl<'a> Analyzer<'a> {
    fn run(
        module: &'a Module,
        routine: &RoutineDecl,
        table: &'a ContextTable,
        config: &'a LoweringConfig,
    ) -> Result<DivergencePlan, DivergenceError> {
        let mut analyzer = Analyzer {
            module,
            table,
            config,
            frames: Vec::new(),
            region: Region::Routine,
            divergent_loops: IndexSet::new(),
            changed: false,
            plan: DivergencePlan::default(),
            written: IndexMap::new(),
        };

        // Loops only ever become divergent, so this settles.
        loop {
            analyzer.changed = false;
            analyzer.plan = DivergencePlan::default();
            analyzer.written.clear();
            analyzer.block(&routine.body)?;
            if !analyzer.changed {
                break;
            }
        }

        // Lanes that returned keep their values from then on, so every
        // variable written afterwards has to blend.
        if analyzer.plan.retiring_return {
            let written = std::mem::take(&mut analyzer.written);
            for (name, (span, region)) in written {
                analyzer.promote(&name, span, region)?;
            }
        }
        Ok(analyzer.plan)
    }

    fn under_divergence(&self) -> bool {
        self.frames.iter().any(|f| f.divergent)
    }

    fn record(&mut self, id: NodeId, kind: ControlKind, span: Span, divergent: bool, mask: MaskExpr) {
        let tag = if divergent {
            ControlTag::Divergent(mask)
        } else {
            ControlTag::Uniform
        };
        self.plan.controls.insert(id, ControlNode { kind, span, tag });
    }

    fn promote(&mut self, name: &str, span: Span, region: Region) -> Result<(), DivergenceError> {
        let Some(var) = self.table.var(name) else {
            return Ok(());
        };
        if var.pinned || var.region != region {
            return Err(DivergenceError::UniformAssignUnderDivergence {
                name: name.to_string(),
                span,
            });
        }
        self.plan.promoted.insert(name.to_string());
        Ok(())
    }

    /// Note a write through the place `target`.
    fn write(&mut self, target: &Expr, vector: bool) -> Result<(), DivergenceError> {
        match target.root_var() {
            Some(root) => self.write_var(root, target.span, vector),
            None => Ok(()),
        }
    }

    fn write_var(&mut self, name: &str, span: Span, vector: bool) -> Result<(), DivergenceError> {
        if vector {
            self.written
                .entry(name.to_string())
                .or_insert((span, self.region));
        }
        if self.under_divergence() {
            self.promote(name, span, self.region)?;
        }
        Ok(())
    }

    fn with_frame(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Self) -> Result<(), DivergenceError>,
    ) -> Result<(), DivergenceError> {
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

    // ── Statements ─────────────────────────────────────────────────

    fn block(&mut self, body: &[Stmt]) -> Result<(), DivergenceError> {
        for stmt in body {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), DivergenceError> {
        let vector = self.table.context(stmt.id) == ExecContext::Vector;
        match &stmt.kind {
            StmtKind::Let { name, init, .. } => {
                if let Some(init) = init {
                    self.expr(init, vector)?;
                }
                // A loop body re-runs its `let`s, so they are writes too.
                self.write_var(name, stmt.span, vector)?;
            }
            StmtKind::Container { len, .. } => self.expr(len, vector)?,
            StmtKind::Assign { target, value } => {
                self.expr(value, vector)?;
                self.place(target, vector)?;
                self.write(target, vector)?;
            }
            StmtKind::AssignMulti { targets, call } => {
                self.expr(call, vector)?;
                for target in targets {
                    self.place(target, vector)?;
                    self.write(target, vector)?;
                }
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(cond, vector)?;
                let divergent = self.table.shape(cond.id).is_vector();
                let mask = MaskExpr::and(MaskExpr::Active, MaskExpr::Predicate(cond.id));
                self.record(stmt.id, ControlKind::If, stmt.span, divergent, mask);
                let frame = Frame {
                    kind: FrameKind::Branch,
                    divergent,
                };
                self.with_frame(frame, |a| {
                    a.block(then_body)?;
                    a.block(else_body)
                })?;
            }
            StmtKind::While { cond, body } => {
                let divergent = self.table.shape(cond.id).is_vector()
                    || self.divergent_loops.contains(&stmt.id);
                let mask = MaskExpr::and(MaskExpr::Live(stmt.id), MaskExpr::Predicate(cond.id));
                self.record(stmt.id, ControlKind::While, stmt.span, divergent, mask);
                let frame = Frame {
                    kind: FrameKind::Loop(stmt.id),
                    divergent,
                };
                self.with_frame(frame, |a| {
                    a.expr(cond, vector)?;
                    a.block(body)
                })?;
            }
            StmtKind::Repeat { body, until } => {
                let divergent = self.table.shape(until.id).is_vector()
                    || self.divergent_loops.contains(&stmt.id);
                let mask = MaskExpr::and(
                    MaskExpr::Live(stmt.id),
                    MaskExpr::not(MaskExpr::Predicate(until.id)),
                );
                self.record(stmt.id, ControlKind::Repeat, stmt.span, divergent, mask);
                let frame = Frame {
                    kind: FrameKind::Loop(stmt.id),
                    divergent,
                };
                self.with_frame(frame, |a| {
                    a.block(body)?;
                    a.expr(until, vector)
                })?;
            }
            StmtKind::Break => self.loop_exit(stmt, ExitKind::Break)?,
            StmtKind::Continue => self.loop_exit(stmt, ExitKind::Continue)?,
            StmtKind::Return => self.return_exit(stmt)?,
            StmtKind::Expr(e) => self.expr(e, vector)?,
            StmtKind::SimdRange { lo, hi, body, .. } => {
                self.expr(lo, vector)?;
                self.expr(hi, vector)?;
                let saved = self.region;
                self.region = Region::Range(stmt.id);
                let frame = Frame {
                    kind: FrameKind::Range,
                    divergent: false,
                };
                let result = self.with_frame(frame, |a| a.block(body));
                self.region = saved;
                result?;
            }
        }
        Ok(())
    }

    /// Subexpressions evaluated while computing a store address.
    fn place(&mut self, target: &Expr, vector: bool) -> Result<(), DivergenceError> {
        if let ExprKind::Index { index, .. } = &target.kind {
            self.expr(index, vector)?;
        }
        Ok(())
    }

    fn loop_exit(&mut self, stmt: &Stmt, kind: ExitKind) -> Result<(), DivergenceError> {
        let what = kind.name();
        let mut crossed_divergent = false;
        for frame in self.frames.iter().rev() {
            match frame.kind {
                FrameKind::Range => {
                    return Err(DivergenceError::EscapeFromSimdBlock {
                        what,
                        span: stmt.span,
                    })
                }
                FrameKind::Branch => crossed_divergent |= frame.divergent,
                FrameKind::Loop(id) => {
                    if crossed_divergent && self.divergent_loops.insert(id) {
                        self.changed = true;
                    }
                    let tag = if frame.divergent || crossed_divergent {
                        ExitTag::Retire
                    } else {
                        ExitTag::Native
                    };
                    self.plan.exits.insert(
                        stmt.id,
                        ExitNode {
                            kind,
                            span: stmt.span,
                            tag,
                        },
                    );
                    return Ok(());
                }
            }
        }
        Err(DivergenceError::ExitOutsideLoop {
            what,
            span: stmt.span,
        })
    }

    fn return_exit(&mut self, stmt: &Stmt) -> Result<(), DivergenceError> {
        if self
            .frames
            .iter()
            .any(|f| matches!(f.kind, FrameKind::Range))
        {
            return Err(DivergenceError::EscapeFromSimdBlock {
                what: "return",
                span: stmt.span,
            });
        }
        let retire = self.under_divergence();
        if retire {
            self.plan.retiring_return = true;
            let loops: Vec<NodeId> = self
                .frames
                .iter()
                .filter_map(|f| match f.kind {
                    FrameKind::Loop(id) => Some(id),
                    _ => None,
                })
                .collect();
            for id in loops {
                if self.divergent_loops.insert(id) {
                    self.changed = true;
                }
            }
        }
        self.plan.exits.insert(
            stmt.id,
            ExitNode {
                kind: ExitKind::Return,
                span: stmt.span,
                tag: if retire {
                    ExitTag::Retire
                } else {
                    ExitTag::Native
                },
            },
        );
        Ok(())
    }

    // ── Expressions ────────────────────────────────────────────────

    fn expr(&mut self, e: &Expr, vector: bool) -> Result<(), DivergenceError> {
        match &e.kind {
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                self.expr(cond, vector)?;
                let divergent = self.table.shape(cond.id).is_vector();
                let mask = MaskExpr::and(MaskExpr::Active, MaskExpr::Predicate(cond.id));
                self.record(e.id, ControlKind::Ternary, e.span, divergent, mask);
                let frame = Frame {
                    kind: FrameKind::Branch,
                    divergent,
                };
                self.with_frame(frame, |a| {
                    a.expr(then_value, vector)?;
                    a.expr(else_value, vector)
                })
            }
            ExprKind::CCall { name, args } => {
                for arg in args {
                    self.expr(arg, vector)?;
                }
                if vector {
                    if self.config.foreign_calls == ForeignCallPolicy::Reject {
                        return Err(DivergenceError::ForeignCallRejected {
                            name: name.clone(),
                            span: e.span,
                        });
                    }
                    if self.under_divergence() {
                        return Err(DivergenceError::ForeignCallUnderDivergence {
                            name: name.clone(),
                            span: e.span,
                        });
                    }
                }
                Ok(())
            }
            ExprKind::Call { routine, args } => {
                for arg in args {
                    self.expr(arg, vector)?;
                }
                let module = self.module;
                if let Some(callee) = module.routine(routine) {
                    for (param, arg) in callee.params.iter().zip(args) {
                        if param.mode == ParamMode::InOut {
                            self.write(arg, vector)?;
                        }
                    }
                }
                Ok(())
            }
            _ => {
                for child in e.children() {
                    self.expr(child, vector)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::build::AstBuilder;
    use weft_ast::{BinOp, Type};
    use weft_types::Shape;

    fn run(module: &Module, mode: RoutineMode) -> Result<(ContextTable, DivergencePlan), LoweringError> {
        let facts = ModuleFacts::analyze(module);
        let routine = &module.routines[0];
        analyze(module, routine, mode, &facts, &LoweringConfig::default())
    }

    fn single(routine: RoutineDecl) -> Module {
        Module {
            routines: vec![routine],
            ..Module::default()
        }
    }

    #[test]
    fn condition_on_uniform_param_stays_native() {
        let mut b = AstBuilder::new();
        let n = b.var("n", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, n, zero);
        let r = b.var("r", Type::int());
        let one = b.int(1);
        let set = b.assign(r, one);
        let branch = b.if_(cond, vec![set], vec![]);
        let if_id = branch.id;
        let n_param = b.scalar_param("n", Type::int());
        let slot = b.slot("r", Type::int());
        let module = single(b.routine("f", true, vec![n_param], vec![slot], vec![branch]));

        let (_, plan) = run(&module, RoutineMode::Vector).unwrap();
        assert!(!plan.is_divergent(if_id));
        assert_eq!(plan.promoted().count(), 0);
    }

    #[test]
    fn per_lane_condition_promotes_written_local() {
        let mut b = AstBuilder::new();
        let zero = b.int(0);
        let flag = b.let_("t", Type::int(), Some(zero));
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, a, zero);
        let cond_id = cond.id;
        let t = b.var("t", Type::int());
        let one = b.int(1);
        let set = b.assign(t, one);
        let branch = b.if_(cond, vec![set], vec![]);
        let if_id = branch.id;
        let a_param = b.param("a", Type::int());
        let module = single(b.routine("f", true, vec![a_param], vec![], vec![flag, branch]));

        let (table, plan) = run(&module, RoutineMode::Vector).unwrap();
        assert_eq!(
            plan.control(if_id).map(|n| n.tag.clone()),
            Some(ControlTag::Divergent(MaskExpr::and(
                MaskExpr::Active,
                MaskExpr::Predicate(cond_id)
            )))
        );
        assert_eq!(plan.promoted().collect::<Vec<_>>(), vec!["t"]);
        assert_eq!(table.var("t").map(|v| v.shape), Some(Shape::Vector));
    }

    #[test]
    fn let_under_divergence_is_promoted() {
        // if a > 0: let t = 1
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, a, zero);
        let one = b.int(1);
        let decl = b.let_("t", Type::int(), Some(one));
        let branch = b.if_(cond, vec![decl], vec![]);
        let a_param = b.param("a", Type::int());
        let module = single(b.routine("f", true, vec![a_param], vec![], vec![branch]));

        let (table, plan) = run(&module, RoutineMode::Vector).unwrap();
        assert_eq!(plan.promoted().collect::<Vec<_>>(), vec!["t"]);
        assert_eq!(table.var("t").map(|v| v.shape), Some(Shape::Vector));
    }

    #[test]
    fn break_under_divergent_branch_makes_loop_divergent() {
        let mut b = AstBuilder::new();
        let t = b.boolean(true);
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Lt, a, zero);
        let brk = b.break_();
        let brk_id = brk.id;
        let inner = b.if_(cond, vec![brk], vec![]);
        let lp = b.while_(t, vec![inner]);
        let loop_id = lp.id;
        let a_param = b.param("a", Type::int());
        let module = single(b.routine("f", true, vec![a_param], vec![], vec![lp]));

        let (_, plan) = run(&module, RoutineMode::Vector).unwrap();
        assert!(plan.is_divergent(loop_id));
        assert_eq!(plan.exit(brk_id), ExitTag::Retire);
    }

    #[test]
    fn break_in_uniform_loop_is_native() {
        let mut b = AstBuilder::new();
        let t = b.boolean(true);
        let brk = b.break_();
        let brk_id = brk.id;
        let lp = b.while_(t, vec![brk]);
        let module = single(b.routine("f", true, vec![], vec![], vec![lp]));

        let (_, plan) = run(&module, RoutineMode::Vector).unwrap();
        assert_eq!(plan.exit(brk_id), ExitTag::Native);
    }

    #[test]
    fn retiring_return_promotes_later_writes() {
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Lt, a, zero);
        let ret = b.ret();
        let ret_id = ret.id;
        let early = b.if_(cond, vec![ret], vec![]);
        let zero = b.int(0);
        let k = b.let_("k", Type::int(), Some(zero));
        let k_ref = b.var("k", Type::int());
        let two = b.int(2);
        let bump = b.assign(k_ref, two);
        let a_param = b.param("a", Type::int());
        let module = single(b.routine("f", true, vec![a_param], vec![], vec![early, k, bump]));

        let (table, plan) = run(&module, RoutineMode::Vector).unwrap();
        assert!(plan.has_retiring_return());
        assert_eq!(plan.exit(ret_id), ExitTag::Retire);
        assert_eq!(table.var("k").map(|v| v.shape), Some(Shape::Vector));
    }

    #[test]
    fn scalar_param_written_under_divergence() {
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, a, zero);
        let n = b.var("n", Type::int());
        let one = b.int(1);
        let set = b.assign(n, one);
        let branch = b.if_(cond, vec![set], vec![]);
        let a_param = b.param("a", Type::int());
        let n_param = b.scalar_param("n", Type::int());
        let module = single(b.routine("f", true, vec![a_param, n_param], vec![], vec![branch]));

        let err = run(&module, RoutineMode::Vector).unwrap_err();
        assert!(matches!(
            err,
            LoweringError::Divergence(DivergenceError::UniformAssignUnderDivergence { ref name, .. })
                if name == "n"
        ));
    }

    #[test]
    fn foreign_call_under_divergence() {
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, a, zero);
        let call = b.c_call("puts", vec![], Type::Void);
        let stmt = b.expr_stmt(call);
        let branch = b.if_(cond, vec![stmt], vec![]);
        let a_param = b.param("a", Type::int());
        let module = single(b.routine("f", true, vec![a_param], vec![], vec![branch]));

        let err = run(&module, RoutineMode::Vector).unwrap_err();
        assert!(matches!(
            err,
            LoweringError::Divergence(DivergenceError::ForeignCallUnderDivergence { .. })
        ));
    }

    #[test]
    fn foreign_call_rejected_by_policy() {
        let mut b = AstBuilder::new();
        let call = b.c_call("puts", vec![], Type::Void);
        let stmt = b.expr_stmt(call);
        let module = single(b.routine("f", true, vec![], vec![], vec![stmt]));
        let facts = ModuleFacts::analyze(&module);
        let config = LoweringConfig {
            foreign_calls: ForeignCallPolicy::Reject,
            ..LoweringConfig::default()
        };

        let err = analyze(&module, &module.routines[0], RoutineMode::Vector, &facts, &config)
            .unwrap_err();
        assert!(matches!(
            err,
            LoweringError::Divergence(DivergenceError::ForeignCallRejected { .. })
        ));
        // The scalar variant is not vector code.
        assert!(analyze(&module, &module.routines[0], RoutineMode::Scalar, &facts, &config).is_ok());
    }

    #[test]
    fn break_outside_loop() {
        let mut b = AstBuilder::new();
        let brk = b.break_();
        let module = single(b.routine("f", false, vec![], vec![], vec![brk]));

        let err = run(&module, RoutineMode::Scalar).unwrap_err();
        assert!(matches!(
            err,
            LoweringError::Divergence(DivergenceError::ExitOutsideLoop { what: "break", .. })
        ));
    }

    #[test]
    fn return_from_simd_block() {
        let mut b = AstBuilder::new();
        let lo = b.int(0);
        let hi = b.int(8);
        let ret = b.ret();
        let range = b.simd_range(None, lo, hi, vec![ret]);
        let module = single(b.routine("f", false, vec![], vec![], vec![range]));

        let err = run(&module, RoutineMode::Scalar).unwrap_err();
        assert!(matches!(
            err,
            LoweringError::Divergence(DivergenceError::EscapeFromSimdBlock { what: "return", .. })
        ));
    }

    #[test]
    fn plan_display_lists_tags() {
        let mut b = AstBuilder::new();
        let a = b.var("a", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, a, zero);
        let a_ref = b.var("a", Type::int());
        let one = b.int(1);
        let set = b.assign(a_ref, one);
        let branch = b.if_(cond, vec![set], vec![]);
        let a_param = b.param("a", Type::int());
        let module = single(b.routine("f", true, vec![a_param], vec![], vec![branch]));

        let (_, plan) = run(&module, RoutineMode::Vector).unwrap();
        let text = plan.to_string();
        assert!(text.contains("if #"));
        assert!(text.contains("divergent under active & cond#"));
        assert!(text.contains("promoted: a"));
    }
}
