// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-routine facts shared by every routine's unification.

use std::collections::{HashMap, HashSet};

use weft_ast::{ExprKind, Module, RoutineDecl, Stmt, StmtKind};

/// Purity of every routine in a module.
///
/// A routine is pure when running it once per lane cannot be told apart
/// from running it on each lane's value in isolation: no foreign calls, no
/// container access, no range blocks, and only pure callees. Recursive
/// routines are treated as impure.
#[derive(Debug, Clone, Default)]
pub struct ModuleFacts {
    pure: HashMap<String, bool>,
}

impl ModuleFacts {
    pub fn analyze(module: &Module) -> Self {
        let mut facts = ModuleFacts::default();
        for routine in &module.routines {
            let mut visiting = HashSet::new();
            facts.purity(module, routine, &mut visiting);
        }
        facts
    }

    pub fn is_pure(&self, routine: &str) -> bool {
        self.pure.get(routine).copied().unwrap_or(false)
    }

    fn purity(
        &mut self,
        module: &Module,
        routine: &RoutineDecl,
        visiting: &mut HashSet<String>,
    ) -> bool {
        if let Some(&known) = self.pure.get(&routine.name) {
            return known;
        }
        if !visiting.insert(routine.name.clone()) {
            return false;
        }

        let mut callees = Vec::new();
        let locally_pure = routine.params.iter().all(|p| !p.ty.is_container())
            && body_is_local(&routine.body, &mut callees);

        let pure = locally_pure
            && callees.iter().all(|name| match module.routine(name) {
                Some(callee) => self.purity(module, callee, visiting),
                None => false,
            });

        visiting.remove(&routine.name);
        self.pure.insert(routine.name.clone(), pure);
        pure
    }
}

fn body_is_local(body: &[Stmt], callees: &mut Vec<String>) -> bool {
    body.iter().all(|stmt| stmt_is_local(stmt, callees))
}

fn stmt_is_local(stmt: &Stmt, callees: &mut Vec<String>) -> bool {
    if matches!(
        stmt.kind,
        StmtKind::SimdRange { .. } | StmtKind::Container { .. }
    ) {
        return false;
    }
    let mut local = true;
    for expr in stmt.exprs() {
        expr.walk(&mut |e| match &e.kind {
            ExprKind::CCall { .. }
            | ExprKind::Index { .. }
            | ExprKind::LaneAt { .. }
            | ExprKind::Broadcast(_)
            | ExprKind::LaneIndex => local = false,
            ExprKind::Call { routine, .. } => callees.push(routine.clone()),
            _ => {}
        });
    }
    local && stmt.bodies().into_iter().all(|b| body_is_local(b, callees))
}
