// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Side table produced by unification.

use std::collections::HashMap;

use indexmap::IndexMap;
use weft_ast::{Expr, NodeId, Type};

use crate::{EffectiveType, ExecContext, RoutineMode, Shape};

/// Scope a variable was declared in. Range blocks open their own region;
/// variables of an enclosing region stay uniform inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Routine,
    Range(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarOrigin {
    Param,
    InOutParam,
    ReturnSlot,
    Local,
    Container,
    RangeIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub ty: Type,
    pub shape: Shape,
    /// Pinned variables must stay uniform: `scalar` parameters and
    /// container handles.
    pub pinned: bool,
    pub region: Region,
    pub origin: VarOrigin,
}

/// How a call site runs in its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// One ordinary call producing uniform results.
    Scalar,
    /// Call of a `simd` routine's vector variant.
    Vector,
    /// One scalar call per active lane.
    PerLane,
}

#[derive(Debug, Clone)]
pub struct ContextTable {
    pub mode: RoutineMode,
    pub(crate) exprs: HashMap<NodeId, Shape>,
    pub(crate) stmts: HashMap<NodeId, ExecContext>,
    pub(crate) calls: HashMap<NodeId, CallKind>,
    pub(crate) vars: IndexMap<String, VarInfo>,
}

impl ContextTable {
    pub(crate) fn new(mode: RoutineMode) -> Self {
        Self {
            mode,
            exprs: HashMap::new(),
            stmts: HashMap::new(),
            calls: HashMap::new(),
            vars: IndexMap::new(),
        }
    }

    /// Shape of an expression. Nodes the unifier never visited are uniform.
    pub fn shape(&self, id: NodeId) -> Shape {
        self.exprs.get(&id).copied().unwrap_or(Shape::Scalar)
    }

    pub fn context(&self, stmt: NodeId) -> ExecContext {
        self.stmts.get(&stmt).copied().unwrap_or(ExecContext::Scalar)
    }

    pub fn call_kind(&self, call: NodeId) -> Option<CallKind> {
        self.calls.get(&call).copied()
    }

    pub fn var(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }

    /// Variables in declaration order.
    pub fn vars(&self) -> impl Iterator<Item = (&str, &VarInfo)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn effective_type(&self, expr: &Expr) -> EffectiveType {
        EffectiveType {
            base: expr.ty.clone(),
            shape: self.shape(expr.id),
        }
    }
}
