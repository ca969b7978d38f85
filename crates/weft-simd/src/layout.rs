// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lane-width and memory-layout planning.
//!
//! A primitive of `s` bytes gets `bytes / s` lanes under the register
//! policy. A class adopts the width of its fields, which must agree;
//! `bool` fields take their siblings' width. Per-lane class values are
//! stored one array per field (SoA); uniform class values and the public
//! entry shim keep one contiguous instance per slot (AoS).

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use weft_ast::{ClassDecl, Expr, ExprKind, Module, NodeId, RoutineDecl, ScalarKind, Span, Stmt, StmtKind, Type};
use weft_types::{ContextTable, Region, RoutineMode, Shape, VarOrigin};
use weft_vir::{VirFunction, VirOperand, VirRValue, VirStmt, VirType};

pub use weft_vir::AggregateLayout;

use crate::{LaneWidthPolicy, LayoutError};

/// Lanes a per-lane `kind` occupies. `None` for `bool` under the register
/// policy: it has no width of its own.
pub fn scalar_lanes(kind: ScalarKind, policy: LaneWidthPolicy) -> Option<u32> {
    match policy {
        LaneWidthPolicy::Fixed { lanes } => Some(lanes),
        LaneWidthPolicy::Register { .. } if kind.is_bool() => None,
        LaneWidthPolicy::Register { bytes } => Some((bytes / kind.size()).max(1)),
    }
}

fn class_fields(class: &ClassDecl) -> Result<Vec<ScalarKind>, LayoutError> {
    class
        .fields
        .iter()
        .map(|field| {
            field.ty.as_scalar().ok_or_else(|| LayoutError::NestedAggregate {
                class: class.name.clone(),
                field: field.name.clone(),
                span: class.span,
            })
        })
        .collect()
}

/// Lane count of a batch of `class` values.
pub fn class_lanes(class: &ClassDecl, policy: LaneWidthPolicy, span: Span) -> Result<u32, LayoutError> {
    if !class.is_simd {
        return Err(LayoutError::NotSimdClass {
            class: class.name.clone(),
            span,
        });
    }
    let mut widths = Vec::new();
    for kind in class_fields(class)? {
        if let Some(w) = scalar_lanes(kind, policy) {
            if !widths.contains(&w) {
                widths.push(w);
            }
        }
    }
    match widths.as_slice() {
        [] => Ok(match policy {
            LaneWidthPolicy::Fixed { lanes } => lanes,
            LaneWidthPolicy::Register { bytes } => bytes,
        }),
        [w] => Ok(*w),
        _ => {
            widths.sort_unstable();
            Err(LayoutError::NotVectorizable {
                class: class.name.clone(),
                widths,
                span: class.span,
            })
        }
    }
}

/// Lanes a per-lane value of `ty` needs, if its type fixes one.
pub fn type_lanes(
    module: &Module,
    ty: &Type,
    policy: LaneWidthPolicy,
    span: Span,
) -> Result<Option<u32>, LayoutError> {
    match ty {
        Type::Void => Ok(None),
        Type::Scalar(kind) => Ok(scalar_lanes(*kind, policy)),
        Type::Class(name) => {
            let class = module.class(name).ok_or_else(|| LayoutError::UnknownClass {
                class: name.clone(),
                span,
            })?;
            class_lanes(class, policy, span).map(Some)
        }
        Type::Container(elem) => type_lanes(module, elem, policy, span),
    }
}

/// Concrete VIR type of a value of `ty` with `shape`, in code running
/// `lanes` lanes.
pub fn value_type(
    module: &Module,
    ty: &Type,
    shape: Shape,
    lanes: u32,
    span: Span,
) -> Result<VirType, LayoutError> {
    Ok(match ty {
        Type::Void => VirType::Void,
        Type::Scalar(kind) if shape.is_vector() => VirType::vector(*kind, lanes),
        Type::Scalar(kind) => VirType::Scalar(*kind),
        Type::Class(name) => {
            let class = module.class(name).ok_or_else(|| LayoutError::UnknownClass {
                class: name.clone(),
                span,
            })?;
            let fields = class_fields(class)?;
            if shape.is_vector() {
                if !class.is_simd {
                    return Err(LayoutError::NotSimdClass {
                        class: name.clone(),
                        span,
                    });
                }
                VirType::Aggregate {
                    class: name.clone(),
                    fields,
                    lanes,
                    layout: AggregateLayout::Soa,
                }
            } else {
                VirType::Aggregate {
                    class: name.clone(),
                    fields,
                    lanes: 1,
                    layout: AggregateLayout::Aos,
                }
            }
        }
        Type::Container(elem) => VirType::Buffer {
            elem: Box::new(value_type(module, elem, Shape::Scalar, 1, span)?),
        },
    })
}

fn pick(mut widths: Vec<u32>, fallback: u32, span: Span) -> Result<u32, LayoutError> {
    match widths.len() {
        0 => Ok(fallback),
        1 => Ok(widths[0]),
        _ => {
            widths.sort_unstable();
            Err(LayoutError::AmbiguousLaneWidth { widths, span })
        }
    }
}

fn push_width(widths: &mut Vec<u32>, width: Option<u32>) {
    if let Some(w) = width {
        if !widths.contains(&w) {
            widths.push(w);
        }
    }
}

/// Width of a routine's vector variant: the width every per-lane variable
/// of the body agrees on. Range index variables adopt it.
pub fn routine_lanes(
    module: &Module,
    routine: &RoutineDecl,
    table: &ContextTable,
    policy: LaneWidthPolicy,
) -> Result<u32, LayoutError> {
    let mut widths = Vec::new();
    for (_, var) in table.vars() {
        if var.shape.is_vector() && var.origin != VarOrigin::RangeIndex {
            push_width(&mut widths, type_lanes(module, &var.ty, policy, routine.span)?);
        }
    }
    pick(widths, policy.fallback_lanes(), routine.span)
}

fn range_lanes(
    module: &Module,
    range: &Stmt,
    body: &[Stmt],
    table: &ContextTable,
    policy: LaneWidthPolicy,
) -> Result<u32, LayoutError> {
    let mut widths = Vec::new();
    for (_, var) in table.vars() {
        if var.region == Region::Range(range.id)
            && var.shape.is_vector()
            && var.origin != VarOrigin::RangeIndex
        {
            push_width(&mut widths, type_lanes(module, &var.ty, policy, range.span)?);
        }
    }

    let mut containers = Vec::new();
    each_stmt(body, &mut |stmt| {
        for e in stmt.exprs() {
            e.walk(&mut |e: &Expr| {
                if let ExprKind::LaneAt { container } = &e.kind {
                    if let ExprKind::Ident(name) = &container.kind {
                        containers.push(name.clone());
                    }
                }
            });
        }
    });
    for name in containers {
        if let Some(var) = table.var(&name) {
            push_width(&mut widths, type_lanes(module, &var.ty, policy, range.span)?);
        }
    }
    pick(widths, policy.fallback_lanes(), range.span)
}

fn each_stmt<'a>(body: &'a [Stmt], f: &mut dyn FnMut(&'a Stmt)) {
    for stmt in body {
        f(stmt);
        for inner in stmt.bodies() {
            each_stmt(inner, f);
        }
    }
}

/// Whether a range block over `[lo, hi)` needs a tail mask. Constant bounds
/// whose length divides evenly into batches do not.
pub fn needs_tail_mask(lo: &Expr, hi: &Expr, lanes: u32) -> bool {
    match (&lo.kind, &hi.kind) {
        (ExprKind::Int(lo), ExprKind::Int(hi)) => match hi.checked_sub(*lo) {
            Some(len) => len < 0 || len % i64::from(lanes) != 0,
            None => true,
        },
        _ => true,
    }
}

/// Lane widths chosen for one routine variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPlan {
    routine_lanes: Option<u32>,
    ranges: IndexMap<NodeId, u32>,
}

impl LayoutPlan {
    /// Width of the vector variant; `None` for scalar variants.
    pub fn routine_lanes(&self) -> Option<u32> {
        self.routine_lanes
    }

    pub fn range_lanes(&self, range: NodeId) -> Option<u32> {
        self.ranges.get(&range).copied()
    }

    pub fn ranges(&self) -> impl Iterator<Item = (NodeId, u32)> + '_ {
        self.ranges.iter().map(|(id, w)| (*id, *w))
    }
}

impl fmt::Display for LayoutPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(lanes) = self.routine_lanes {
            writeln!(f, "vector variant: {} lanes", lanes)?;
        }
        for (id, lanes) in &self.ranges {
            writeln!(f, "simd block {}: {} lanes", id, lanes)?;
        }
        Ok(())
    }
}

pub fn plan_layout(
    module: &Module,
    routine: &RoutineDecl,
    table: &ContextTable,
    policy: LaneWidthPolicy,
) -> Result<LayoutPlan, LayoutError> {
    let routine_lanes = match table.mode {
        RoutineMode::Vector => Some(routine_lanes(module, routine, table, policy)?),
        RoutineMode::Scalar => None,
    };

    let mut found = Vec::new();
    each_stmt(&routine.body, &mut |stmt| {
        if let StmtKind::SimdRange { body, .. } = &stmt.kind {
            found.push((stmt, body.as_slice()));
        }
    });
    let mut ranges = IndexMap::new();
    for (stmt, body) in found {
        ranges.insert(stmt.id, range_lanes(module, stmt, body, table, policy)?);
    }

    Ok(LayoutPlan {
        routine_lanes,
        ranges,
    })
}

// ── Verification ───────────────────────────────────────────────────

fn is_aos_batch(ty: &VirType) -> bool {
    matches!(
        ty,
        VirType::Aggregate {
            layout: AggregateLayout::Aos,
            lanes,
            ..
        } if *lanes > 1
    )
}

/// Check that no statement consumes a composite batch in the wrong layout.
/// Every AoS/SoA crossing must be an explicit `Transpose`.
pub fn verify_layouts(functions: &[&VirFunction]) -> Result<(), LayoutError> {
    verify_calls_into(functions, functions)
}

/// `verify_layouts` for `functions` alone, resolving their calls among
/// `callees`.
pub fn verify_calls_into(functions: &[&VirFunction], callees: &[&VirFunction]) -> Result<(), LayoutError> {
    let by_name: HashMap<&str, &VirFunction> =
        callees.iter().map(|f| (f.name.as_str(), *f)).collect();
    for func in functions {
        verify_function(func, &by_name)?;
    }
    Ok(())
}

fn verify_function(func: &VirFunction, by_name: &HashMap<&str, &VirFunction>) -> Result<(), LayoutError> {
    let ty_of = |op: &VirOperand| op.as_local().and_then(|id| func.local(id)).map(|l| &l.ty);
    let fail = |detail: String| LayoutError::ImplicitCrossing {
        function: func.name.clone(),
        detail,
    };

    for stmt in func.statements() {
        match stmt {
            VirStmt::Assign { dst, rvalue } => {
                let dst_ty = func.local(*dst).map(|l| &l.ty);
                match rvalue {
                    VirRValue::Use(op) => {
                        if let (Some(from), Some(to)) = (ty_of(op), dst_ty) {
                            if from != to {
                                return Err(fail(format!("`{}` copied into `{}`", from, to)));
                            }
                        }
                    }
                    VirRValue::FieldGet { base, .. } | VirRValue::FieldSet { base, .. } => {
                        if let Some(ty) = ty_of(base).filter(|t| is_aos_batch(t)) {
                            return Err(fail(format!("field access on `{}`", ty)));
                        }
                    }
                    VirRValue::Select {
                        then_value,
                        else_value,
                        ..
                    } => {
                        for op in [then_value, else_value] {
                            if let Some(ty) = ty_of(op).filter(|t| is_aos_batch(t)) {
                                return Err(fail(format!("lane select on `{}`", ty)));
                            }
                        }
                    }
                    VirRValue::Splat { value, .. } => {
                        if let Some(ty) = ty_of(value).filter(|t| t.is_batch()) {
                            return Err(fail(format!("broadcast of batch `{}`", ty)));
                        }
                    }
                    VirRValue::Compose { .. } => {
                        if let Some(ty) = dst_ty.filter(|t| is_aos_batch(t)) {
                            return Err(fail(format!("field-wise construction of `{}`", ty)));
                        }
                    }
                    _ => {}
                }
            }
            VirStmt::Call { func: callee, args, .. } if !callee.is_extern => {
                let Some(target) = by_name.get(callee.name.as_str()) else {
                    continue;
                };
                for (arg, param) in args.iter().zip(&target.params) {
                    if let Some(ty) = ty_of(arg) {
                        if ty != &param.ty {
                            return Err(fail(format!(
                                "`{}` passed where `{}` expects `{}`",
                                ty, callee.name, param.ty
                            )));
                        }
                    }
                }
            }
            VirStmt::LoadBatch { dst, .. } => {
                if let Some(ty) = func.local(*dst).map(|l| &l.ty).filter(|t| is_aos_batch(t)) {
                    return Err(fail(format!("container batch loaded as `{}`", ty)));
                }
            }
            VirStmt::StoreBatch { value, .. } => {
                if let Some(ty) = ty_of(value).filter(|t| is_aos_batch(t)) {
                    return Err(fail(format!("container batch stored from `{}`", ty)));
                }
            }
            VirStmt::Transpose { dst, src, to } => {
                let src_layout = match ty_of(src) {
                    Some(VirType::Aggregate { layout, .. }) => Some(*layout),
                    _ => None,
                };
                let dst_layout = match func.local(*dst).map(|l| &l.ty) {
                    Some(VirType::Aggregate { layout, .. }) => Some(*layout),
                    _ => None,
                };
                if src_layout == Some(*to) || dst_layout != Some(*to) {
                    return Err(fail(format!("transpose to {} between mismatched operands", to)));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::build::AstBuilder;
    use weft_vir::{BlockBuilder, FunctionRef, VirTerminator};

    const REG16: LaneWidthPolicy = LaneWidthPolicy::Register { bytes: 16 };

    fn class(b: &mut AstBuilder, fields: &[(&str, Type)]) -> ClassDecl {
        b.class("C", true, fields)
    }

    #[test]
    fn lanes_follow_element_size() {
        assert_eq!(scalar_lanes(ScalarKind::Int8, REG16), Some(16));
        assert_eq!(scalar_lanes(ScalarKind::Real32, REG16), Some(4));
        assert_eq!(scalar_lanes(ScalarKind::Real64, REG16), Some(2));
        assert_eq!(scalar_lanes(ScalarKind::Bool, REG16), None);
        assert_eq!(
            scalar_lanes(ScalarKind::Real64, LaneWidthPolicy::Fixed { lanes: 8 }),
            Some(8)
        );
    }

    #[test]
    fn bool_field_adopts_sibling_width() {
        let mut b = AstBuilder::new();
        let c = class(&mut b, &[("x", Type::real()), ("hit", Type::bool())]);
        assert_eq!(class_lanes(&c, REG16, c.span).unwrap(), 4);

        let flags = class(&mut b, &[("a", Type::bool()), ("b", Type::bool())]);
        assert_eq!(class_lanes(&flags, REG16, flags.span).unwrap(), 16);
    }

    #[test]
    fn mixed_widths_not_vectorizable() {
        let mut b = AstBuilder::new();
        let c = class(
            &mut b,
            &[
                ("x", Type::Scalar(ScalarKind::Real64)),
                ("y", Type::Scalar(ScalarKind::Int32)),
            ],
        );
        match class_lanes(&c, REG16, c.span) {
            Err(LayoutError::NotVectorizable { widths, .. }) => assert_eq!(widths, vec![2, 4]),
            other => panic!("expected NotVectorizable, got {:?}", other),
        }
    }

    #[test]
    fn composite_field_rejected() {
        let mut b = AstBuilder::new();
        let c = class(&mut b, &[("inner", Type::class("P"))]);
        assert!(matches!(
            class_lanes(&c, REG16, c.span),
            Err(LayoutError::NestedAggregate { ref field, .. }) if field == "inner"
        ));
    }

    #[test]
    fn per_lane_value_of_plain_class() {
        let mut b = AstBuilder::new();
        let c = b.class("P", false, &[("x", Type::real())]);
        let module = Module {
            classes: vec![c],
            ..Module::default()
        };
        let ty = Type::class("P");
        assert!(matches!(
            value_type(&module, &ty, Shape::Vector, 4, Span::default()),
            Err(LayoutError::NotSimdClass { .. })
        ));
        assert!(matches!(
            value_type(&module, &ty, Shape::Scalar, 4, Span::default()),
            Ok(VirType::Aggregate {
                lanes: 1,
                layout: AggregateLayout::Aos,
                ..
            })
        ));
    }

    #[test]
    fn tail_mask_only_when_needed() {
        let mut b = AstBuilder::new();
        let zero = b.int(0);
        let eight = b.int(8);
        let ten = b.int(10);
        let n = b.var("n", Type::int());
        assert!(!needs_tail_mask(&zero, &eight, 4));
        assert!(needs_tail_mask(&zero, &ten, 4));
        assert!(needs_tail_mask(&zero, &n, 4));

        let low = b.int(i64::MIN);
        let high = b.int(i64::MAX);
        assert!(needs_tail_mask(&low, &high, 4));
        assert!(needs_tail_mask(&high, &low, 4));
    }

    fn soa_point(lanes: u32, layout: AggregateLayout) -> VirType {
        VirType::Aggregate {
            class: "P".into(),
            fields: vec![ScalarKind::Real32, ScalarKind::Real32],
            lanes,
            layout,
        }
    }

    #[test]
    fn field_access_on_aos_batch_is_a_crossing() {
        let mut b = BlockBuilder::new("f".into(), vec![]);
        let p = b.add_param("p".into(), soa_point(4, AggregateLayout::Aos));
        let x = b.alloc_temp(VirType::vector(ScalarKind::Real32, 4));
        b.push_stmt(VirStmt::Assign {
            dst: x,
            rvalue: VirRValue::FieldGet {
                base: VirOperand::Local(p),
                field: 0,
            },
        });
        b.terminate(VirTerminator::Return { values: vec![] });
        let f = b.finish();
        assert!(matches!(
            verify_layouts(&[&f]),
            Err(LayoutError::ImplicitCrossing { .. })
        ));
    }

    #[test]
    fn explicit_transpose_passes() {
        let mut callee = BlockBuilder::new("g".into(), vec![]);
        callee.add_param("p".into(), soa_point(4, AggregateLayout::Soa));
        callee.terminate(VirTerminator::Return { values: vec![] });
        let callee = callee.finish();

        let mut b = BlockBuilder::new("f".into(), vec![]);
        let p = b.add_param("p".into(), soa_point(4, AggregateLayout::Aos));
        let t = b.alloc_temp(soa_point(4, AggregateLayout::Soa));
        b.push_stmt(VirStmt::Transpose {
            dst: t,
            src: VirOperand::Local(p),
            to: AggregateLayout::Soa,
        });
        b.push_stmt(VirStmt::Call {
            dsts: vec![],
            func: FunctionRef::internal("g".into()),
            args: vec![VirOperand::Local(t)],
        });
        b.terminate(VirTerminator::Return { values: vec![] });
        let ok = b.finish();
        assert!(verify_layouts(&[&ok, &callee]).is_ok());

        // Same call without the transpose.
        let mut b = BlockBuilder::new("h".into(), vec![]);
        let p = b.add_param("p".into(), soa_point(4, AggregateLayout::Aos));
        b.push_stmt(VirStmt::Call {
            dsts: vec![],
            func: FunctionRef::internal("g".into()),
            args: vec![VirOperand::Local(p)],
        });
        b.terminate(VirTerminator::Return { values: vec![] });
        let bad = b.finish();
        assert!(matches!(
            verify_layouts(&[&bad, &callee]),
            Err(LayoutError::ImplicitCrossing { ref function, .. }) if function == "h"
        ));
    }
}
