// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Context classification and rejection tests for the unifier.

use indexmap::IndexSet;
use weft_ast::build::AstBuilder;
use weft_ast::{BinOp, Module, ReduceOp, Type};
use weft_types::{unify_routine, CallKind, ContextTable, ExecContext, ModuleFacts, RoutineMode, Shape, TypeError};

fn unify(module: &Module, name: &str, mode: RoutineMode) -> Result<ContextTable, TypeError> {
    let facts = ModuleFacts::analyze(module);
    let routine = module.routine(name).expect("routine exists");
    unify_routine(module, routine, mode, &IndexSet::new(), &facts)
}

fn module(routines: Vec<weft_ast::RoutineDecl>) -> Module {
    Module {
        routines,
        ..Module::default()
    }
}

/// `routine square(int x) -> int y: y = x * x`
fn square(b: &mut AstBuilder, is_simd: bool) -> weft_ast::RoutineDecl {
    let x = b.var("x", Type::int());
    let x2 = b.var("x", Type::int());
    let mul = b.binary(BinOp::Mul, x, x2);
    let y = b.var("y", Type::int());
    let set = b.assign(y, mul);
    let p = b.param("x", Type::int());
    let s = b.slot("y", Type::int());
    b.routine("square", is_simd, vec![p], vec![s], vec![set])
}

// ── Calls ──────────────────────────────────────────────────────────

#[test]
fn pure_non_simd_routine_runs_per_lane() {
    let mut b = AstBuilder::new();
    let sq = square(&mut b, false);
    let a = b.var("a", Type::int());
    let call = b.call("square", vec![a], Type::int());
    let call_id = call.id;
    let r = b.var("r", Type::int());
    let set = b.assign(r, call);
    let p = b.param("a", Type::int());
    let s = b.slot("r", Type::int());
    let f = b.routine("f", true, vec![p], vec![s], vec![set]);
    let m = module(vec![sq, f]);

    let table = unify(&m, "f", RoutineMode::Vector).unwrap();
    assert_eq!(table.call_kind(call_id), Some(CallKind::PerLane));
    assert_eq!(table.shape(call_id), Shape::Vector);
}

#[test]
fn uniform_call_of_pure_routine_stays_scalar() {
    let mut b = AstBuilder::new();
    let sq = square(&mut b, true);
    let n = b.var("n", Type::int());
    let call = b.call("square", vec![n], Type::int());
    let call_id = call.id;
    let k = b.let_("k", Type::int(), Some(call));
    let p = b.scalar_param("n", Type::int());
    let f = b.routine("f", true, vec![p], vec![], vec![k]);
    let m = module(vec![sq, f]);

    let table = unify(&m, "f", RoutineMode::Vector).unwrap();
    assert_eq!(table.call_kind(call_id), Some(CallKind::Scalar));
    assert_eq!(table.var("k").unwrap().shape, Shape::Scalar);
}

#[test]
fn impure_non_simd_routine_rejected_in_vector_code() {
    let mut b = AstBuilder::new();
    let now = b.c_call("clock", vec![], Type::int());
    let t = b.var("t", Type::int());
    let set = b.assign(t, now);
    let s = b.slot("t", Type::int());
    let timed = b.routine("timed", false, vec![], vec![s], vec![set]);

    let call = b.call("timed", vec![], Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, call);
    let s = b.slot("r", Type::int());
    let f = b.routine("f", true, vec![], vec![s], vec![set]);
    let m = module(vec![timed, f]);

    let err = unify(&m, "f", RoutineMode::Vector).unwrap_err();
    assert!(matches!(err, TypeError::NonSimdCall { ref routine, .. } if routine == "timed"));
    // The scalar twin is fine.
    assert!(unify(&m, "f", RoutineMode::Scalar).is_ok());
}

#[test]
fn vector_argument_to_scalar_parameter_rejected() {
    let mut b = AstBuilder::new();
    let n = b.var("n", Type::int());
    let e = b.expr_stmt(n);
    let p = b.scalar_param("n", Type::int());
    let g = b.routine("g", true, vec![p], vec![], vec![e]);

    let a = b.var("a", Type::int());
    let call = b.call("g", vec![a], Type::Void);
    let stmt = b.expr_stmt(call);
    let p = b.param("a", Type::int());
    let f = b.routine("f", true, vec![p], vec![], vec![stmt]);
    let m = module(vec![g, f]);

    let err = unify(&m, "f", RoutineMode::Vector).unwrap_err();
    assert!(matches!(err, TypeError::VectorInScalarPosition { .. }));
}

// ── Scalar positions ───────────────────────────────────────────────

#[test]
fn vector_into_scalar_parameter_requires_reduction() {
    let mut b = AstBuilder::new();
    let a = b.var("a", Type::int());
    let n = b.var("n", Type::int());
    let bad = b.assign(n, a);
    let p = b.param("a", Type::int());
    let q = b.scalar_param("n", Type::int());
    let f = b.routine("f", true, vec![p, q], vec![], vec![bad]);
    let m = module(vec![f]);
    let err = unify(&m, "f", RoutineMode::Vector).unwrap_err();
    assert!(matches!(err, TypeError::VectorInScalarPosition { ref what, .. } if what.contains("`n`")));

    // With an explicit reduction the same assignment is accepted.
    let mut b = AstBuilder::new();
    let a = b.var("a", Type::int());
    let sum = b.reduce(ReduceOp::Sum, a);
    let n = b.var("n", Type::int());
    let ok = b.assign(n, sum);
    let p = b.param("a", Type::int());
    let q = b.scalar_param("n", Type::int());
    let f = b.routine("f", true, vec![p, q], vec![], vec![ok]);
    let m = module(vec![f]);
    let table = unify(&m, "f", RoutineMode::Vector).unwrap();
    assert_eq!(table.var("n").unwrap().shape, Shape::Scalar);
}

#[test]
fn lane_access_outside_range_rejected() {
    let mut b = AstBuilder::new();
    let c = b.var("c", Type::container(Type::int()));
    let at = b.lane_at(c);
    let x = b.var("x", Type::int());
    let set = b.assign(x, at);
    let p = b.param("c", Type::container(Type::int()));
    let s = b.slot("x", Type::int());
    let f = b.routine("f", false, vec![p], vec![s], vec![set]);
    let m = module(vec![f]);
    let err = unify(&m, "f", RoutineMode::Scalar).unwrap_err();
    assert!(matches!(err, TypeError::LaneAccessOutsideSimd { .. }));
}

#[test]
fn broadcast_in_scalar_code_rejected() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let wide = b.broadcast(one);
    let x = b.let_("x", Type::int(), Some(wide));
    let f = b.routine("f", false, vec![], vec![], vec![x]);
    let m = module(vec![f]);
    let err = unify(&m, "f", RoutineMode::Scalar).unwrap_err();
    assert!(matches!(err, TypeError::LaneAccessOutsideSimd { .. }));
}

// ── Range blocks ───────────────────────────────────────────────────

fn range_writing_outer(b: &mut AstBuilder, value_is_lane: bool) -> Module {
    let zero = b.int(0);
    let total = b.let_("total", Type::int(), Some(zero));
    let value = if value_is_lane {
        let c = b.var("c", Type::container(Type::int()));
        b.lane_at(c)
    } else {
        b.int(7)
    };
    let t = b.var("total", Type::int());
    let set = b.assign(t, value);
    let lo = b.int(0);
    let hi = b.int(16);
    let range = b.simd_range(Some("i"), lo, hi, vec![set]);
    let p = b.param("c", Type::container(Type::int()));
    let f = b.routine("f", false, vec![p], vec![], vec![total, range]);
    module(vec![f])
}

#[test]
fn range_body_is_vector_context() {
    let mut b = AstBuilder::new();
    let m = range_writing_outer(&mut b, false);
    let table = unify(&m, "f", RoutineMode::Scalar).unwrap();
    let body_stmt = match &m.routines[0].body[1].kind {
        weft_ast::StmtKind::SimdRange { body, .. } => body[0].id,
        _ => unreachable!(),
    };
    assert_eq!(table.context(body_stmt), ExecContext::Vector);
    assert_eq!(table.context(m.routines[0].body[0].id), ExecContext::Scalar);
    assert_eq!(table.var("i").unwrap().shape, Shape::Vector);
    // Uniform writes to an outer variable are allowed.
    assert_eq!(table.var("total").unwrap().shape, Shape::Scalar);
}

#[test]
fn per_lane_write_to_outer_variable_rejected() {
    let mut b = AstBuilder::new();
    let m = range_writing_outer(&mut b, true);
    let err = unify(&m, "f", RoutineMode::Scalar).unwrap_err();
    assert!(matches!(err, TypeError::VectorInScalarPosition { .. }));
}

#[test]
fn range_inside_simd_routine_is_nested() {
    let mut b = AstBuilder::new();
    let lo = b.int(0);
    let hi = b.int(8);
    let range = b.simd_range(None, lo, hi, vec![]);
    let f = b.routine("f", true, vec![], vec![], vec![range]);
    let m = module(vec![f]);
    let err = unify(&m, "f", RoutineMode::Vector).unwrap_err();
    assert!(matches!(err, TypeError::NestedSimdBlock { .. }));
}

#[test]
fn indexing_non_container_rejected() {
    let mut b = AstBuilder::new();
    let x = b.var("x", Type::int());
    let zero = b.int(0);
    let idx = b.index(x, zero);
    let stmt = b.expr_stmt(idx);
    let p = b.param("x", Type::int());
    let f = b.routine("f", false, vec![p], vec![], vec![stmt]);
    let m = module(vec![f]);
    let err = unify(&m, "f", RoutineMode::Scalar).unwrap_err();
    assert!(matches!(err, TypeError::NotAContainer { ref name, .. } if name == "x"));
}
