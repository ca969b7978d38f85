// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Routines the pipeline must refuse, and how refusal is reported.

mod common;

use common::{lower_ok, module};
use weft_ast::build::AstBuilder;
use weft_ast::{BinOp, RoutineDecl, ScalarKind, Type};
use weft_simd::{
    lower_module, AbiError, DivergenceError, ForeignCallPolicy, LayoutError, LoweringConfig,
    LoweringError,
};
use weft_types::TypeError;

/// `simd routine noisy(x: int) -> (r: int)` calling `c_call("rand")`,
/// under `if x > 0` when `divergent`.
fn noisy(b: &mut AstBuilder, divergent: bool) -> RoutineDecl {
    let call = b.c_call("rand", vec![], Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, call);
    let body = if divergent {
        let x = b.var("x", Type::int());
        let zero = b.int(0);
        let cond = b.binary(BinOp::Gt, x, zero);
        vec![b.if_(cond, vec![set], vec![])]
    } else {
        vec![set]
    };
    let p = b.param("x", Type::int());
    let s = b.slot("r", Type::int());
    b.routine("noisy", true, vec![p], vec![s], body)
}

fn first_error(module: &weft_ast::Module, config: &LoweringConfig) -> LoweringError {
    let output = lower_module(module, config);
    output
        .failures
        .into_iter()
        .next()
        .map(|f| f.error)
        .expect("lowering should fail")
}

// ── Contexts and signatures ────────────────────────────────────────

#[test]
fn per_lane_value_into_scalar_parameter() {
    // simd routine f(x: int, scalar n: int): n = x
    let mut b = AstBuilder::new();
    let x = b.var("x", Type::int());
    let n = b.var("n", Type::int());
    let set = b.assign(n, x);
    let px = b.param("x", Type::int());
    let pn = b.scalar_param("n", Type::int());
    let f = b.routine("f", true, vec![px, pn], vec![], vec![set]);
    let m = module(vec![], vec![f]);

    let err = first_error(&m, &LoweringConfig::default());
    assert!(
        matches!(
            err,
            LoweringError::Type(TypeError::VectorInScalarPosition { .. })
        ),
        "got {}",
        err
    );
}

#[test]
fn scalar_inout_on_simd_routine() {
    let mut b = AstBuilder::new();
    let mut acc = b.inout_param("acc", Type::int());
    acc.is_scalar = true;
    let f = b.routine("bump", true, vec![acc], vec![], vec![]);
    let m = module(vec![], vec![f]);

    let err = first_error(&m, &LoweringConfig::default());
    assert!(matches!(
        err,
        LoweringError::Abi(AbiError::UniformInout { ref param, .. }) if param == "acc"
    ));
}

#[test]
fn call_with_missing_argument() {
    // routine id(x: int) -> (r: int): r = x
    // simd routine g() -> (r: int): r = id()
    let mut b = AstBuilder::new();
    let x = b.var("x", Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, x);
    let p = b.param("x", Type::int());
    let s = b.slot("r", Type::int());
    let id = b.routine("id", false, vec![p], vec![s], vec![set]);

    let call = b.call("id", vec![], Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, call);
    let s = b.slot("r", Type::int());
    let g = b.routine("g", true, vec![], vec![s], vec![set]);
    let m = module(vec![], vec![id, g]);

    let output = lower_module(&m, &LoweringConfig::default());
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].routine, "g");
    assert!(matches!(
        output.failures[0].error,
        LoweringError::Abi(AbiError::ParamArity {
            expected: 1,
            found: 0,
            ..
        })
    ));
}

// ── Divergence ─────────────────────────────────────────────────────

#[test]
fn foreign_call_under_divergence_is_rejected() {
    let mut b = AstBuilder::new();
    let m = module(vec![], vec![noisy(&mut b, true)]);
    let err = first_error(&m, &LoweringConfig::default());
    assert!(
        matches!(
            err,
            LoweringError::Divergence(DivergenceError::ForeignCallUnderDivergence { ref name, .. }) if name == "rand"
        ),
        "got {}",
        err
    );
}

#[test]
fn reject_policy_refuses_every_vector_foreign_call() {
    let mut b = AstBuilder::new();
    let m = module(vec![], vec![noisy(&mut b, false)]);
    lower_ok(&m, &LoweringConfig::default());

    let config = LoweringConfig {
        foreign_calls: ForeignCallPolicy::Reject,
        ..LoweringConfig::default()
    };
    let err = first_error(&m, &config);
    assert!(matches!(
        err,
        LoweringError::Divergence(DivergenceError::ForeignCallRejected { .. })
    ));
}

#[test]
fn scalar_parameter_written_under_divergence() {
    // simd routine f(x: int, scalar n: int): if x > 0: n = 1
    let mut b = AstBuilder::new();
    let x = b.var("x", Type::int());
    let zero = b.int(0);
    let cond = b.binary(BinOp::Gt, x, zero);
    let n = b.var("n", Type::int());
    let one = b.int(1);
    let set = b.assign(n, one);
    let branch = b.if_(cond, vec![set], vec![]);
    let px = b.param("x", Type::int());
    let pn = b.scalar_param("n", Type::int());
    let f = b.routine("f", true, vec![px, pn], vec![], vec![branch]);
    let m = module(vec![], vec![f]);

    let err = first_error(&m, &LoweringConfig::default());
    assert!(matches!(
        err,
        LoweringError::Divergence(DivergenceError::UniformAssignUnderDivergence { ref name, .. }) if name == "n"
    ));
    assert!(err.span().is_some());
}

// ── Lane widths ────────────────────────────────────────────────────

#[test]
fn mixed_element_widths_are_ambiguous() {
    // simd routine mix(a: int, d: real64) -> (r: int): r = a
    let mut b = AstBuilder::new();
    let a = b.var("a", Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, a);
    let pa = b.param("a", Type::int());
    let pd = b.param("d", Type::Scalar(ScalarKind::Real64));
    let s = b.slot("r", Type::int());
    let f = b.routine("mix", true, vec![pa, pd], vec![s], vec![set]);
    let m = module(vec![], vec![f]);

    let err = first_error(&m, &LoweringConfig::default());
    match err {
        LoweringError::Layout(LayoutError::AmbiguousLaneWidth { mut widths, .. }) => {
            widths.sort_unstable();
            assert_eq!(widths, vec![2, 4]);
        }
        other => panic!("expected an ambiguous width, got {}", other),
    }
}

#[test]
fn vector_call_across_widths_is_rejected() {
    // simd routine half(x: real64) -> (y: real64): y = x
    // simd routine caller(x: int) -> (r: int): r = int(half(real64(x)))
    let real64 = Type::Scalar(ScalarKind::Real64);
    let mut b = AstBuilder::new();
    let x = b.var("x", real64.clone());
    let y = b.var("y", real64.clone());
    let set = b.assign(y, x);
    let px = b.param("x", real64.clone());
    let sy = b.slot("y", real64.clone());
    let half = b.routine("half", true, vec![px], vec![sy], vec![set]);

    let x = b.var("x", Type::int());
    let widened = b.convert(x, real64.clone());
    let call = b.call("half", vec![widened], real64);
    let narrowed = b.convert(call, Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, narrowed);
    let px = b.param("x", Type::int());
    let sr = b.slot("r", Type::int());
    let caller = b.routine("caller", true, vec![px], vec![sr], vec![set]);
    let m = module(vec![], vec![half, caller]);

    let output = lower_module(&m, &LoweringConfig::default());
    assert_eq!(output.failures.len(), 1);
    let failure = &output.failures[0];
    assert_eq!(failure.routine, "caller");
    assert!(matches!(
        failure.error,
        LoweringError::Layout(LayoutError::LaneWidthMismatch {
            expected: 4,
            found: 2,
            ..
        })
    ));
    assert!(output.function("half.simd2").is_some());
}

// ── Module driver ──────────────────────────────────────────────────

#[test]
fn one_failing_routine_does_not_stop_the_rest() {
    let mut b = AstBuilder::new();
    let bad = noisy(&mut b, true);
    let x = b.var("x", Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, x);
    let p = b.param("x", Type::int());
    let s = b.slot("r", Type::int());
    let good = b.routine("copy", true, vec![p], vec![s], vec![set]);
    let m = module(vec![], vec![bad, good]);

    let output = lower_module(&m, &LoweringConfig::default());
    assert!(!output.is_ok());
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].routine, "noisy");
    assert_eq!(output.routines.len(), 1);
    assert!(output.function("copy").is_some());
    assert!(output.function("copy.simd4").is_some());
}

#[test]
fn invalid_policy_fails_every_routine() {
    let mut b = AstBuilder::new();
    let x = b.var("x", Type::int());
    let r = b.var("r", Type::int());
    let set = b.assign(r, x);
    let p = b.param("x", Type::int());
    let s = b.slot("r", Type::int());
    let f = b.routine("copy", true, vec![p], vec![s], vec![set]);
    let m = module(vec![], vec![f]);
    let config: LoweringConfig =
        serde_json::from_str(r#"{ "lane_width": { "kind": "fixed", "lanes": 0 } }"#).unwrap();

    let err = first_error(&m, &config);
    assert!(matches!(
        err,
        LoweringError::Layout(LayoutError::InvalidPolicy { .. })
    ));
}
