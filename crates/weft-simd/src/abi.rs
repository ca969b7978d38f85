// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Calling convention of the routine variants.
//!
//! Scalar variant: the routine's own name, parameters in declaration order.
//! Results are the return slots followed by the final values of the `inout`
//! parameters.
//!
//! Vector variant `name.simd<W>`: the caller's execution mask comes first,
//! then the parameters. Per-lane parameters are widened to `W` lanes with
//! classes in SoA order; `scalar` parameters and containers stay uniform.
//! Results as for the scalar variant, widened.
//!
//! AoS entry `name.simd<W>.aos`: the vector signature with per-lane classes
//! in AoS order. It transposes, calls the vector variant and transposes the
//! results back.

use std::fmt;

use weft_ast::{Expr, ExprKind, Module, Param, ParamMode, RoutineDecl, Stmt, StmtKind};
use weft_types::Shape;
use weft_vir::{
    AggregateLayout, BlockBuilder, FunctionRef, LocalId, VirFunction, VirOperand, VirStmt,
    VirTerminator, VirType,
};

use crate::layout::value_type;
use crate::{AbiError, LayoutError};

pub fn vector_name(routine: &str, lanes: u32) -> String {
    format!("{}.simd{}", routine, lanes)
}

pub fn aos_entry_name(routine: &str, lanes: u32) -> String {
    format!("{}.aos", vector_name(routine, lanes))
}

/// Parameters that stay uniform in the vector variant.
pub fn is_uniform_param(param: &Param) -> bool {
    param.is_scalar || param.ty.is_container()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    ExecMask,
    PerLane,
    Uniform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbiParam {
    pub name: String,
    pub ty: VirType,
    pub role: ParamRole,
    pub mode: ParamMode,
}

/// Where a result value comes from, as an index into the routine's return
/// slots or parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Slot(usize),
    InOut(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbiResult {
    pub name: String,
    pub ty: VirType,
    pub source: ResultSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineAbi {
    pub name: String,
    pub lanes: Option<u32>,
    pub params: Vec<AbiParam>,
    pub results: Vec<AbiResult>,
}

impl RoutineAbi {
    pub fn result_types(&self) -> Vec<VirType> {
        self.results.iter().map(|r| r.ty.clone()).collect()
    }
}

impl fmt::Display for RoutineAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if p.mode == ParamMode::InOut {
                write!(f, "inout ")?;
            }
            write!(f, "{}: {}", p.name, p.ty)?;
            if p.role == ParamRole::Uniform && self.lanes.is_some() {
                write!(f, " [uniform]")?;
            }
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", r.name, r.ty)?;
        }
        write!(f, ")")
    }
}

fn results(
    module: &Module,
    routine: &RoutineDecl,
    shape: Shape,
    lanes: u32,
) -> Result<Vec<AbiResult>, LayoutError> {
    let mut out = Vec::new();
    for (i, slot) in routine.returns.iter().enumerate() {
        out.push(AbiResult {
            name: slot.name.clone(),
            ty: value_type(module, &slot.ty, shape, lanes, routine.span)?,
            source: ResultSource::Slot(i),
        });
    }
    for (i, param) in routine.params.iter().enumerate() {
        if param.mode == ParamMode::InOut {
            out.push(AbiResult {
                name: param.name.clone(),
                ty: value_type(module, &param.ty, shape, lanes, param.span)?,
                source: ResultSource::InOut(i),
            });
        }
    }
    Ok(out)
}

pub fn scalar_abi(module: &Module, routine: &RoutineDecl) -> Result<RoutineAbi, LayoutError> {
    let params = routine
        .params
        .iter()
        .map(|p| {
            Ok(AbiParam {
                name: p.name.clone(),
                ty: value_type(module, &p.ty, Shape::Scalar, 1, p.span)?,
                role: ParamRole::Uniform,
                mode: p.mode,
            })
        })
        .collect::<Result<Vec<_>, LayoutError>>()?;
    Ok(RoutineAbi {
        name: routine.name.clone(),
        lanes: None,
        params,
        results: results(module, routine, Shape::Scalar, 1)?,
    })
}

pub fn vector_abi(
    module: &Module,
    routine: &RoutineDecl,
    lanes: u32,
) -> Result<RoutineAbi, LayoutError> {
    let mut params = vec![AbiParam {
        name: "exec_mask".to_string(),
        ty: VirType::Mask { lanes },
        role: ParamRole::ExecMask,
        mode: ParamMode::In,
    }];
    for p in &routine.params {
        let (role, shape) = if is_uniform_param(p) {
            (ParamRole::Uniform, Shape::Scalar)
        } else {
            (ParamRole::PerLane, Shape::Vector)
        };
        params.push(AbiParam {
            name: p.name.clone(),
            ty: value_type(module, &p.ty, shape, lanes, p.span)?,
            role,
            mode: p.mode,
        });
    }
    Ok(RoutineAbi {
        name: vector_name(&routine.name, lanes),
        lanes: Some(lanes),
        params,
        results: results(module, routine, Shape::Vector, lanes)?,
    })
}

fn to_aos(ty: &VirType) -> Option<VirType> {
    match ty {
        VirType::Aggregate {
            class,
            fields,
            lanes,
            layout: AggregateLayout::Soa,
        } => Some(VirType::Aggregate {
            class: class.clone(),
            fields: fields.clone(),
            lanes: *lanes,
            layout: AggregateLayout::Aos,
        }),
        _ => None,
    }
}

/// Signature of the AoS entry, or `None` when no class crosses the
/// boundary and the vector variant can be called directly.
pub fn aos_entry_abi(vector: &RoutineAbi) -> Option<RoutineAbi> {
    let lanes = vector.lanes?;
    let mut crossed = false;
    let params = vector
        .params
        .iter()
        .map(|p| match to_aos(&p.ty) {
            Some(ty) => {
                crossed = true;
                AbiParam { ty, ..p.clone() }
            }
            None => p.clone(),
        })
        .collect();
    let results = vector
        .results
        .iter()
        .map(|r| match to_aos(&r.ty) {
            Some(ty) => {
                crossed = true;
                AbiResult { ty, ..r.clone() }
            }
            None => r.clone(),
        })
        .collect();
    let name = vector.name.strip_suffix(&format!(".simd{}", lanes))?;
    crossed.then(|| RoutineAbi {
        name: aos_entry_name(name, lanes),
        lanes: Some(lanes),
        params,
        results,
    })
}

/// Build the AoS entry shim for a vector variant.
pub fn emit_aos_entry(
    module: &Module,
    routine: &RoutineDecl,
    lanes: u32,
) -> Result<Option<VirFunction>, LayoutError> {
    let vector = vector_abi(module, routine, lanes)?;
    let Some(entry) = aos_entry_abi(&vector) else {
        return Ok(None);
    };

    let mut b = BlockBuilder::new(entry.name.clone(), entry.result_types());
    let mut args = Vec::with_capacity(entry.params.len());
    for (outer, inner) in entry.params.iter().zip(&vector.params) {
        let local = b.add_param(outer.name.clone(), outer.ty.clone());
        if outer.ty == inner.ty {
            args.push(VirOperand::Local(local));
        } else {
            let soa = b.alloc_temp(inner.ty.clone());
            b.push_stmt(VirStmt::Transpose {
                dst: soa,
                src: VirOperand::Local(local),
                to: AggregateLayout::Soa,
            });
            args.push(VirOperand::Local(soa));
        }
    }

    let dsts: Vec<LocalId> = vector
        .results
        .iter()
        .map(|r| b.alloc_temp(r.ty.clone()))
        .collect();
    b.push_stmt(VirStmt::Call {
        dsts: dsts.clone(),
        func: FunctionRef::internal(vector.name.clone()),
        args,
    });

    let mut values = Vec::with_capacity(dsts.len());
    for (outer, dst) in entry.results.iter().zip(dsts) {
        if b.local_type(dst) == Some(&outer.ty) {
            values.push(VirOperand::Local(dst));
        } else {
            let aos = b.alloc_temp(outer.ty.clone());
            b.push_stmt(VirStmt::Transpose {
                dst: aos,
                src: VirOperand::Local(dst),
                to: AggregateLayout::Aos,
            });
            values.push(VirOperand::Local(aos));
        }
    }
    b.terminate(VirTerminator::Return { values });
    Ok(Some(b.finish()))
}

// ── Checks ─────────────────────────────────────────────────────────

pub fn check_declaration(routine: &RoutineDecl) -> Result<(), AbiError> {
    if !routine.is_simd {
        return Ok(());
    }
    for param in &routine.params {
        if param.mode == ParamMode::InOut && param.is_scalar {
            return Err(AbiError::UniformInout {
                param: param.name.clone(),
                span: param.span,
            });
        }
    }
    Ok(())
}

/// Check every call in `routine` against its callee's signature.
pub fn check_call_sites(module: &Module, routine: &RoutineDecl) -> Result<(), AbiError> {
    check_block(module, &routine.body)
}

fn check_block(module: &Module, body: &[Stmt]) -> Result<(), AbiError> {
    for stmt in body {
        match &stmt.kind {
            StmtKind::AssignMulti { targets, call } => {
                for target in targets {
                    check_expr(module, target)?;
                }
                match &call.kind {
                    ExprKind::Call { routine, args } => {
                        if let Some(callee) = module.routine(routine) {
                            if callee.returns.len() != targets.len() {
                                return Err(AbiError::ReturnArity {
                                    callee: callee.name.clone(),
                                    expected: callee.returns.len(),
                                    found: targets.len(),
                                    span: stmt.span,
                                });
                            }
                            check_args(callee, args, call)?;
                        }
                        for arg in args {
                            check_expr(module, arg)?;
                        }
                    }
                    _ => check_expr(module, call)?,
                }
            }
            _ => {
                for e in stmt.exprs() {
                    check_expr(module, e)?;
                }
            }
        }
        for inner in stmt.bodies() {
            check_block(module, inner)?;
        }
    }
    Ok(())
}

fn check_expr(module: &Module, e: &Expr) -> Result<(), AbiError> {
    if let ExprKind::Call { routine, args } = &e.kind {
        if let Some(callee) = module.routine(routine) {
            if callee.returns.len() > 1 {
                return Err(AbiError::ReturnArity {
                    callee: callee.name.clone(),
                    expected: callee.returns.len(),
                    found: 1,
                    span: e.span,
                });
            }
            check_args(callee, args, e)?;
        }
    }
    for child in e.children() {
        check_expr(module, child)?;
    }
    Ok(())
}

fn check_args(callee: &RoutineDecl, args: &[Expr], call: &Expr) -> Result<(), AbiError> {
    if callee.params.len() != args.len() {
        return Err(AbiError::ParamArity {
            callee: callee.name.clone(),
            expected: callee.params.len(),
            found: args.len(),
            span: call.span,
        });
    }
    for (param, arg) in callee.params.iter().zip(args) {
        if param.mode == ParamMode::InOut && arg.root_var().is_none() {
            return Err(AbiError::InoutNotPlace {
                param: param.name.clone(),
                span: arg.span,
            });
        }
    }
    Ok(())
}
