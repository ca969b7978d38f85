// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! VIR operands and rvalues.

use weft_ast::ScalarKind;

use crate::LocalId;

pub use weft_ast::{BinOp, ReduceOp, UnaryOp};

/// VIR operand - value that can be used
#[derive(Debug, Clone, PartialEq)]
pub enum VirOperand {
    Local(LocalId),
    Constant(VirConst),
}

impl VirOperand {
    pub fn int(value: i64) -> Self {
        VirOperand::Constant(VirConst::Int(value))
    }

    pub fn real(value: f64) -> Self {
        VirOperand::Constant(VirConst::Real(value))
    }

    pub fn bool(value: bool) -> Self {
        VirOperand::Constant(VirConst::Bool(value))
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            VirOperand::Local(id) => Some(*id),
            VirOperand::Constant(_) => None,
        }
    }
}

/// VIR constant value. Constants are uniform scalars; the destination type
/// gives them their width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VirConst {
    Int(i64),
    Real(f64),
    Bool(bool),
}

/// VIR rvalue - right-hand side of assignment
#[derive(Debug, Clone, PartialEq)]
pub enum VirRValue {
    Use(VirOperand),
    /// Lane-wise when both operands are batches; both operands always have
    /// the same shape.
    BinaryOp {
        op: BinOp,
        left: VirOperand,
        right: VirOperand,
    },
    UnaryOp {
        op: UnaryOp,
        operand: VirOperand,
    },
    Cast {
        value: VirOperand,
        to: ScalarKind,
    },
    /// Uniform value copied to every lane. Splatting a single class
    /// instance produces a structure-of-arrays batch.
    Splat {
        value: VirOperand,
        lanes: u32,
    },
    /// Per-lane blend: `mask ? then_value : else_value`.
    Select {
        mask: VirOperand,
        then_value: VirOperand,
        else_value: VirOperand,
    },
    /// `[0, 1, …, lanes-1]`
    Iota {
        elem: ScalarKind,
        lanes: u32,
    },
    /// One lane of a vector or mask.
    Extract {
        vector: VirOperand,
        lane: VirOperand,
    },
    /// Reduction over the lanes set in `mask` (all lanes when absent).
    Reduce {
        op: ReduceOp,
        value: VirOperand,
        mask: Option<VirOperand>,
    },
    FieldGet {
        base: VirOperand,
        field: u32,
    },
    /// Copy of `base` with one field replaced.
    FieldSet {
        base: VirOperand,
        field: u32,
        value: VirOperand,
    },
    /// Aggregate built field by field.
    Compose {
        fields: Vec<VirOperand>,
    },
}

/// Function reference for calls
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRef {
    pub name: String,
    /// True for `c_call` targets.
    pub is_extern: bool,
}

impl FunctionRef {
    pub fn internal(name: String) -> Self {
        Self {
            name,
            is_extern: false,
        }
    }

    pub fn extern_c(name: String) -> Self {
        Self {
            name,
            is_extern: true,
        }
    }
}
