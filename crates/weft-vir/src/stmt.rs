// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! VIR statements and terminators.

use crate::{AggregateLayout, BlockId, FunctionRef, LocalId, VirOperand, VirRValue};

/// VIR statement - no control flow
#[derive(Debug, Clone, PartialEq)]
pub enum VirStmt {
    Assign {
        dst: LocalId,
        rvalue: VirRValue,
    },
    /// Call producing one value per result slot of the callee.
    Call {
        dsts: Vec<LocalId>,
        func: FunctionRef,
        args: Vec<VirOperand>,
    },
    /// Scalar call repeated for every lane set in `mask`. Batch arguments
    /// contribute their lane, uniform arguments are passed unchanged, and
    /// results land in the same lane of each destination. Lanes outside the
    /// mask are never called and read back as zero.
    LaneCall {
        dsts: Vec<LocalId>,
        func: FunctionRef,
        args: Vec<VirOperand>,
        mask: VirOperand,
        lanes: u32,
    },
    /// New zero-filled container of `len` elements.
    ContainerAlloc {
        dst: LocalId,
        len: VirOperand,
    },
    /// Read one element into a scalar or single-instance value. When
    /// `guard` is false nothing is read and `dst` becomes zero.
    Gather {
        dst: LocalId,
        buffer: LocalId,
        index: VirOperand,
        guard: Option<VirOperand>,
    },
    /// Write one element; skipped when `guard` is false.
    Scatter {
        buffer: LocalId,
        index: VirOperand,
        value: VirOperand,
        guard: Option<VirOperand>,
    },
    /// Read elements `base..base+lanes` into a batch. Masked-off lanes are
    /// not read and become zero.
    LoadBatch {
        dst: LocalId,
        buffer: LocalId,
        base: VirOperand,
        mask: Option<VirOperand>,
    },
    /// Write the lanes of `value` set in `mask` to `base..base+lanes`.
    StoreBatch {
        buffer: LocalId,
        base: VirOperand,
        value: VirOperand,
        mask: Option<VirOperand>,
    },
    /// Re-layout a batch of aggregates.
    Transpose {
        dst: LocalId,
        src: VirOperand,
        to: AggregateLayout,
    },
}

/// VIR terminator - ends a basic block
#[derive(Debug, Clone, PartialEq)]
pub enum VirTerminator {
    Return {
        values: Vec<VirOperand>,
    },
    Goto {
        target: BlockId,
    },
    Branch {
        cond: VirOperand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Unreachable,
}
