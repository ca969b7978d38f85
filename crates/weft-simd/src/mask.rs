// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Execution-mask stack used while lowering vector code.
//!
//! Every frame owns a mask local. The top frame's mask is the set of lanes
//! executing the current statement; it is always a subset of every mask
//! below it.

use weft_ast::NodeId;
use weft_vir::LocalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    /// Vector variant body, seeded from the caller's execution mask.
    Routine,
    /// One batch of a range block.
    Batch,
    /// Arm of a divergent `if` or ternary.
    Branch,
    /// Iteration of a divergent loop. `live` holds the lanes that have not
    /// left the loop yet.
    Loop { target: NodeId, live: LocalId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MaskFrame {
    pub kind: FrameKind,
    pub mask: LocalId,
    pub divergent: bool,
}

/// Which exit is retiring lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetireScope {
    Break(NodeId),
    Continue(NodeId),
    Return,
}

/// Locals a retiring exit must clear the executing lanes from.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RetireTargets {
    pub masks: Vec<LocalId>,
    pub lives: Vec<LocalId>,
}

#[derive(Debug, Default)]
pub(crate) struct MaskStack {
    frames: Vec<MaskFrame>,
}

impl MaskStack {
    pub fn push(&mut self, kind: FrameKind, mask: LocalId, divergent: bool) {
        tracing::trace!(
            target: "weft::simd",
            depth = self.frames.len(),
            ?kind,
            mask = mask.0,
            divergent,
            "mask frame pushed"
        );
        self.frames.push(MaskFrame {
            kind,
            mask,
            divergent,
        });
    }

    pub fn pop(&mut self) -> Option<MaskFrame> {
        let frame = self.frames.pop();
        if let Some(f) = &frame {
            tracing::trace!(target: "weft::simd", depth = self.frames.len(), kind = ?f.kind, "mask frame popped");
        }
        frame
    }

    /// Mask of the executing lanes; `None` outside vector code.
    pub fn active(&self) -> Option<LocalId> {
        self.frames.last().map(|f| f.mask)
    }

    pub fn in_vector(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn any_divergent(&self) -> bool {
        self.frames.iter().any(|f| f.divergent)
    }

    pub fn retire_targets(&self, scope: RetireScope) -> RetireTargets {
        let mut targets = RetireTargets::default();
        for frame in self.frames.iter().rev() {
            targets.masks.push(frame.mask);
            match (scope, frame.kind) {
                (RetireScope::Break(id), FrameKind::Loop { target, live }) if id == target => {
                    targets.lives.push(live);
                    return targets;
                }
                (RetireScope::Continue(id), FrameKind::Loop { target, .. }) if id == target => {
                    return targets;
                }
                (RetireScope::Return, FrameKind::Loop { live, .. }) => targets.lives.push(live),
                _ => {}
            }
        }
        targets
    }
}
