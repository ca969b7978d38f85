// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! VIR type system - every type is concrete and carries its lane count.

use weft_ast::ScalarKind;

/// Storage order of a batch of composite values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateLayout {
    /// One instance contiguous per slot.
    Aos,
    /// One array per field.
    Soa,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VirType {
    Void,
    Scalar(ScalarKind),
    /// `elem × lanes`. Vectors of `bool` are masks, never vectors.
    Vector {
        elem: ScalarKind,
        lanes: u32,
    },
    /// One predicate bit per lane.
    Mask {
        lanes: u32,
    },
    /// A class value, or a batch of `lanes` class values in `layout` order.
    Aggregate {
        class: String,
        fields: Vec<ScalarKind>,
        lanes: u32,
        layout: AggregateLayout,
    },
    /// Handle to a container. Element storage is always one array per field.
    Buffer {
        elem: Box<VirType>,
    },
}

impl VirType {
    /// Per-lane form of a scalar kind.
    pub fn vector(elem: ScalarKind, lanes: u32) -> VirType {
        if elem.is_bool() {
            VirType::Mask { lanes }
        } else {
            VirType::Vector { elem, lanes }
        }
    }

    /// Lane count; 1 for everything that is not a batch.
    pub fn lanes(&self) -> u32 {
        match self {
            VirType::Vector { lanes, .. }
            | VirType::Mask { lanes }
            | VirType::Aggregate { lanes, .. } => *lanes,
            _ => 1,
        }
    }

    /// Scalar kind of one lane, for vectors, masks and scalars.
    pub fn elem(&self) -> Option<ScalarKind> {
        match self {
            VirType::Scalar(k) | VirType::Vector { elem: k, .. } => Some(*k),
            VirType::Mask { .. } => Some(ScalarKind::Bool),
            _ => None,
        }
    }

    pub fn is_batch(&self) -> bool {
        self.lanes() > 1 || matches!(self, VirType::Mask { .. } | VirType::Vector { .. })
    }

    /// Same type with one lane: what a single element looks like.
    pub fn lane_type(&self) -> VirType {
        match self {
            VirType::Vector { elem, .. } => VirType::Scalar(*elem),
            VirType::Mask { .. } => VirType::Scalar(ScalarKind::Bool),
            VirType::Aggregate { class, fields, .. } => VirType::Aggregate {
                class: class.clone(),
                fields: fields.clone(),
                lanes: 1,
                layout: AggregateLayout::Aos,
            },
            other => other.clone(),
        }
    }

    /// Byte size of the value, ignoring padding.
    pub fn size(&self) -> u32 {
        match self {
            VirType::Void => 0,
            VirType::Scalar(k) => k.size(),
            VirType::Vector { elem, lanes } => elem.size() * lanes,
            VirType::Mask { lanes } => *lanes,
            VirType::Aggregate { fields, lanes, .. } => {
                fields.iter().map(|f| f.size()).sum::<u32>() * lanes
            }
            VirType::Buffer { .. } => 8,
        }
    }
}
