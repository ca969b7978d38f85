// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Class and routine declarations.

use crate::{NodeId, Span, Stmt, Type};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassDecl {
    pub name: String,
    /// `simd class`: may be widened to a batch of instances.
    pub is_simd: bool,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
}

impl ClassDecl {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ParamMode {
    In,
    InOut,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub mode: ParamMode,
    /// `scalar` qualifier: stays uniform in the vector variant.
    pub is_scalar: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReturnSlot {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutineDecl {
    pub id: NodeId,
    pub name: String,
    /// `simd routine` / `simd reader`: gets a vector variant.
    pub is_simd: bool,
    pub params: Vec<Param>,
    pub returns: Vec<ReturnSlot>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// One translation unit.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Module {
    #[cfg_attr(feature = "serde", serde(default))]
    pub file: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub source: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub classes: Vec<ClassDecl>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub routines: Vec<RoutineDecl>,
}

impl Module {
    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn routine(&self, name: &str) -> Option<&RoutineDecl> {
        self.routines.iter().find(|r| r.name == name)
    }
}
