// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! VIR function representation - control-flow graph of basic blocks.

use crate::{VirStmt, VirTerminator, VirType};

/// VIR function. Multiple results are returned side by side, one value per
/// result slot.
#[derive(Debug, Clone)]
pub struct VirFunction {
    pub name: String,
    pub params: Vec<VirLocal>,
    pub results: Vec<VirType>,
    pub locals: Vec<VirLocal>,
    pub blocks: Vec<VirBlock>,
    pub entry_block: BlockId,
}

impl VirFunction {
    pub fn local(&self, id: LocalId) -> Option<&VirLocal> {
        self.locals.get(id.0 as usize)
    }

    pub fn block(&self, id: BlockId) -> Option<&VirBlock> {
        self.blocks.get(id.0 as usize)
    }

    /// All statements, block by block.
    pub fn statements(&self) -> impl Iterator<Item = &VirStmt> {
        self.blocks.iter().flat_map(|b| b.statements.iter())
    }
}

/// Basic block in CFG
#[derive(Debug, Clone)]
pub struct VirBlock {
    pub id: BlockId,
    pub statements: Vec<VirStmt>,
    pub terminator: VirTerminator,
}

/// Local variable or temporary
#[derive(Debug, Clone)]
pub struct VirLocal {
    pub id: LocalId,
    pub name: Option<String>,
    pub ty: VirType,
    pub is_param: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);
