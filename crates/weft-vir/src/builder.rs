// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! BlockBuilder - helper for CFG construction during lowering.

use crate::{BlockId, LocalId, VirBlock, VirFunction, VirLocal, VirStmt, VirTerminator, VirType};

pub struct BlockBuilder {
    function: VirFunction,
    current_block: BlockId,
    next_local_id: u32,
    next_block_id: u32,
}

impl BlockBuilder {
    pub fn new(name: String, results: Vec<VirType>) -> Self {
        let entry_block = BlockId(0);
        let function = VirFunction {
            name,
            params: Vec::new(),
            results,
            locals: Vec::new(),
            blocks: vec![VirBlock {
                id: entry_block,
                statements: Vec::new(),
                terminator: VirTerminator::Unreachable,
            }],
            entry_block,
        };

        Self {
            function,
            current_block: entry_block,
            next_local_id: 0,
            next_block_id: 1,
        }
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.function.blocks.push(VirBlock {
            id,
            statements: Vec::new(),
            terminator: VirTerminator::Unreachable,
        });
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn entry_block(&self) -> BlockId {
        self.function.entry_block
    }

    fn push_local(&mut self, name: Option<String>, ty: VirType, is_param: bool) -> LocalId {
        let id = LocalId(self.next_local_id);
        self.next_local_id += 1;
        let local = VirLocal {
            id,
            name,
            ty,
            is_param,
        };
        if is_param {
            self.function.params.push(local.clone());
        }
        self.function.locals.push(local);
        id
    }

    pub fn alloc_temp(&mut self, ty: VirType) -> LocalId {
        self.push_local(None, ty, false)
    }

    pub fn alloc_local(&mut self, name: String, ty: VirType) -> LocalId {
        self.push_local(Some(name), ty, false)
    }

    pub fn add_param(&mut self, name: String, ty: VirType) -> LocalId {
        self.push_local(Some(name), ty, true)
    }

    pub fn local_type(&self, id: LocalId) -> Option<&VirType> {
        self.function.locals.get(id.0 as usize).map(|l| &l.ty)
    }

    pub fn push_stmt(&mut self, stmt: VirStmt) {
        let block = &mut self.function.blocks[self.current_block.0 as usize];
        block.statements.push(stmt);
    }

    pub fn terminate(&mut self, term: VirTerminator) {
        let block = &mut self.function.blocks[self.current_block.0 as usize];
        block.terminator = term;
    }

    /// Check if the current block still has the default Unreachable terminator.
    pub fn current_block_unterminated(&self) -> bool {
        matches!(
            self.function.blocks[self.current_block.0 as usize].terminator,
            VirTerminator::Unreachable
        )
    }

    pub fn finish(self) -> VirFunction {
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VirOperand, VirRValue};
    use weft_ast::ScalarKind;

    #[test]
    fn params_are_locals_too() {
        let mut b = BlockBuilder::new("f".into(), vec![VirType::Scalar(ScalarKind::Int32)]);
        let p = b.add_param("x".into(), VirType::Scalar(ScalarKind::Int32));
        let t = b.alloc_temp(VirType::Mask { lanes: 4 });
        b.push_stmt(VirStmt::Assign {
            dst: t,
            rvalue: VirRValue::Splat {
                value: VirOperand::bool(true),
                lanes: 4,
            },
        });
        assert!(b.current_block_unterminated());
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(p)],
        });
        assert!(!b.current_block_unterminated());
        let f = b.finish();
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.locals.len(), 2);
        assert_eq!(f.local(t).map(|l| l.ty.clone()), Some(VirType::Mask { lanes: 4 }));
        assert_eq!(f.statements().count(), 1);
    }
}
