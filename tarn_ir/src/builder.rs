//! Emission cursor: the current function and current block

use serde::{Deserialize, Serialize};

use crate::function::FuncId;
use crate::instruction::{BlockId, InsnId, Opcode, Operand};
use crate::module::Module;

/// Where instructions land: a function and a block within it.
///
/// The cursor is plain data so callers can save and restore it around
/// nested lowering, the way a recursive analyzer needs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub func: FuncId,
    pub block: BlockId,
}

impl Cursor {
    /// A cursor positioned at a function's entry block.
    pub fn at_entry(module: &Module, func: FuncId) -> Self {
        Self {
            func,
            block: module.func(func).entry,
        }
    }

    /// Append an instruction to the current block.
    pub fn emit(&self, module: &mut Module, op: Opcode, operands: Vec<Operand>) -> InsnId {
        module.func_mut(self.func).emit(self.block, op, operands)
    }

    /// Register a fresh block in the current function without moving to it.
    pub fn new_block(&self, module: &mut Module) -> BlockId {
        module.func_mut(self.func).new_block()
    }

    /// Redirect subsequent emission to `block`.
    pub fn move_to(&mut self, block: BlockId) {
        self.block = block;
    }

    /// Patch a branch operand of an instruction in the current function.
    pub fn patch(&self, module: &mut Module, insn: InsnId, index: usize, target: BlockId) {
        module.func_mut(self.func).patch(insn, index, target);
    }
}
