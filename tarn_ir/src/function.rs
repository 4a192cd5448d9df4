//! IR functions: per-function arenas of instructions and blocks

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IrError;
use crate::instruction::{BasicBlock, BlockId, InsnId, Instruction, Opcode, Operand};

/// Index of a function in a [`crate::Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncId(pub u32);

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A compiled function: a block list with one entry block, plus the arena
/// every instruction of the function lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Lexical nesting depth; 1 for the synthetic main.
    pub nest_depth: u32,
    pub entry: BlockId,
    pub blocks: Vec<BasicBlock>,
    pub insns: Vec<Instruction>,
}

impl Function {
    /// Create a function with a fresh, empty entry block.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nest_depth: 1,
            entry: BlockId(0),
            blocks: vec![BasicBlock::new()],
            insns: Vec::new(),
        }
    }

    /// Add an instruction to the arena without placing it in a block.
    pub fn push_insn(&mut self, insn: Instruction) -> InsnId {
        let id = InsnId(self.insns.len() as u32);
        self.insns.push(insn);
        id
    }

    /// Place an arena instruction at the end of a block.
    pub fn append(&mut self, block: BlockId, insn: InsnId) {
        self.blocks[block.0 as usize].insns.push(insn);
    }

    /// Add an instruction and place it at the end of a block.
    pub fn emit(&mut self, block: BlockId, op: Opcode, operands: Vec<Operand>) -> InsnId {
        let id = self.push_insn(Instruction::new(op, operands));
        self.append(block, id);
        id
    }

    /// Register a fresh block. It does not become current anywhere; callers
    /// direct emission explicitly.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new());
        id
    }

    /// Patch operand `index` of `insn` with a now-known block label.
    pub fn patch(&mut self, insn: InsnId, index: usize, target: BlockId) {
        self.insns[insn.0 as usize].operands[index] = Operand::Label(target);
    }

    pub fn insn(&self, id: InsnId) -> &Instruction {
        &self.insns[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    /// The instruction a block's control leaves through, if the block is
    /// terminated.
    pub fn terminator(&self, block: BlockId) -> Option<&Instruction> {
        let last = *self.block(block).insns.last()?;
        let insn = self.insn(last);
        insn.op.is_terminator().then_some(insn)
    }

    /// Labels a block's terminator transfers to.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        match self.terminator(block) {
            Some(t) => t.branch_targets().collect(),
            None => Vec::new(),
        }
    }

    /// Check structural invariants: every block ends in `br`/`ret`, every
    /// branch target is a patched in-range label, and every block is
    /// reachable from the entry.
    pub fn validate(&self) -> Result<(), IrError> {
        for (i, _) in self.blocks.iter().enumerate() {
            let block = BlockId(i as u32);
            let term = self
                .terminator(block)
                .ok_or(IrError::MissingTerminator { block })?;
            if term.has_pending_target() {
                return Err(IrError::PendingBranchTarget { block });
            }
            for target in term.branch_targets() {
                if target.0 as usize >= self.blocks.len() {
                    return Err(IrError::DanglingBranchTarget { block, target });
                }
            }
        }

        let mut visited = vec![false; self.blocks.len()];
        let mut queue = VecDeque::from([self.entry]);
        visited[self.entry.0 as usize] = true;
        while let Some(block) = queue.pop_front() {
            for succ in self.successors(block) {
                if !visited[succ.0 as usize] {
                    visited[succ.0 as usize] = true;
                    queue.push_back(succ);
                }
            }
        }
        if let Some(i) = visited.iter().position(|v| !v) {
            return Err(IrError::UnreachableBlock {
                block: BlockId(i as u32),
            });
        }

        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {} (depth {}) {{", self.name, self.nest_depth)?;
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(f, "{}:", BlockId(i as u32))?;
            for &insn in &block.insns {
                writeln!(f, "  {} = {}", insn, self.insn(insn))?;
            }
        }
        writeln!(f, "}}")
    }
}
