//! IR instructions, operands, and basic blocks

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of an instruction in its function's instruction arena.
///
/// Doubles as the register name for the instruction's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsnId(pub u32);

impl fmt::Display for InsnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Index of a basic block in its function's block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".L{}", self.0)
    }
}

/// Instruction opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Materialize an integer constant.
    Lit,
    /// The address of a global symbol.
    SymRef,
    /// Reserve a stack cell of the given byte size; yields its address.
    Alloc,
    /// `ld addr, size`
    Ld,
    /// `st addr, value, size`
    St,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// `br cond, then, else` or `br 1, target`.
    Br,
    /// Call of a user function: `call sym, (args)`.
    Call,
    /// Call of a runtime built-in: `fcall sym, (args)`.
    FCall,
    Ret,
}

impl Opcode {
    /// Whether this opcode ends a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Br | Opcode::Ret)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Opcode::Lit => "lit",
            Opcode::SymRef => "symref",
            Opcode::Alloc => "alloc",
            Opcode::Ld => "ld",
            Opcode::St => "st",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Not => "not",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::Lt => "lt",
            Opcode::Gt => "gt",
            Opcode::Le => "le",
            Opcode::Ge => "ge",
            Opcode::Br => "br",
            Opcode::Call => "call",
            Opcode::FCall => "fcall",
            Opcode::Ret => "ret",
        };
        write!(f, "{}", s)
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Immediate integer.
    Int(i64),
    /// The result of a prior instruction.
    Reg(InsnId),
    /// A basic-block label, only valid on `br`.
    Label(BlockId),
    /// A symbol name, for `symref`, `call`, and `fcall` targets.
    Sym(String),
    /// An argument vector for calls.
    Args(Vec<Operand>),
    /// A branch target not yet patched. Must not survive analysis.
    Pending,
}

impl Operand {
    /// The always-taken condition of an unconditional branch.
    pub const TRUE: Operand = Operand::Int(1);

    pub fn sym(name: impl Into<String>) -> Self {
        Operand::Sym(name.into())
    }

    pub fn as_label(&self) -> Option<BlockId> {
        match self {
            Operand::Label(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{}", v),
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Label(b) => write!(f, "{}", b),
            Operand::Sym(s) => write!(f, "{}", s),
            Operand::Args(args) => {
                write!(f, "(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Operand::Pending => write!(f, "?"),
        }
    }
}

/// A three-address instruction. Its result register is its [`InsnId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(op: Opcode, operands: Vec<Operand>) -> Self {
        Self { op, operands }
    }

    /// Block labels this instruction transfers control to.
    pub fn branch_targets(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.operands.iter().filter_map(Operand::as_label)
    }

    /// Whether any branch target is still a placeholder.
    pub fn has_pending_target(&self) -> bool {
        self.operands.iter().any(|o| matches!(o, Operand::Pending))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for (i, o) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", o)?;
            } else {
                write!(f, ", {}", o)?;
            }
        }
        Ok(())
    }
}

/// A basic block: an ordered run of instructions ending in one control
/// transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub insns: Vec<InsnId>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }
}
