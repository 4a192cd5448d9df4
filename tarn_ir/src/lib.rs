//! Intermediate representation for the Tarn compiler
//!
//! A module holds functions; a function owns arenas of instructions and
//! basic blocks addressed by typed indices. Instructions are three-address
//! with one implicit result each (the instruction's own id), so operands
//! reference literals, prior instructions, symbolic names, or block labels.

pub mod builder;
pub mod error;
pub mod function;
pub mod instruction;
pub mod module;

pub use builder::Cursor;
pub use error::IrError;
pub use function::{FuncId, Function};
pub use instruction::{BasicBlock, BlockId, InsnId, Instruction, Opcode, Operand};
pub use module::Module;
