//! IR validation error definitions

use thiserror::Error;

use crate::instruction::BlockId;

/// Structural defects detected by [`crate::Function::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("branch in block {block} still has an unpatched target")]
    PendingBranchTarget { block: BlockId },

    #[error("branch in block {block} targets {target}, which is not in the function")]
    DanglingBranchTarget { block: BlockId, target: BlockId },

    #[error("block {block} is not reachable from the entry block")]
    UnreachableBlock { block: BlockId },

    #[error("block {block} does not end in a branch or return")]
    MissingTerminator { block: BlockId },
}
