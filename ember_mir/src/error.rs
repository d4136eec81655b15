//! Error types for MIR construction and verification.
//!
//! Contract violations (double flag sets, boxing a boxed value, recycling a
//! use record into the wrong slot) are `debug_assert!`s and never surface
//! here. `MirError` covers the structural failures a caller can observe and
//! react to: a full jump table, an interpreter-stack misuse, or a graph that
//! fails verification.

use crate::ir::block::BlockId;
use crate::ir::node::{DefId, NodeRef};
use thiserror::Error;

/// Errors reported by the MIR core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirError {
    /// The use chain of a definition disagrees with the operand slots that
    /// hold it.
    #[error("use chain mismatch on {def}: {reason}")]
    UseChainMismatch { def: DefId, reason: String },

    /// An operand slot points at a discarded or never-initialized definition.
    #[error("operand {index} of {node:?} is dangling")]
    DanglingOperand { node: NodeRef, index: usize },

    /// Every case of a table switch already has a successor.
    #[error("table switch {def} already holds all {cases} cases")]
    TableSwitchFull { def: DefId, cases: usize },

    /// The default successor of a table switch was added twice.
    #[error("table switch {def} already has a default successor")]
    TableSwitchDefaultSet { def: DefId },

    /// A case was added before the default successor.
    #[error("table switch {def} has no default successor yet")]
    TableSwitchNoDefault { def: DefId },

    /// A jump table edit on an instruction that is not a table switch.
    #[error("{def} is not a table switch")]
    NotATableSwitch { def: DefId },

    /// A table switch range with `low > high`.
    #[error("invalid table switch range [{low}, {high}]")]
    InvalidRange { low: i32, high: i32 },

    /// Popped an empty interpreter stack.
    #[error("interpreter stack underflow in {block}")]
    StackUnderflow { block: BlockId },

    /// Pushed past the slot count of a block.
    #[error("interpreter stack overflow in {block} (capacity {capacity})")]
    StackOverflow { block: BlockId, capacity: usize },

    /// A slot index beyond the current stack depth.
    #[error("slot {slot} out of range in {block} (depth {depth})")]
    SlotOutOfRange { block: BlockId, slot: usize, depth: usize },

    /// The definition is a phi or is detached where an instruction in a block
    /// is required.
    #[error("{def} is not an instruction in a block")]
    NotAnInstruction { def: DefId },

    /// The block does not end in a control instruction.
    #[error("{block} is not terminated by a control instruction")]
    BlockNotTerminated { block: BlockId },

    /// The dependency and virtual register storage were mixed up.
    #[error("{def}: {reason}")]
    LoweringConflict { def: DefId, reason: &'static str },
}

/// Result type for MIR operations.
pub type Result<T> = std::result::Result<T, MirError>;
