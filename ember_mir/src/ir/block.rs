//! Basic blocks.
//!
//! A block owns its phis, the head and tail of its doubly-linked
//! instruction stream, its predecessor list and a model of the interpreter
//! stack used while the builder walks bytecode. Successors are not stored:
//! they are read off the block's final control instruction.

use super::arena::Id;
use super::node::DefId;
use super::resume::ResumePointId;
use crate::error::{MirError, Result};

/// Identifier of a block in the graph arena.
pub type BlockId = Id<BasicBlock>;

/// Role of a block in the CFG.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Normal,
    /// Loop header whose backedge has not been added yet.
    PendingLoopHeader,
    LoopHeader,
    /// Block inserted on a critical edge.
    SplitEdge,
}

/// A basic block.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) id: BlockId,
    pub(crate) kind: BlockKind,
    pub(crate) pc: u32,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) phis: Vec<DefId>,
    pub(crate) first: Option<DefId>,
    pub(crate) last: Option<DefId>,
    pub(crate) num_instructions: usize,
    pub(crate) entry_resume_point: Option<ResumePointId>,
    pub(crate) backedge: Option<BlockId>,
    pub(crate) loop_depth: u32,

    /// Interpreter stack model: `slots[..stack_depth]` are live.
    pub(crate) slots: Vec<DefId>,
    pub(crate) stack_depth: usize,
}

impl BasicBlock {
    pub(crate) fn new(id: BlockId, kind: BlockKind, pc: u32, num_slots: usize) -> Self {
        BasicBlock {
            id,
            kind,
            pc,
            predecessors: Vec::new(),
            phis: Vec::new(),
            first: None,
            last: None,
            num_instructions: 0,
            entry_resume_point: None,
            backedge: None,
            loop_depth: 0,
            slots: vec![DefId::INVALID; num_slots],
            stack_depth: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Bytecode pc the block starts at.
    #[inline]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    #[inline]
    pub fn is_loop_header(&self) -> bool {
        matches!(self.kind, BlockKind::LoopHeader | BlockKind::PendingLoopHeader)
    }

    #[inline]
    pub fn backedge(&self) -> Option<BlockId> {
        self.backedge
    }

    #[inline]
    pub fn loop_depth(&self) -> u32 {
        self.loop_depth
    }

    #[inline]
    pub fn set_loop_depth(&mut self, depth: u32) {
        self.loop_depth = depth;
    }

    #[inline]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    #[inline]
    pub fn num_predecessors(&self) -> usize {
        self.predecessors.len()
    }

    #[inline]
    pub fn get_predecessor(&self, index: usize) -> BlockId {
        self.predecessors[index]
    }

    #[inline]
    pub fn phis(&self) -> &[DefId] {
        &self.phis
    }

    #[inline]
    pub fn first_instruction(&self) -> Option<DefId> {
        self.first
    }

    #[inline]
    pub fn last_instruction(&self) -> Option<DefId> {
        self.last
    }

    #[inline]
    pub fn num_instructions(&self) -> usize {
        self.num_instructions
    }

    #[inline]
    pub fn entry_resume_point(&self) -> Option<ResumePointId> {
        self.entry_resume_point
    }

    // =========================================================================
    // Interpreter stack model
    // =========================================================================

    /// Number of slots currently on the stack.
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.stack_depth
    }

    /// Maximum stack depth of this block.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn push(&mut self, def: DefId) -> Result<()> {
        if self.stack_depth == self.slots.len() {
            return Err(MirError::StackOverflow {
                block: self.id,
                capacity: self.slots.len(),
            });
        }
        self.slots[self.stack_depth] = def;
        self.stack_depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<DefId> {
        if self.stack_depth == 0 {
            return Err(MirError::StackUnderflow { block: self.id });
        }
        self.stack_depth -= 1;
        Ok(self.slots[self.stack_depth])
    }

    /// Value `depth` slots below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> Result<DefId> {
        if depth >= self.stack_depth {
            return Err(MirError::StackUnderflow { block: self.id });
        }
        Ok(self.slots[self.stack_depth - 1 - depth])
    }

    pub fn get_slot(&self, slot: usize) -> Result<DefId> {
        self.check_slot(slot)?;
        Ok(self.slots[slot])
    }

    pub fn set_slot(&mut self, slot: usize, def: DefId) -> Result<()> {
        self.check_slot(slot)?;
        self.slots[slot] = def;
        Ok(())
    }

    /// Live stack slots, bottom first.
    #[inline]
    pub fn stack(&self) -> &[DefId] {
        &self.slots[..self.stack_depth]
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.stack_depth {
            return Err(MirError::SlotOutOfRange {
                block: self.id,
                slot,
                depth: self.stack_depth,
            });
        }
        Ok(())
    }

    /// Copy the live stack of `pred` into this block's model.
    pub(crate) fn inherit_stack(&mut self, pred: &BasicBlock) {
        if self.slots.len() < pred.stack_depth {
            self.slots.resize(pred.stack_depth, DefId::INVALID);
        }
        self.slots[..pred.stack_depth].copy_from_slice(pred.stack());
        self.stack_depth = pred.stack_depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(slots: usize) -> BasicBlock {
        BasicBlock::new(BlockId::new(0), BlockKind::Normal, 0, slots)
    }

    #[test]
    fn test_push_pop_peek() {
        let mut b = block(3);
        b.push(DefId::new(1)).unwrap();
        b.push(DefId::new(2)).unwrap();

        assert_eq!(b.stack_depth(), 2);
        assert_eq!(b.peek(0).unwrap(), DefId::new(2));
        assert_eq!(b.peek(1).unwrap(), DefId::new(1));
        assert_eq!(b.pop().unwrap(), DefId::new(2));
        assert_eq!(b.stack(), &[DefId::new(1)]);
    }

    #[test]
    fn test_overflow_and_underflow() {
        let mut b = block(1);
        b.push(DefId::new(0)).unwrap();
        assert!(matches!(b.push(DefId::new(1)), Err(MirError::StackOverflow { capacity: 1, .. })));

        b.pop().unwrap();
        assert!(matches!(b.pop(), Err(MirError::StackUnderflow { .. })));
    }

    #[test]
    fn test_set_slot_in_range_only() {
        let mut b = block(4);
        b.push(DefId::new(5)).unwrap();
        b.set_slot(0, DefId::new(6)).unwrap();
        assert_eq!(b.get_slot(0).unwrap(), DefId::new(6));
        assert!(matches!(
            b.set_slot(1, DefId::new(7)),
            Err(MirError::SlotOutOfRange { slot: 1, depth: 1, .. })
        ));
    }

    #[test]
    fn test_inherit_stack_copies() {
        let mut pred = block(2);
        pred.push(DefId::new(9)).unwrap();
        let mut succ = block(0);
        succ.inherit_stack(&pred);

        assert_eq!(succ.stack(), &[DefId::new(9)]);
        pred.set_slot(0, DefId::new(1)).unwrap();
        assert_eq!(succ.stack(), &[DefId::new(9)]);
    }
}
