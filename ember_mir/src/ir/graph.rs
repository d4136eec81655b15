//! The MIR graph container.
//!
//! The graph provides:
//! - **Arena storage**: definitions, blocks and resume points of one
//!   compilation, freed together
//! - **Use chains**: every operand write goes through `init_operand`,
//!   `replace_operand` or `replace_all_uses_with`, which keep each
//!   definition's use list in bijection with the slots that hold it
//! - **Instruction streams**: a doubly-linked list per block, plus phis
//! - **Resume points**: snapshots of block stacks, chained across inlined
//!   frames
//!
//! Instruction factories (`new_add`, `new_constant`, ...) live next to
//! their opcode families in [`instructions`](super::instructions) and
//! return detached definitions; `append`, `insert_before` or `end` place
//! them in a block.

use super::arena::Arena;
use super::block::{BasicBlock, BlockId, BlockKind};
use super::instructions::InstructionKind;
use super::node::{DefId, Definition, NodeRef, Use};
use super::resume::{FlattenedResumePointIter, ResumeMode, ResumePoint, ResumePointId};
use super::types::MirType;
use crate::config::MirConfig;
use crate::error::{MirError, Result};
use smallvec::SmallVec;
use tracing::trace;

// =============================================================================
// Graph Phase
// =============================================================================

/// Compilation phase. Gates which half of a definition's lowering slot is
/// meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GraphPhase {
    Building,
    Optimizing,
    Lowered,
}

// =============================================================================
// Graph
// =============================================================================

/// One compilation's MIR.
#[derive(Clone)]
pub struct MirGraph {
    defs: Arena<Definition>,
    blocks: Arena<BasicBlock>,
    resume_points: Arena<ResumePoint>,
    block_order: Vec<BlockId>,
    entry: Option<BlockId>,
    osr_block: Option<BlockId>,
    next_id: u32,
    phase: GraphPhase,
    config: MirConfig,
    current_pc: Option<u32>,
    alias_analyzed: bool,
}

impl MirGraph {
    pub fn new(config: MirConfig) -> Self {
        MirGraph {
            defs: Arena::with_capacity(256),
            blocks: Arena::new(),
            resume_points: Arena::new(),
            block_order: Vec::new(),
            entry: None,
            osr_block: None,
            next_id: 0,
            phase: GraphPhase::Building,
            config,
            current_pc: None,
            alias_analyzed: false,
        }
    }

    #[inline]
    pub fn config(&self) -> &MirConfig {
        &self.config
    }

    #[inline]
    pub fn phase(&self) -> GraphPhase {
        self.phase
    }

    /// Advance the compilation phase. Phases only move forward.
    pub fn set_phase(&mut self, phase: GraphPhase) {
        debug_assert!(phase >= self.phase, "graph phase moved backwards");
        self.phase = phase;
    }

    /// Whether alias analysis has given loads their dependencies. Until it
    /// has, no load is congruent to another or hoistable.
    #[inline]
    pub fn alias_analyzed(&self) -> bool {
        self.alias_analyzed
    }

    pub fn set_alias_analyzed(&mut self) {
        self.alias_analyzed = true;
    }

    /// Bytecode pc recorded on definitions created from now on, when
    /// snapshot tracking is enabled.
    pub fn set_current_pc(&mut self, pc: u32) {
        self.current_pc = Some(pc);
    }

    // =========================================================================
    // Access
    // =========================================================================

    #[inline]
    pub fn def(&self, id: DefId) -> &Definition {
        &self.defs[id]
    }

    #[inline]
    pub fn def_mut(&mut self, id: DefId) -> &mut Definition {
        &mut self.defs[id]
    }

    #[inline]
    pub fn kind(&self, id: DefId) -> &InstructionKind {
        &self.defs[id].kind
    }

    #[inline]
    pub fn result_type(&self, id: DefId) -> MirType {
        self.defs[id].result_type
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    #[inline]
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    #[inline]
    pub fn resume_point(&self, id: ResumePointId) -> &ResumePoint {
        &self.resume_points[id]
    }

    /// Total definitions ever allocated, including discarded ones.
    #[inline]
    pub fn num_defs(&self) -> usize {
        self.defs.len()
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in layout order.
    #[inline]
    pub fn blocks(&self) -> &[BlockId] {
        &self.block_order
    }

    #[inline]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry
    }

    #[inline]
    pub fn osr_block(&self) -> Option<BlockId> {
        self.osr_block
    }

    pub fn set_osr_block(&mut self, block: BlockId) {
        self.osr_block = Some(block);
    }

    /// Definitions that have not been discarded, in allocation order.
    pub fn live_defs(&self) -> impl Iterator<Item = DefId> + '_ {
        self.defs
            .iter()
            .filter(|(_, def)| !def.discarded)
            .map(|(id, _)| id)
    }

    /// Every resume point that has not been discarded.
    pub fn live_resume_points(&self) -> impl Iterator<Item = ResumePointId> + '_ {
        self.resume_points
            .iter()
            .filter(|(_, rp)| !rp.discarded)
            .map(|(id, _)| id)
    }

    // =========================================================================
    // Definition creation
    // =========================================================================

    /// Allocate a detached definition with `num_slots` uninitialized
    /// operand slots.
    pub(crate) fn alloc_def(
        &mut self,
        kind: InstructionKind,
        result_type: MirType,
        num_slots: usize,
    ) -> DefId {
        let mut def = Definition::new(self.next_id, kind, result_type);
        self.next_id += 1;
        def.operands = SmallVec::from_elem(DefId::INVALID, num_slots);
        if self.config.track_snapshots {
            def.tracked_pc = self.current_pc;
        }
        self.defs.alloc(def)
    }

    /// Allocate a definition and wire `operands` into slots `0..n`.
    pub(crate) fn create(
        &mut self,
        kind: InstructionKind,
        result_type: MirType,
        operands: &[DefId],
    ) -> DefId {
        let def = self.alloc_def(kind, result_type, operands.len());
        for (i, &op) in operands.iter().enumerate() {
            self.init_operand(NodeRef::Def(def), i, op);
        }
        def
    }

    /// Append a new operand slot to a variadic definition and wire it.
    pub(crate) fn push_operand(&mut self, def: DefId, value: DefId) -> usize {
        let index = self.defs[def].operands.len();
        self.defs[def].operands.push(DefId::INVALID);
        self.init_operand(NodeRef::Def(def), index, value);
        index
    }

    // =========================================================================
    // Use chains
    // =========================================================================

    /// Number of operand slots of `node`.
    pub fn num_operands(&self, node: NodeRef) -> usize {
        match node {
            NodeRef::Def(def) => self.defs[def].operands.len(),
            NodeRef::ResumePoint(rp) => self.resume_points[rp].operands.len(),
        }
    }

    /// Current occupant of slot `index` of `node`.
    pub fn get_operand(&self, node: NodeRef, index: usize) -> DefId {
        match node {
            NodeRef::Def(def) => self.defs[def].operands[index],
            NodeRef::ResumePoint(rp) => self.resume_points[rp].operands[index],
        }
    }

    fn write_operand(&mut self, node: NodeRef, index: usize, value: DefId) {
        match node {
            NodeRef::Def(def) => self.defs[def].set_operand(index, value),
            NodeRef::ResumePoint(rp) => self.resume_points[rp].set_operand(index, value),
        }
    }

    /// First write of slot `index`: store `value` and register the use.
    pub fn init_operand(&mut self, node: NodeRef, index: usize, value: DefId) {
        debug_assert!(
            !self.get_operand(node, index).is_valid(),
            "operand {} of {:?} initialized twice",
            index,
            node
        );
        self.write_operand(node, index, value);
        self.add_use(value, Use::new(node, index));
    }

    /// Register a reader of `value`.
    #[inline]
    pub fn add_use(&mut self, value: DefId, use_: Use) {
        self.defs[value].uses.push(use_);
    }

    /// Remove the use at `position` in `value`'s chain.
    #[inline]
    pub fn remove_use_at(&mut self, value: DefId, position: usize) -> Use {
        self.defs[value].uses.swap_remove(position)
    }

    /// Find and remove `use_` from `value`'s chain.
    pub fn remove_use(&mut self, value: DefId, use_: Use) -> Option<Use> {
        let position = self.defs[value].uses.iter().position(|u| *u == use_)?;
        Some(self.remove_use_at(value, position))
    }

    /// Put an existing use record on `value`'s chain. The slot it names
    /// must already hold `value`.
    pub fn link_use(&mut self, value: DefId, use_: Use) {
        debug_assert!(
            self.get_operand(use_.node, use_.index as usize) == value,
            "recycled use {:?} does not point at {}",
            use_,
            value
        );
        self.defs[value].uses.push(use_);
    }

    /// Move slot `index` of `node` to `value`, recycling its use record.
    pub fn replace_operand(&mut self, node: NodeRef, index: usize, value: DefId) {
        let old = self.get_operand(node, index);
        if old == value {
            return;
        }
        let slot_use = Use::new(node, index);
        let recycled = if old.is_valid() {
            self.remove_use(old, slot_use)
        } else {
            None
        };
        debug_assert!(
            !old.is_valid() || recycled.is_some(),
            "slot {} of {:?} missing from the chain of {}",
            index,
            node,
            old
        );
        self.write_operand(node, index, value);
        self.link_use(value, recycled.unwrap_or(slot_use));
    }

    /// Move the reader at `position` of `old`'s chain over to `value`.
    pub fn replace_operand_at_use(&mut self, old: DefId, position: usize, value: DefId) {
        if old == value {
            return;
        }
        let use_ = self.remove_use_at(old, position);
        debug_assert!(
            self.get_operand(use_.node, use_.index as usize) == old,
            "use chain of {} is stale",
            old
        );
        self.write_operand(use_.node, use_.index as usize, value);
        self.link_use(value, use_);
    }

    /// Redirect every reader of `old` to `value`. `old` ends with no uses.
    pub fn replace_all_uses_with(&mut self, old: DefId, value: DefId) {
        if old == value {
            return;
        }
        let uses = std::mem::take(&mut self.defs[old].uses);
        for u in &uses {
            debug_assert!(self.get_operand(u.node, u.index as usize) == old);
            self.write_operand(u.node, u.index as usize, value);
        }
        trace!(old = %old, new = %value, count = uses.len(), "replace all uses");
        self.defs[value].uses.extend(uses);
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Create an empty block with room for `num_slots` stack slots.
    pub fn new_block(&mut self, kind: BlockKind, pc: u32, num_slots: usize) -> BlockId {
        let id = self.blocks.next_id();
        self.blocks.alloc(BasicBlock::new(id, kind, pc, num_slots));
        self.block_order.push(id);
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    /// Create a block that continues from `pred`: it copies `pred`'s stack
    /// and records `pred` as its first predecessor.
    pub fn new_successor_block(&mut self, pred: BlockId, kind: BlockKind, pc: u32) -> BlockId {
        let num_slots = self.blocks[pred].num_slots();
        let id = self.new_block(kind, pc, num_slots);
        let pred_block = self.blocks[pred].clone();
        self.blocks[id].inherit_stack(&pred_block);
        self.blocks[id].predecessors.push(pred);
        id
    }

    /// Record an incoming edge.
    pub fn add_predecessor(&mut self, block: BlockId, pred: BlockId) {
        self.blocks[block].predecessors.push(pred);
    }

    /// Close a loop: add `pred` as the backedge of `header`.
    pub fn set_backedge(&mut self, header: BlockId, pred: BlockId) {
        let block = &mut self.blocks[header];
        debug_assert!(block.is_loop_header(), "backedge into a non-header");
        block.predecessors.push(pred);
        block.backedge = Some(pred);
        block.kind = BlockKind::LoopHeader;
    }

    /// Replace the layout order (e.g. with reverse postorder).
    pub fn set_block_order(&mut self, order: Vec<BlockId>) {
        if let Some(&first) = order.first() {
            self.entry = Some(first);
        }
        self.block_order = order;
    }

    /// Successor blocks, read off the final control instruction.
    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        match self.blocks[block].last {
            Some(last) => self.defs[last].kind.successors(),
            None => &[],
        }
    }

    /// The block's control instruction.
    pub fn control_instruction(&self, block: BlockId) -> Result<DefId> {
        self.blocks[block]
            .last
            .filter(|&last| self.defs[last].is_control_instruction())
            .ok_or(MirError::BlockNotTerminated { block })
    }

    // =========================================================================
    // Instruction streams
    // =========================================================================

    /// Instructions of `block` in order (phis excluded).
    pub fn instructions(&self, block: BlockId) -> InstructionIter<'_> {
        InstructionIter {
            graph: self,
            cursor: self.blocks[block].first,
        }
    }

    /// Snapshot of `block`'s instructions, for passes that mutate while
    /// walking.
    pub fn instruction_ids(&self, block: BlockId) -> Vec<DefId> {
        self.instructions(block).collect()
    }

    #[inline]
    pub fn next_instruction(&self, ins: DefId) -> Option<DefId> {
        self.defs[ins].next
    }

    #[inline]
    pub fn prev_instruction(&self, ins: DefId) -> Option<DefId> {
        self.defs[ins].prev
    }

    fn debug_assert_detached(&self, ins: DefId) {
        let def = &self.defs[ins];
        debug_assert!(def.block.is_none(), "{} is already in a block", ins);
        debug_assert!(!def.discarded, "{} was discarded", ins);
        debug_assert!(!def.is_phi(), "phis go through add_phi");
    }

    /// Append `ins` at the end of `block`.
    pub fn append(&mut self, block: BlockId, ins: DefId) {
        self.debug_assert_detached(ins);
        let tail = self.blocks[block].last;
        {
            let def = &mut self.defs[ins];
            def.block = Some(block);
            def.prev = tail;
            def.next = None;
        }
        match tail {
            Some(tail) => self.defs[tail].next = Some(ins),
            None => self.blocks[block].first = Some(ins),
        }
        let b = &mut self.blocks[block];
        b.last = Some(ins);
        b.num_instructions += 1;
    }

    /// Insert `ins` immediately before `at`.
    pub fn insert_before(&mut self, at: DefId, ins: DefId) -> Result<()> {
        let block = self.placed_block(at)?;
        self.debug_assert_detached(ins);
        let prev = self.defs[at].prev;
        {
            let def = &mut self.defs[ins];
            def.block = Some(block);
            def.prev = prev;
            def.next = Some(at);
        }
        self.defs[at].prev = Some(ins);
        match prev {
            Some(prev) => self.defs[prev].next = Some(ins),
            None => self.blocks[block].first = Some(ins),
        }
        self.blocks[block].num_instructions += 1;
        Ok(())
    }

    /// Insert `ins` immediately after `at`.
    pub fn insert_after(&mut self, at: DefId, ins: DefId) -> Result<()> {
        let block = self.placed_block(at)?;
        self.debug_assert_detached(ins);
        let next = self.defs[at].next;
        {
            let def = &mut self.defs[ins];
            def.block = Some(block);
            def.prev = Some(at);
            def.next = next;
        }
        self.defs[at].next = Some(ins);
        match next {
            Some(next) => self.defs[next].prev = Some(ins),
            None => self.blocks[block].last = Some(ins),
        }
        self.blocks[block].num_instructions += 1;
        Ok(())
    }

    /// Terminate `block` with a control instruction and record `block` as
    /// a predecessor of every successor it names.
    pub fn end(&mut self, block: BlockId, control: DefId) {
        debug_assert!(
            self.defs[control].is_control_instruction(),
            "{} is not a control instruction",
            control
        );
        self.append(block, control);
        let succs: SmallVec<[BlockId; 4]> =
            self.defs[control].kind.successors().iter().copied().collect();
        for succ in succs {
            self.blocks[succ].predecessors.push(block);
        }
    }

    /// Swap the control instruction of `block` for `replacement`, which
    /// must branch to the same set of blocks.
    pub fn replace_control(&mut self, block: BlockId, replacement: DefId) -> Result<()> {
        let old = self.control_instruction(block)?;
        self.remove_instruction(old)?;
        self.discard(old);
        self.append(block, replacement);
        Ok(())
    }

    /// Unlink `ins` from its block. Operands and uses are untouched, so the
    /// instruction can be re-inserted elsewhere.
    pub fn remove_instruction(&mut self, ins: DefId) -> Result<()> {
        let block = self.placed_block(ins)?;
        let (prev, next) = (self.defs[ins].prev, self.defs[ins].next);
        match prev {
            Some(prev) => self.defs[prev].next = next,
            None => self.blocks[block].first = next,
        }
        match next {
            Some(next) => self.defs[next].prev = prev,
            None => self.blocks[block].last = prev,
        }
        let def = &mut self.defs[ins];
        def.block = None;
        def.prev = None;
        def.next = None;
        self.blocks[block].num_instructions -= 1;
        Ok(())
    }

    fn placed_block(&self, ins: DefId) -> Result<BlockId> {
        let def = &self.defs[ins];
        match def.block {
            Some(block) if !def.is_phi() => Ok(block),
            _ => Err(MirError::NotAnInstruction { def: ins }),
        }
    }

    /// Add a phi to the head of `block`.
    pub fn add_phi(&mut self, block: BlockId, phi: DefId) {
        debug_assert!(self.defs[phi].is_phi(), "{} is not a phi", phi);
        debug_assert!(self.defs[phi].block.is_none(), "{} already placed", phi);
        self.defs[phi].block = Some(block);
        self.blocks[block].phis.push(phi);
    }

    // =========================================================================
    // Discarding
    // =========================================================================

    /// Remove `def` from the graph: unlink it, release every operand use
    /// and discard its resume point. `def` must have no remaining uses.
    pub fn discard(&mut self, def: DefId) {
        debug_assert!(
            !self.defs[def].has_uses(),
            "discarding {} which still has {} uses",
            def,
            self.defs[def].use_count()
        );
        if let Some(block) = self.defs[def].block {
            if self.defs[def].is_phi() {
                self.blocks[block].phis.retain(|&p| p != def);
                self.defs[def].block = None;
            } else if let Err(err) = self.remove_instruction(def) {
                debug_assert!(false, "{}", err);
            }
        }
        self.release_operands(NodeRef::Def(def));
        if let Some(rp) = self.defs[def].resume_point.take() {
            self.discard_resume_point(rp);
        }
        self.defs[def].discarded = true;
        trace!(def = %def, "discard");
    }

    /// Release every operand of a resume point and tombstone it.
    pub fn discard_resume_point(&mut self, rp: ResumePointId) {
        self.release_operands(NodeRef::ResumePoint(rp));
        let point = &mut self.resume_points[rp];
        point.discarded = true;
        point.instruction = None;
    }

    fn release_operands(&mut self, node: NodeRef) {
        for index in 0..self.num_operands(node) {
            let op = self.get_operand(node, index);
            if op.is_valid() {
                let removed = self.remove_use(op, Use::new(node, index));
                debug_assert!(removed.is_some(), "missing use of {} in slot {}", op, index);
                self.write_operand(node, index, DefId::INVALID);
            }
        }
    }

    // =========================================================================
    // Resume points
    // =========================================================================

    /// Snapshot the current stack of `block` at `pc`.
    pub fn new_resume_point(
        &mut self,
        block: BlockId,
        pc: u32,
        caller: Option<ResumePointId>,
        mode: ResumeMode,
    ) -> ResumePointId {
        let depth = self.blocks[block].stack_depth();
        let rp = self
            .resume_points
            .alloc(ResumePoint::new(block, pc, caller, mode, depth));
        self.inherit(rp, block);
        rp
    }

    /// Copy `block`'s live stack into the operands of `rp`.
    fn inherit(&mut self, rp: ResumePointId, block: BlockId) {
        let stack: SmallVec<[DefId; 16]> = self.blocks[block].stack().iter().copied().collect();
        for (slot, value) in stack.into_iter().enumerate() {
            if value.is_valid() {
                self.init_operand(NodeRef::ResumePoint(rp), slot, value);
            }
        }
    }

    /// Attach the resume point that captures state right after `ins`.
    pub fn attach_resume_point(&mut self, ins: DefId, rp: ResumePointId) {
        debug_assert!(
            self.defs[ins].resume_point.is_none(),
            "{} already has a resume point",
            ins
        );
        self.defs[ins].resume_point = Some(rp);
        self.resume_points[rp].instruction = Some(ins);
    }

    pub fn set_entry_resume_point(&mut self, block: BlockId, rp: ResumePointId) {
        self.blocks[block].entry_resume_point = Some(rp);
    }

    /// Number of frames in the inlining chain ending at `rp`.
    pub fn frame_count(&self, rp: ResumePointId) -> usize {
        let mut count = 0;
        let mut cursor = Some(rp);
        while let Some(current) = cursor {
            count += 1;
            cursor = self.resume_points[current].caller;
        }
        count
    }

    /// Frames of the chain ending at `newest`, oldest first.
    pub fn flattened_resume_points(&self, newest: ResumePointId) -> FlattenedResumePointIter<'_> {
        FlattenedResumePointIter::new(self, newest)
    }

    // =========================================================================
    // Numbering and lowering
    // =========================================================================

    /// Reassign definition ids in layout order: each block's phis, then its
    /// instructions.
    pub fn renumber_definitions(&mut self) {
        let mut next = 0u32;
        for bi in 0..self.block_order.len() {
            let block = self.block_order[bi];
            let phis = self.blocks[block].phis.clone();
            for phi in phis {
                self.defs[phi].id = next;
                next += 1;
            }
            let mut cursor = self.blocks[block].first;
            while let Some(ins) = cursor {
                self.defs[ins].id = next;
                next += 1;
                cursor = self.defs[ins].next;
            }
        }
        self.next_id = next;
    }

    /// Read a dependency, refusing once the slot holds a register.
    pub fn try_dependency(&self, def: DefId) -> Result<Option<DefId>> {
        match self.defs[def].lowering_slot() {
            super::node::LoweringSlot::Dependency(dep) => Ok(dep),
            super::node::LoweringSlot::VirtualRegister(_) => Err(MirError::LoweringConflict {
                def,
                reason: "dependency read after register assignment",
            }),
        }
    }

    /// Assign a virtual register. Only legal once lowering has begun.
    pub fn set_virtual_register(&mut self, def: DefId, vreg: u32) -> Result<()> {
        if self.phase != GraphPhase::Lowered {
            return Err(MirError::LoweringConflict {
                def,
                reason: "register assigned before lowering",
            });
        }
        self.defs[def].set_virtual_register(vreg);
        Ok(())
    }
}

impl Default for MirGraph {
    fn default() -> Self {
        Self::new(MirConfig::default())
    }
}

// =============================================================================
// Instruction iterator
// =============================================================================

/// Walks a block's instruction list front to back.
pub struct InstructionIter<'g> {
    graph: &'g MirGraph,
    cursor: Option<DefId>,
}

impl Iterator for InstructionIter<'_> {
    type Item = DefId;

    fn next(&mut self) -> Option<DefId> {
        let current = self.cursor?;
        self.cursor = self.graph.defs[current].next;
        Some(current)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::ConstValue;

    fn graph_with_block() -> (MirGraph, BlockId) {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 8);
        (g, b)
    }

    #[test]
    fn test_init_operand_registers_use() {
        let (mut g, b) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let y = g.new_constant(ConstValue::Int32(2));
        let add = g.new_add(x, y);
        g.append(b, x);
        g.append(b, y);
        g.append(b, add);

        assert_eq!(g.def(x).uses(), &[Use::new(NodeRef::Def(add), 0)]);
        assert_eq!(g.def(y).uses(), &[Use::new(NodeRef::Def(add), 1)]);
        assert_eq!(g.instruction_ids(b), vec![x, y, add]);
    }

    #[test]
    fn test_replace_operand_moves_use() {
        let (mut g, _) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let y = g.new_constant(ConstValue::Int32(2));
        let z = g.new_constant(ConstValue::Int32(3));
        let add = g.new_add(x, y);

        g.replace_operand(NodeRef::Def(add), 1, z);

        assert!(!g.def(y).has_uses());
        assert_eq!(g.def(z).uses(), &[Use::new(NodeRef::Def(add), 1)]);
        assert_eq!(g.def(add).get_operand(1), z);
    }

    #[test]
    fn test_replace_operand_with_same_value_is_noop() {
        let (mut g, _) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let add = g.new_add(x, x);
        g.replace_operand(NodeRef::Def(add), 0, x);
        assert_eq!(g.def(x).use_count(), 2);
    }

    #[test]
    fn test_replace_all_uses_with_empties_old_chain() {
        let (mut g, _) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let y = g.new_constant(ConstValue::Int32(2));
        let a = g.new_add(x, x);
        let s = g.new_sub(x, y);

        g.replace_all_uses_with(x, y);

        assert!(!g.def(x).has_uses());
        assert_eq!(g.def(y).use_count(), 4);
        assert_eq!(g.def(a).operands(), &[y, y]);
        assert_eq!(g.def(s).operands(), &[y, y]);
    }

    #[test]
    fn test_replace_operand_at_use() {
        let (mut g, _) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let y = g.new_constant(ConstValue::Int32(2));
        let add = g.new_add(x, y);

        let position = g
            .def(x)
            .uses()
            .iter()
            .position(|u| u.node == NodeRef::Def(add))
            .unwrap();
        g.replace_operand_at_use(x, position, y);

        assert_eq!(g.def(add).operands(), &[y, y]);
        assert_eq!(g.def(y).use_count(), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "does not point at")]
    fn test_link_use_rejects_mismatched_slot() {
        let (mut g, _) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let y = g.new_constant(ConstValue::Int32(2));
        let add = g.new_add(x, x);
        g.link_use(y, Use::new(NodeRef::Def(add), 0));
    }

    #[test]
    fn test_insert_before_and_after() {
        let (mut g, b) = graph_with_block();
        let a = g.new_constant(ConstValue::Int32(1));
        let c = g.new_constant(ConstValue::Int32(3));
        g.append(b, a);
        g.append(b, c);

        let before = g.new_constant(ConstValue::Int32(0));
        let middle = g.new_constant(ConstValue::Int32(2));
        g.insert_before(a, before).unwrap();
        g.insert_after(a, middle).unwrap();

        assert_eq!(g.instruction_ids(b), vec![before, a, middle, c]);
        assert_eq!(g.block(b).num_instructions(), 4);
        assert_eq!(g.block(b).first_instruction(), Some(before));
    }

    #[test]
    fn test_insert_before_detached_errors() {
        let (mut g, _) = graph_with_block();
        let a = g.new_constant(ConstValue::Int32(1));
        let b = g.new_constant(ConstValue::Int32(2));
        assert!(matches!(g.insert_before(a, b), Err(MirError::NotAnInstruction { .. })));
    }

    #[test]
    fn test_remove_and_discard() {
        let (mut g, b) = graph_with_block();
        let x = g.new_constant(ConstValue::Int32(1));
        let add = g.new_add(x, x);
        g.append(b, x);
        g.append(b, add);

        g.discard(add);

        assert!(g.def(add).is_discarded());
        assert!(!g.def(x).has_uses());
        assert_eq!(g.instruction_ids(b), vec![x]);
        assert_eq!(g.block(b).last_instruction(), Some(x));
    }

    #[test]
    fn test_end_records_predecessors() {
        let mut g = MirGraph::default();
        let entry = g.new_block(BlockKind::Normal, 0, 0);
        let exit = g.new_block(BlockKind::Normal, 4, 0);
        let goto = g.new_goto(exit);
        g.end(entry, goto);

        assert_eq!(g.successors(entry), &[exit]);
        assert_eq!(g.block(exit).predecessors(), &[entry]);
        assert_eq!(g.control_instruction(entry), Ok(goto));
        assert!(matches!(
            g.control_instruction(exit),
            Err(MirError::BlockNotTerminated { .. })
        ));
    }

    #[test]
    fn test_renumber_follows_layout() {
        let (mut g, b) = graph_with_block();
        let late = g.new_constant(ConstValue::Int32(1));
        let early = g.new_constant(ConstValue::Int32(2));
        g.append(b, early);
        g.append(b, late);

        g.renumber_definitions();

        assert_eq!(g.def(early).id(), 0);
        assert_eq!(g.def(late).id(), 1);
    }

    #[test]
    fn test_tracked_pc_follows_config() {
        let mut g = MirGraph::new(MirConfig {
            track_snapshots: true,
            ..MirConfig::default()
        });
        g.set_current_pc(17);
        let c = g.new_constant(ConstValue::Null);
        assert_eq!(g.def(c).tracked_pc(), Some(17));

        let mut plain = MirGraph::new(MirConfig {
            track_snapshots: false,
            ..MirConfig::default()
        });
        plain.set_current_pc(17);
        let c = plain.new_constant(ConstValue::Null);
        assert_eq!(plain.def(c).tracked_pc(), None);
    }

    #[test]
    fn test_virtual_register_requires_lowering_phase() {
        let (mut g, _) = graph_with_block();
        let c = g.new_constant(ConstValue::Null);
        assert!(g.set_virtual_register(c, 1).is_err());

        g.set_phase(GraphPhase::Lowered);
        g.set_virtual_register(c, 1).unwrap();
        assert_eq!(g.def(c).virtual_register(), Some(1));
        assert!(matches!(
            g.try_dependency(c),
            Err(MirError::LoweringConflict { .. })
        ));
    }
}
