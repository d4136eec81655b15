//! Resume points: interpreter-visible state for bailouts.
//!
//! A resume point snapshots a block's interpreter stack at a bytecode pc.
//! Resume points of inlined frames link to the resume point of their
//! caller, newest to oldest. The deoptimization metadata serializer wants
//! the opposite order, so [`FlattenedResumePointIter`] materializes the
//! chain and reverses it before yielding anything.

use super::arena::Id;
use super::block::BlockId;
use super::graph::MirGraph;
use super::node::DefId;
use smallvec::SmallVec;
use std::fmt;

/// Identifier of a resume point in the graph arena.
pub type ResumePointId = Id<ResumePoint>;

/// Where execution resumes after a bailout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResumeMode {
    /// Re-execute the instruction at `pc`.
    ResumeAt,
    /// Continue with the instruction following `pc`.
    ResumeAfter,
    /// Caller frame of an inlined call; resumes after the call returns.
    Outer,
}

impl ResumeMode {
    pub const fn name(self) -> &'static str {
        match self {
            ResumeMode::ResumeAt => "At",
            ResumeMode::ResumeAfter => "After",
            ResumeMode::Outer => "Outer",
        }
    }
}

/// Snapshot of a frame's interpreter stack.
#[derive(Clone)]
pub struct ResumePoint {
    pub(crate) operands: Box<[DefId]>,
    pub(crate) pc: u32,
    pub(crate) caller: Option<ResumePointId>,
    pub(crate) mode: ResumeMode,
    pub(crate) block: BlockId,
    pub(crate) instruction: Option<DefId>,
    pub(crate) discarded: bool,
}

impl ResumePoint {
    pub(crate) fn new(
        block: BlockId,
        pc: u32,
        caller: Option<ResumePointId>,
        mode: ResumeMode,
        stack_depth: usize,
    ) -> Self {
        ResumePoint {
            operands: vec![DefId::INVALID; stack_depth].into_boxed_slice(),
            pc,
            caller,
            mode,
            block,
            instruction: None,
            discarded: false,
        }
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    #[inline]
    pub fn mode(&self) -> ResumeMode {
        self.mode
    }

    #[inline]
    pub fn caller(&self) -> Option<ResumePointId> {
        self.caller
    }

    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// The instruction this resume point is attached to, if any.
    #[inline]
    pub fn instruction(&self) -> Option<DefId> {
        self.instruction
    }

    /// Number of captured stack slots. Fixed at construction.
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.operands.len()
    }

    #[inline]
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    #[inline]
    pub fn get_operand(&self, index: usize) -> DefId {
        self.operands[index]
    }

    #[inline]
    pub fn operands(&self) -> &[DefId] {
        &self.operands
    }

    #[inline]
    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    #[inline]
    pub(crate) fn set_operand(&mut self, index: usize, def: DefId) {
        self.operands[index] = def;
    }
}

impl fmt::Debug for ResumePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resumepoint mode={} pc={}", self.mode.name(), self.pc)?;
        for op in self.operands.iter() {
            write!(f, " {}", op)?;
        }
        Ok(())
    }
}

// =============================================================================
// Flattened iteration
// =============================================================================

/// Frames of an inlined resume-point chain, oldest caller first.
pub struct FlattenedResumePointIter<'g> {
    graph: &'g MirGraph,
    frames: SmallVec<[ResumePointId; 8]>,
    num_operands: usize,
}

impl<'g> FlattenedResumePointIter<'g> {
    /// Collect the chain ending at `newest`.
    pub fn new(graph: &'g MirGraph, newest: ResumePointId) -> Self {
        let mut frames = SmallVec::new();
        let mut num_operands = 0;
        let mut cursor = Some(newest);
        while let Some(rp) = cursor {
            frames.push(rp);
            num_operands += graph.resume_point(rp).stack_depth();
            cursor = graph.resume_point(rp).caller();
        }
        frames.reverse();
        FlattenedResumePointIter {
            graph,
            frames,
            num_operands,
        }
    }

    /// Frames from outermost to innermost.
    pub fn frames(&self) -> &[ResumePointId] {
        &self.frames
    }

    /// Total captured slots across every frame.
    pub fn num_operands(&self) -> usize {
        self.num_operands
    }

    /// Every captured value in serialization order.
    pub fn operands(&self) -> impl Iterator<Item = DefId> + '_ {
        self.frames
            .iter()
            .flat_map(move |&rp| self.graph.resume_point(rp).operands().iter().copied())
    }

    /// Iterate the frames themselves.
    pub fn iter(&self) -> impl Iterator<Item = (ResumePointId, &'g ResumePoint)> + '_ {
        let graph = self.graph;
        self.frames.iter().map(move |&rp| (rp, graph.resume_point(rp)))
    }
}
