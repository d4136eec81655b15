//! Control-flow analyses over MIR blocks.
//!
//! MIR blocks carry their edges directly: successors are read off each
//! block's control instruction and predecessors are recorded by `end`.
//! This module derives what passes need on top of that:
//! - **Reverse postorder**: the iteration order for forward dataflow
//! - **Dominator tree**: scoping for value numbering
//! - **Natural loops**: headers, bodies and preheaders for LICM

use super::arena::{BitSet, SecondaryMap};
use super::block::BlockId;
use super::graph::MirGraph;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

// =============================================================================
// Orders
// =============================================================================

/// Block orders of a graph.
#[derive(Debug, Clone)]
pub struct Cfg {
    /// Entry block.
    pub entry: BlockId,

    /// Blocks reachable from the entry in reverse postorder.
    pub rpo: Vec<BlockId>,

    /// Postorder number of each reachable block.
    postorder: SecondaryMap<super::block::BasicBlock, u32>,

    /// Number of blocks in the graph, reachable or not.
    num_blocks: usize,
}

impl Cfg {
    /// Compute the orders of `graph`. An empty graph has an empty order.
    pub fn build(graph: &MirGraph) -> Self {
        let mut cfg = Cfg {
            entry: graph.entry_block().unwrap_or(BlockId::INVALID),
            rpo: Vec::new(),
            postorder: SecondaryMap::with_default(u32::MAX),
            num_blocks: graph.num_blocks(),
        };
        if cfg.entry.is_valid() {
            cfg.compute_rpo(graph);
        }
        cfg
    }

    fn compute_rpo(&mut self, graph: &MirGraph) {
        let mut visited = BitSet::with_capacity(self.num_blocks);
        let mut postorder = Vec::with_capacity(self.num_blocks);

        // Explicit stack of (block, next successor index).
        let mut stack = vec![(self.entry, 0usize)];
        visited.insert(self.entry.as_usize());
        while let Some(top) = stack.last_mut() {
            let (block, next) = *top;
            if let Some(&succ) = graph.successors(block).get(next) {
                top.1 += 1;
                if visited.insert(succ.as_usize()) {
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(block);
                stack.pop();
            }
        }

        for (i, &block) in postorder.iter().enumerate() {
            self.postorder.set(block, i as u32);
        }
        postorder.reverse();
        self.rpo = postorder;
    }

    #[inline]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        *self.postorder.get(block) != u32::MAX
    }

    #[inline]
    pub fn postorder_number(&self, block: BlockId) -> u32 {
        *self.postorder.get(block)
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }
}

// =============================================================================
// Dominator Tree
// =============================================================================

/// Dominator tree, computed with the Cooper-Harvey-Kennedy iteration.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: SecondaryMap<super::block::BasicBlock, BlockId>,
    children: FxHashMap<BlockId, Vec<BlockId>>,
    depth: SecondaryMap<super::block::BasicBlock, u32>,
}

impl DominatorTree {
    pub fn build(graph: &MirGraph, cfg: &Cfg) -> Self {
        let mut dom = DominatorTree {
            idom: SecondaryMap::with_default(BlockId::INVALID),
            children: FxHashMap::default(),
            depth: SecondaryMap::with_default(0),
        };
        if !cfg.entry.is_valid() {
            return dom;
        }
        dom.idom.set(cfg.entry, cfg.entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in cfg.rpo.iter().skip(1) {
                let mut new_idom = BlockId::INVALID;
                for &pred in graph.block(block).predecessors() {
                    if !dom.idom.get(pred).is_valid() {
                        continue;
                    }
                    new_idom = if new_idom.is_valid() {
                        dom.intersect(pred, new_idom, cfg)
                    } else {
                        pred
                    };
                }
                if new_idom.is_valid() && *dom.idom.get(block) != new_idom {
                    dom.idom.set(block, new_idom);
                    changed = true;
                }
            }
        }

        for &block in cfg.rpo.iter().skip(1) {
            let idom = *dom.idom.get(block);
            if idom.is_valid() {
                dom.children.entry(idom).or_default().push(block);
                let depth = *dom.depth.get(idom) + 1;
                dom.depth.set(block, depth);
            }
        }
        dom
    }

    fn intersect(&self, mut b1: BlockId, mut b2: BlockId, cfg: &Cfg) -> BlockId {
        while b1 != b2 {
            while cfg.postorder_number(b1) < cfg.postorder_number(b2) {
                b1 = *self.idom.get(b1);
            }
            while cfg.postorder_number(b2) < cfg.postorder_number(b1) {
                b2 = *self.idom.get(b2);
            }
        }
        b1
    }

    /// Immediate dominator; `None` for the entry and unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        let idom = *self.idom.get(block);
        (idom.is_valid() && idom != block).then_some(idom)
    }

    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map_or(&[], |v| v.as_slice())
    }

    pub fn depth(&self, block: BlockId) -> u32 {
        *self.depth.get(block)
    }

    /// Whether `a` dominates `b`. Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let mut current = b;
        while let Some(idom) = self.idom(current) {
            if idom == a {
                return true;
            }
            current = idom;
        }
        false
    }
}

// =============================================================================
// Loop Analysis
// =============================================================================

/// A natural loop.
#[derive(Debug, Clone)]
pub struct Loop {
    pub header: BlockId,

    /// Sources of edges back to the header.
    pub back_edges: Vec<BlockId>,

    /// Every block of the loop, header included.
    pub body: Vec<BlockId>,

    /// The single predecessor of the header from outside the loop, if
    /// there is exactly one.
    pub preheader: Option<BlockId>,

    /// Enclosing loop.
    pub parent: Option<usize>,

    /// Nesting depth, 1 for outermost loops.
    pub depth: u32,
}

impl Loop {
    #[inline]
    pub fn contains(&self, block: BlockId) -> bool {
        self.body.contains(&block)
    }
}

/// Natural loops of a graph.
#[derive(Debug, Clone, Default)]
pub struct LoopAnalysis {
    pub loops: Vec<Loop>,
    header_to_loop: FxHashMap<BlockId, usize>,
    block_to_loop: FxHashMap<BlockId, usize>,
}

impl LoopAnalysis {
    /// Find loops from edges whose target dominates their source.
    pub fn compute(graph: &MirGraph, cfg: &Cfg, dom: &DominatorTree) -> Self {
        let mut analysis = LoopAnalysis::default();
        for &block in &cfg.rpo {
            for &succ in graph.successors(block) {
                if dom.dominates(succ, block) {
                    analysis.add_loop(graph, cfg, succ, block);
                }
            }
        }
        analysis.compute_nesting();
        for i in 0..analysis.loops.len() {
            let preheader = analysis.find_preheader(graph, i);
            analysis.loops[i].preheader = preheader;
        }
        analysis
    }

    fn add_loop(&mut self, graph: &MirGraph, cfg: &Cfg, header: BlockId, back_edge: BlockId) {
        if let Some(&index) = self.header_to_loop.get(&header) {
            let lp = &mut self.loops[index];
            if !lp.back_edges.contains(&back_edge) {
                lp.back_edges.push(back_edge);
            }
            self.collect_body(graph, cfg, index, back_edge);
            return;
        }

        let index = self.loops.len();
        self.loops.push(Loop {
            header,
            back_edges: vec![back_edge],
            body: vec![header],
            preheader: None,
            parent: None,
            depth: 1,
        });
        self.header_to_loop.insert(header, index);
        self.collect_body(graph, cfg, index, back_edge);
    }

    /// Walk predecessors back from `back_edge` until the header.
    fn collect_body(&mut self, graph: &MirGraph, cfg: &Cfg, index: usize, back_edge: BlockId) {
        let mut body = BitSet::with_capacity(cfg.num_blocks());
        for &block in &self.loops[index].body {
            body.insert(block.as_usize());
        }
        let mut worklist = VecDeque::from([back_edge]);
        while let Some(block) = worklist.pop_front() {
            if body.insert(block.as_usize()) {
                self.loops[index].body.push(block);
                worklist.extend(
                    graph
                        .block(block)
                        .predecessors()
                        .iter()
                        .copied()
                        .filter(|&p| cfg.is_reachable(p)),
                );
            }
        }
    }

    fn compute_nesting(&mut self) {
        let n = self.loops.len();
        for i in 0..n {
            let header = self.loops[i].header;
            let parent = (0..n)
                .filter(|&j| j != i && self.loops[j].contains(header))
                .min_by_key(|&j| self.loops[j].body.len());
            self.loops[i].parent = parent;
        }
        for i in 0..n {
            let mut depth = 1;
            let mut cursor = self.loops[i].parent;
            while let Some(p) = cursor {
                depth += 1;
                cursor = self.loops[p].parent;
            }
            self.loops[i].depth = depth;
        }
        // Innermost loop wins for each block.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| self.loops[i].depth);
        for i in order {
            for &block in &self.loops[i].body {
                self.block_to_loop.insert(block, i);
            }
        }
    }

    fn find_preheader(&self, graph: &MirGraph, index: usize) -> Option<BlockId> {
        let lp = &self.loops[index];
        let mut outside = graph
            .block(lp.header)
            .predecessors()
            .iter()
            .copied()
            .filter(|p| !lp.contains(*p));
        let first = outside.next()?;
        if outside.next().is_some() {
            return None;
        }
        Some(first)
    }

    pub fn loop_for_header(&self, header: BlockId) -> Option<&Loop> {
        self.header_to_loop.get(&header).map(|&i| &self.loops[i])
    }

    /// Innermost loop containing `block`.
    pub fn loop_for_block(&self, block: BlockId) -> Option<&Loop> {
        self.block_to_loop.get(&block).map(|&i| &self.loops[i])
    }

    /// Nesting depth of `block`, 0 outside every loop.
    pub fn loop_depth(&self, block: BlockId) -> u32 {
        self.loop_for_block(block).map_or(0, |lp| lp.depth)
    }
}

impl MirGraph {
    /// Lay blocks out in reverse postorder, dropping unreachable ones
    /// from the order, and record each block's loop depth.
    pub fn reorder_blocks(&mut self) -> (Cfg, DominatorTree, LoopAnalysis) {
        let cfg = Cfg::build(self);
        let dom = DominatorTree::build(self, &cfg);
        let loops = LoopAnalysis::compute(self, &cfg, &dom);
        for &block in &cfg.rpo {
            let depth = loops.loop_depth(block);
            self.block_mut(block).set_loop_depth(depth);
        }
        self.set_block_order(cfg.rpo.clone());
        (cfg, dom, loops)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::value::ConstValue;

    /// entry -> header <-> body, header -> exit
    fn simple_loop() -> (MirGraph, [BlockId; 4]) {
        let mut g = MirGraph::default();
        let entry = g.new_block(BlockKind::Normal, 0, 0);
        let header = g.new_block(BlockKind::PendingLoopHeader, 2, 0);
        let body = g.new_block(BlockKind::Normal, 4, 0);
        let exit = g.new_block(BlockKind::Normal, 8, 0);

        let goto = g.new_goto(header);
        g.end(entry, goto);
        let cond = g.new_constant(ConstValue::Boolean(true));
        g.append(header, cond);
        let test = g.new_test(cond, body, exit);
        g.end(header, test);
        let back = g.new_goto(header);
        g.append(body, back);
        g.set_backedge(header, body);
        let undef = g.new_constant(ConstValue::Undefined);
        g.append(exit, undef);
        let ret = g.new_return(undef);
        g.end(exit, ret);
        (g, [entry, header, body, exit])
    }

    #[test]
    fn test_rpo_starts_at_entry() {
        let (g, [entry, header, body, exit]) = simple_loop();
        let cfg = Cfg::build(&g);
        assert_eq!(cfg.rpo[0], entry);
        assert_eq!(cfg.rpo[1], header);
        assert_eq!(cfg.rpo.len(), 4);
        assert!(cfg.rpo.contains(&body) && cfg.rpo.contains(&exit));
    }

    #[test]
    fn test_dominators() {
        let (g, [entry, header, body, exit]) = simple_loop();
        let cfg = Cfg::build(&g);
        let dom = DominatorTree::build(&g, &cfg);
        assert_eq!(dom.idom(entry), None);
        assert_eq!(dom.idom(header), Some(entry));
        assert_eq!(dom.idom(body), Some(header));
        assert_eq!(dom.idom(exit), Some(header));
        assert!(dom.dominates(entry, exit));
        assert!(!dom.dominates(body, exit));
        assert_eq!(dom.depth(body), 2);
        assert_eq!(dom.children(header).len(), 2);
    }

    #[test]
    fn test_loop_detection() {
        let (g, [entry, header, body, exit]) = simple_loop();
        let cfg = Cfg::build(&g);
        let dom = DominatorTree::build(&g, &cfg);
        let loops = LoopAnalysis::compute(&g, &cfg, &dom);
        assert_eq!(loops.loops.len(), 1);
        let lp = loops.loop_for_header(header).unwrap();
        assert_eq!(lp.back_edges, vec![body]);
        assert_eq!(lp.preheader, Some(entry));
        assert!(lp.contains(body) && !lp.contains(exit));
        assert_eq!(loops.loop_depth(body), 1);
        assert_eq!(loops.loop_depth(exit), 0);
    }

    #[test]
    fn test_reorder_drops_unreachable() {
        let (mut g, [entry, header, body, _]) = simple_loop();
        let dead = g.new_block(BlockKind::Normal, 20, 0);
        let (cfg, _, _) = g.reorder_blocks();
        assert!(!cfg.is_reachable(dead));
        assert!(!g.blocks().contains(&dead));
        assert_eq!(g.entry_block(), Some(entry));
        assert_eq!(g.block(body).loop_depth(), 1);
        assert_eq!(g.block(header).loop_depth(), 1);
    }
}
