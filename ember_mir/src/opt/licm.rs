//! Loop-Invariant Code Motion.
//!
//! Moves instructions whose inputs are all defined outside a loop into the
//! loop's preheader, just before its control instruction. Loops are
//! processed innermost first, so an instruction can climb through several
//! levels of nesting in one run.
//!
//! An instruction is hoisted when it:
//! - is movable (guards included; they move but are never removed)
//! - does not write memory
//! - is not a load, unless alias analysis has run
//! - has no resume point attached
//! - has every operand defined outside the loop
//! - has no dependency on a store inside the loop

use super::OptimizationPass;
use crate::error::Result;
use crate::ir::arena::BitSet;
use crate::ir::cfg::{Cfg, DominatorTree, Loop, LoopAnalysis};
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Loop-invariant code motion pass.
#[derive(Debug, Default)]
pub struct Licm {
    hoisted: usize,
}

impl Licm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions hoisted in the last run.
    #[inline]
    pub fn hoisted(&self) -> usize {
        self.hoisted
    }

    pub fn run_licm(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.hoisted = 0;
        let cfg = Cfg::build(graph);
        let dom = DominatorTree::build(graph, &cfg);
        let loops = LoopAnalysis::compute(graph, &cfg, &dom);
        if loops.loops.is_empty() {
            return Ok(false);
        }

        let rpo_index: FxHashMap<_, _> =
            cfg.rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();
        let mut order: Vec<&Loop> = loops.loops.iter().collect();
        order.sort_by_key(|lp| std::cmp::Reverse(lp.depth));

        for lp in order {
            let Some(preheader) = lp.preheader else {
                continue;
            };
            if graph.successors(preheader) != [lp.header] {
                continue;
            }
            let mut members = BitSet::with_capacity(cfg.num_blocks());
            for &block in &lp.body {
                members.insert(block.as_usize());
            }
            let mut body = lp.body.clone();
            body.sort_by_key(|b| rpo_index.get(b).copied().unwrap_or(usize::MAX));

            for block in body {
                for ins in graph.instruction_ids(block) {
                    if !is_hoistable(graph, &members, ins) {
                        continue;
                    }
                    let at = graph.control_instruction(preheader)?;
                    graph.remove_instruction(ins)?;
                    graph.insert_before(at, ins)?;
                    graph.def_mut(ins).set_loop_invariant_unchecked();
                    self.hoisted += 1;
                    trace!(def = %ins, preheader = %preheader, "hoist");
                }
            }
        }

        debug!(hoisted = self.hoisted, loops = loops.loops.len(), "licm");
        Ok(self.hoisted > 0)
    }
}

fn defined_in(graph: &MirGraph, members: &BitSet, def: DefId) -> bool {
    graph
        .def(def)
        .block()
        .is_some_and(|block| members.contains(block.as_usize()))
}

fn is_hoistable(graph: &MirGraph, members: &BitSet, ins: DefId) -> bool {
    let d = graph.def(ins);
    if d.is_discarded() || d.is_control_instruction() || d.is_phi() {
        return false;
    }
    if !d.is_movable() || d.resume_point().is_some() {
        return false;
    }
    let set = graph.alias_set(ins);
    if set.is_store() || (set.is_load() && !graph.alias_analyzed()) {
        return false;
    }
    if d
        .operands()
        .iter()
        .any(|&op| op.is_valid() && defined_in(graph, members, op))
    {
        return false;
    }
    !d.dependency().is_some_and(|dep| defined_in(graph, members, dep))
}

impl OptimizationPass for Licm {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn run(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.run_licm(graph)
    }
}
