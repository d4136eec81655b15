//! Numeric edge-case analysis.
//!
//! Runs the per-instruction range hooks until they stop changing
//! anything:
//! - forward, in reverse postorder, so constants refine their users
//! - backward, in postorder, so a use's truncation reaches its inputs
//!
//! Clearing an edge-case flag can make an instruction infallible, which in
//! turn lets its own inputs drop their checks, hence the fixed point.

use super::OptimizationPass;
use crate::error::Result;
use crate::ir::cfg::Cfg;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use tracing::{debug, trace};

/// Range and truncation analysis pass.
#[derive(Debug, Default)]
pub struct RangeAnalysis {
    refined: usize,
    iterations: usize,
}

impl RangeAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions whose attributes changed in the last run.
    pub fn refined(&self) -> usize {
        self.refined
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn analyze(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.refined = 0;
        self.iterations = 0;
        let cfg = Cfg::build(graph);
        let order: Vec<DefId> = cfg
            .rpo
            .iter()
            .flat_map(|&block| {
                let mut defs = graph.block(block).phis().to_vec();
                defs.extend(graph.instructions(block));
                defs
            })
            .collect();

        let bound = graph.config().max_iterations.max(1);
        loop {
            self.iterations += 1;
            let mut changed = 0;
            for &def in &order {
                changed += refine(graph, def, MirGraph::analyze_range_forward);
            }
            for &def in order.iter().rev() {
                changed += refine(graph, def, MirGraph::analyze_range_backward);
                changed += refine(graph, def, MirGraph::analyze_truncate_backward);
            }
            self.refined += changed;
            if changed == 0 || self.iterations >= bound {
                break;
            }
        }
        debug!(refined = self.refined, iterations = self.iterations, "range analysis");
        Ok(self.refined > 0)
    }
}

/// Apply `hook` and report whether the instruction's attributes changed.
fn refine(graph: &mut MirGraph, def: DefId, hook: fn(&mut MirGraph, DefId)) -> usize {
    if graph.def(def).is_discarded() {
        return 0;
    }
    let before = graph.def(def).kind().clone();
    hook(graph, def);
    if *graph.def(def).kind() == before {
        0
    } else {
        trace!(def = %def, "refined");
        1
    }
}

impl OptimizationPass for RangeAnalysis {
    fn name(&self) -> &'static str {
        "range"
    }

    fn run(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.analyze(graph)
    }
}
