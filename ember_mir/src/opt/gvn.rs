//! Global Value Numbering.
//!
//! Walks the dominator tree from the entry. Each definition is first
//! folded; whatever survives is looked up in a table scoped to the
//! dominating blocks, and a congruent entry replaces it.
//!
//! ```text
//! block0:                        block0:
//!   add3 = add p1 p2               add3 = add p1 p2
//!   add4 = add p2 p1     ==>       mul5 = mul add3 add3
//!   mul5 = mul add3 add4
//! ```
//!
//! A definition's value number is the id of the representative it was
//! merged into. Value numbers are recomputed from scratch on every
//! iteration, so a replacement that exposes further folds is picked up by
//! the next round.

use super::OptimizationPass;
use crate::error::Result;
use crate::ir::block::BlockId;
use crate::ir::cfg::{Cfg, DominatorTree};
use crate::ir::graph::MirGraph;
use crate::ir::instructions::HashNumber;
use crate::ir::node::DefId;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

// =============================================================================
// Scoped Value Table
// =============================================================================

/// Hash buckets of numbered definitions, with an undo log so a subtree's
/// entries can be dropped when the walk leaves it.
#[derive(Default)]
struct ValueTable {
    buckets: FxHashMap<HashNumber, Vec<DefId>>,
    log: Vec<HashNumber>,
}

impl ValueTable {
    fn mark(&self) -> usize {
        self.log.len()
    }

    fn insert(&mut self, hash: HashNumber, def: DefId) {
        self.buckets.entry(hash).or_default().push(def);
        self.log.push(hash);
    }

    fn truncate(&mut self, mark: usize) {
        while self.log.len() > mark {
            let Some(hash) = self.log.pop() else { break };
            if let Some(bucket) = self.buckets.get_mut(&hash) {
                bucket.pop();
                if bucket.is_empty() {
                    self.buckets.remove(&hash);
                }
            }
        }
    }

    fn lookup(&self, graph: &MirGraph, hash: HashNumber, def: DefId) -> Option<DefId> {
        self.buckets.get(&hash)?.iter().rev().copied().find(|&candidate| {
            !graph.def(candidate).is_discarded() && graph.congruent_to(def, candidate)
        })
    }
}

enum Step {
    Enter(BlockId),
    Leave(usize),
}

// =============================================================================
// GVN Pass
// =============================================================================

/// Statistics from GVN.
#[derive(Debug, Clone, Default)]
pub struct GvnStats {
    /// Definitions replaced by a fold.
    pub folded: usize,
    /// Definitions replaced by a congruent dominator.
    pub replaced: usize,
    /// Definitions discarded.
    pub discarded: usize,
    /// Rounds run.
    pub iterations: usize,
}

/// Global value numbering pass.
#[derive(Debug, Default)]
pub struct Gvn {
    stats: GvnStats,
}

impl Gvn {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stats(&self) -> &GvnStats {
        &self.stats
    }

    /// Number the graph until nothing changes or the iteration bound is
    /// reached.
    pub fn run_gvn(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.stats = GvnStats::default();
        let cfg = Cfg::build(graph);
        if !cfg.entry.is_valid() {
            return Ok(false);
        }
        let dom = DominatorTree::build(graph, &cfg);

        let mut changed = false;
        for _ in 0..graph.config().max_iterations.max(1) {
            self.stats.iterations += 1;
            if !self.number_graph(graph, &cfg, &dom)? {
                break;
            }
            changed = true;
        }
        debug!(
            folded = self.stats.folded,
            replaced = self.stats.replaced,
            discarded = self.stats.discarded,
            iterations = self.stats.iterations,
            "gvn"
        );
        Ok(changed)
    }

    fn number_graph(&mut self, graph: &mut MirGraph, cfg: &Cfg, dom: &DominatorTree) -> Result<bool> {
        let live: Vec<DefId> = graph.live_defs().collect();
        for def in live {
            graph.def_mut(def).clear_value_number();
        }

        let mut table = ValueTable::default();
        let mut changed = false;
        let mut stack = vec![Step::Enter(cfg.entry)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Leave(mark) => table.truncate(mark),
                Step::Enter(block) => {
                    let mark = table.mark();
                    changed |= self.number_block(graph, block, &mut table)?;
                    stack.push(Step::Leave(mark));
                    stack.extend(dom.children(block).iter().rev().map(|&c| Step::Enter(c)));
                }
            }
        }
        Ok(changed)
    }

    fn number_block(
        &mut self,
        graph: &mut MirGraph,
        block: BlockId,
        table: &mut ValueTable,
    ) -> Result<bool> {
        let mut changed = false;
        let phis = graph.block(block).phis().to_vec();
        for phi in phis {
            if !graph.def(phi).is_discarded() {
                changed |= self.number_def(graph, block, phi, table)?;
            }
        }
        for ins in graph.instruction_ids(block) {
            if !graph.def(ins).is_discarded() {
                changed |= self.number_def(graph, block, ins, table)?;
            }
        }
        Ok(changed)
    }

    fn number_def(
        &mut self,
        graph: &mut MirGraph,
        block: BlockId,
        def: DefId,
        table: &mut ValueTable,
    ) -> Result<bool> {
        let mut def = def;
        let mut changed = false;

        let folded = graph.fold(def, true);
        if folded != def {
            self.stats.folded += 1;
            trace!(def = %def, folded = %folded, "fold");
            if graph.def(def).is_control_instruction() {
                graph.replace_control(block, folded)?;
                return Ok(true);
            }

            let placed = graph.def(folded).block().is_some();
            if !placed {
                let at = if graph.def(def).is_phi() {
                    graph.block(block).first_instruction()
                } else {
                    Some(def)
                };
                match at {
                    Some(at) => graph.insert_before(at, folded)?,
                    None => graph.append(block, folded),
                }
            }
            graph.replace_all_uses_with(def, folded);
            if !graph.def(def).is_guard() && !graph.is_effectful(def) {
                graph.discard(def);
                self.stats.discarded += 1;
            }
            if placed {
                return Ok(true);
            }
            def = folded;
            changed = true;
        }

        if graph.def(def).is_control_instruction() {
            return Ok(changed);
        }

        let hash = graph.value_hash(def);
        if let Some(rep) = table.lookup(graph, hash, def) {
            if graph.update_for_replacement(rep, def) {
                trace!(def = %def, rep = %rep, "congruent");
                graph.replace_all_uses_with(def, rep);
                graph.discard(def);
                self.stats.replaced += 1;
                self.stats.discarded += 1;
                return Ok(true);
            }
        }

        let vn = graph.def(def).id();
        graph.def_mut(def).set_value_number(vn);
        table.insert(hash, def);
        Ok(changed)
    }
}

impl OptimizationPass for Gvn {
    fn name(&self) -> &'static str {
        "gvn"
    }

    fn run(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.run_gvn(graph)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::instructions::StartType;
    use crate::ir::types::MirType;
    use crate::ir::value::ConstValue;
    use crate::opt::alias_analysis::AliasAnalysis;

    fn int_add(g: &mut MirGraph, block: BlockId, lhs: DefId, rhs: DefId) -> DefId {
        let add = g.new_add(lhs, rhs);
        g.specialize_arith(add, MirType::Int32);
        g.append(block, add);
        add
    }

    #[test]
    fn test_commuted_adds_merge() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let p1 = g.new_parameter(0, None);
        let p2 = g.new_parameter(1, None);
        g.append(b, p1);
        g.append(b, p2);
        let a1 = int_add(&mut g, b, p1, p2);
        let a2 = int_add(&mut g, b, p2, p1);
        let mul = g.new_mul(a1, a2);
        g.append(b, mul);
        let ret = g.new_return(mul);
        g.end(b, ret);

        let mut gvn = Gvn::new();
        assert!(gvn.run(&mut g).unwrap());
        assert_eq!(gvn.stats().replaced, 1);
        assert!(g.def(a2).is_discarded());
        assert_eq!(g.def(mul).operands(), &[a1, a1]);
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_constant_fold_replaces_uses() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let c2 = g.new_constant(ConstValue::Int32(2));
        let c3 = g.new_constant(ConstValue::Int32(3));
        g.append(b, c2);
        g.append(b, c3);
        let add = int_add(&mut g, b, c2, c3);
        let ret = g.new_return(add);
        g.end(b, ret);

        Gvn::new().run(&mut g).unwrap();
        let result = g.def(ret).get_operand(0);
        assert!(g.def(add).is_discarded());
        assert!(g.is_constant(result, &ConstValue::Int32(5)));
        assert_eq!(g.result_type(result), MirType::Int32);
        assert_eq!(g.def(result).block(), Some(b));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_sibling_blocks_do_not_share_values() {
        let mut g = MirGraph::default();
        let entry = g.new_block(BlockKind::Normal, 0, 0);
        let left = g.new_block(BlockKind::Normal, 1, 0);
        let right = g.new_block(BlockKind::Normal, 2, 0);
        let p1 = g.new_parameter(0, None);
        let p2 = g.new_parameter(1, None);
        g.append(entry, p1);
        g.append(entry, p2);
        let test = g.new_test(p1, left, right);
        g.end(entry, test);

        let l = int_add(&mut g, left, p1, p2);
        let ret_l = g.new_return(l);
        g.end(left, ret_l);
        let r = int_add(&mut g, right, p1, p2);
        let ret_r = g.new_return(r);
        g.end(right, ret_r);

        Gvn::new().run(&mut g).unwrap();
        assert!(!g.def(l).is_discarded());
        assert!(!g.def(r).is_discarded());
    }

    #[test]
    fn test_dominating_value_reused() {
        let mut g = MirGraph::default();
        let entry = g.new_block(BlockKind::Normal, 0, 0);
        let next = g.new_block(BlockKind::Normal, 1, 0);
        let p1 = g.new_parameter(0, None);
        let p2 = g.new_parameter(1, None);
        g.append(entry, p1);
        g.append(entry, p2);
        let first = int_add(&mut g, entry, p1, p2);
        let goto = g.new_goto(next);
        g.end(entry, goto);
        let second = int_add(&mut g, next, p1, p2);
        let ret = g.new_return(second);
        g.end(next, ret);

        Gvn::new().run(&mut g).unwrap();
        assert!(g.def(second).is_discarded());
        assert_eq!(g.def(ret).get_operand(0), first);
        assert_eq!(g.def(first).value_number(), Some(g.def(first).id()));
    }

    #[test]
    fn test_test_of_not_swaps_targets() {
        let mut g = MirGraph::default();
        let entry = g.new_block(BlockKind::Normal, 0, 0);
        let t = g.new_block(BlockKind::Normal, 1, 0);
        let f = g.new_block(BlockKind::Normal, 2, 0);
        let p = g.new_parameter(0, None);
        g.append(entry, p);
        let not = g.new_not(p);
        g.append(entry, not);
        let test = g.new_test(not, t, f);
        g.end(entry, test);
        for block in [t, f] {
            let u = g.new_constant(ConstValue::Undefined);
            g.append(block, u);
            let ret = g.new_return(u);
            g.end(block, ret);
        }

        Gvn::new().run(&mut g).unwrap();
        let control = g.control_instruction(entry).unwrap();
        assert_ne!(control, test);
        assert_eq!(g.successors(entry), &[f, t]);
        assert_eq!(g.def(control).get_operand(0), p);
    }

    struct SlotReads {
        graph: MirGraph,
        before: DefId,
        after: DefId,
        ret: DefId,
    }

    /// `before = slot 0; [slot 0 = p1;] after = slot 0; return after`
    fn slot_reads(with_store: bool) -> SlotReads {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let start = g.new_start(StartType::Default);
        g.append(b, start);
        let obj = g.new_parameter(0, None);
        g.append(b, obj);
        let value = g.new_parameter(1, None);
        g.append(b, value);
        let before = g.new_load_fixed_slot(obj, 0);
        g.append(b, before);
        if with_store {
            let store = g.new_store_fixed_slot(obj, value, 0);
            g.append(b, store);
        }
        let after = g.new_load_fixed_slot(obj, 0);
        g.append(b, after);
        let ret = g.new_return(after);
        g.end(b, ret);
        SlotReads {
            graph: g,
            before,
            after,
            ret,
        }
    }

    #[test]
    fn test_unanalyzed_loads_do_not_merge() {
        let SlotReads {
            mut graph,
            before,
            after,
            ret,
        } = slot_reads(true);
        assert!(!graph.alias_analyzed());
        assert!(!graph.congruent_to(before, after));
        Gvn::new().run(&mut graph).unwrap();
        assert!(!graph.def(after).is_discarded());
        assert_eq!(graph.def(ret).get_operand(0), after);
    }

    #[test]
    fn test_loads_across_store_do_not_merge() {
        let SlotReads {
            mut graph,
            after,
            ret,
            ..
        } = slot_reads(true);
        AliasAnalysis::new().analyze(&mut graph).unwrap();
        Gvn::new().run(&mut graph).unwrap();
        assert!(!graph.def(after).is_discarded());
        assert_eq!(graph.def(ret).get_operand(0), after);
    }

    #[test]
    fn test_analyzed_loads_merge() {
        let SlotReads {
            mut graph,
            before,
            after,
            ret,
        } = slot_reads(false);
        AliasAnalysis::new().analyze(&mut graph).unwrap();
        assert!(graph.alias_analyzed());
        Gvn::new().run(&mut graph).unwrap();
        assert!(graph.def(after).is_discarded());
        assert_eq!(graph.def(ret).get_operand(0), before);
        assert!(graph.verify().is_ok());
    }
}
