//! Alias analysis.
//!
//! Gives every load a `dependency`: the most recent instruction, in
//! reverse postorder, that may write one of the categories the load
//! reads. Two loads with the same operands and the same dependency read
//! the same memory, which is what value numbering needs to merge them.
//!
//! Inside a loop a store later in the body still reaches a load on the
//! next iteration. When the backedge is reached, every load of the loop
//! whose categories are written anywhere in the loop is pinned to the
//! loop header's first instruction; the rest keep their pre-loop store
//! and become candidates for hoisting.

use super::OptimizationPass;
use crate::error::Result;
use crate::ir::alias::NUM_CATEGORIES;
use crate::ir::arena::SecondaryMap;
use crate::ir::block::BlockId;
use crate::ir::cfg::Cfg;
use crate::ir::graph::MirGraph;
use crate::ir::node::{DefId, Definition};
use tracing::debug;

struct LoopAliasInfo {
    header: BlockId,
    /// Position of the header's first instruction.
    first_position: u32,
    first_instruction: Option<DefId>,
    loads: Vec<DefId>,
}

/// Alias analysis pass.
#[derive(Debug, Default)]
pub struct AliasAnalysis {
    loads: usize,
    pinned: usize,
}

impl AliasAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads given a dependency in the last run.
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Loads pinned inside their loop in the last run.
    pub fn pinned(&self) -> usize {
        self.pinned
    }

    pub fn analyze(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.loads = 0;
        self.pinned = 0;
        let cfg = Cfg::build(graph);
        if !cfg.entry.is_valid() {
            return Ok(false);
        }

        // Stores seen so far, per category, in visiting order. The entry's
        // first instruction stands for everything before the function.
        let mut stores: Vec<Vec<DefId>> = vec![Vec::new(); NUM_CATEGORIES];
        if let Some(first) = graph.block(cfg.entry).first_instruction() {
            for list in &mut stores {
                list.push(first);
            }
        }
        let mut positions: SecondaryMap<Definition, u32> = SecondaryMap::with_default(0);
        let mut next_position = 0u32;
        let mut loops: Vec<LoopAliasInfo> = Vec::new();
        let mut changed = false;

        for &block in &cfg.rpo {
            if graph.block(block).is_loop_header() {
                loops.push(LoopAliasInfo {
                    header: block,
                    first_position: next_position,
                    first_instruction: graph.block(block).first_instruction(),
                    loads: Vec::new(),
                });
            }

            for ins in graph.instruction_ids(block) {
                positions.set(ins, next_position);
                next_position += 1;

                let set = graph.alias_set(ins);
                if set.is_none() {
                    continue;
                }
                if set.is_store() {
                    for category in set.categories() {
                        stores[category].push(ins);
                    }
                    continue;
                }

                let last_store = set
                    .categories()
                    .filter_map(|category| stores[category].last().copied())
                    .max_by_key(|&store| *positions.get(store));
                if graph.def(ins).dependency() != last_store {
                    graph.def_mut(ins).set_dependency(last_store);
                    changed = true;
                }
                self.loads += 1;
                if let Some(current) = loops.last_mut() {
                    current.loads.push(ins);
                }
            }

            let closes_loop = loops
                .last()
                .is_some_and(|lp| graph.block(lp.header).backedge() == Some(block));
            if closes_loop {
                if let Some(lp) = loops.pop() {
                    changed |= self.fix_loop(graph, &lp, &stores, &positions, loops.last_mut());
                }
            }
        }

        debug!(loads = self.loads, pinned = self.pinned, "alias analysis");
        graph.set_alias_analyzed();
        Ok(changed)
    }

    /// Pin loads whose categories the loop writes; pass the rest to the
    /// enclosing loop.
    fn fix_loop(
        &mut self,
        graph: &mut MirGraph,
        lp: &LoopAliasInfo,
        stores: &[Vec<DefId>],
        positions: &SecondaryMap<Definition, u32>,
        outer: Option<&mut LoopAliasInfo>,
    ) -> bool {
        let mut changed = false;
        let mut invariant = Vec::new();
        for &load in &lp.loads {
            let written_in_loop = graph.alias_set(load).categories().any(|category| {
                stores[category]
                    .last()
                    .is_some_and(|&store| *positions.get(store) >= lp.first_position)
            });
            if written_in_loop {
                if graph.def(load).dependency() != lp.first_instruction {
                    graph.def_mut(load).set_dependency(lp.first_instruction);
                    changed = true;
                }
                self.pinned += 1;
            } else {
                invariant.push(load);
            }
        }
        if let Some(outer) = outer {
            outer.loads.extend(invariant);
        }
        changed
    }
}

impl OptimizationPass for AliasAnalysis {
    fn name(&self) -> &'static str {
        "alias-analysis"
    }

    fn run(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.analyze(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::instructions::StartType;
    use crate::ir::value::ConstValue;

    #[test]
    fn test_load_depends_on_last_store() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let start = g.new_start(StartType::Default);
        g.append(b, start);
        let obj = g.new_parameter(0, None);
        g.append(b, obj);
        let val = g.new_parameter(1, None);
        g.append(b, val);

        let before = g.new_load_fixed_slot(obj, 0);
        g.append(b, before);
        let store = g.new_store_fixed_slot(obj, val, 0);
        g.append(b, store);
        let after = g.new_load_fixed_slot(obj, 0);
        g.append(b, after);
        let ret = g.new_return(after);
        g.end(b, ret);

        let mut aa = AliasAnalysis::new();
        assert!(aa.run(&mut g).unwrap());
        assert_eq!(g.def(before).dependency(), Some(start));
        assert_eq!(g.def(after).dependency(), Some(store));
        assert_eq!(aa.loads(), 2);
    }

    #[test]
    fn test_element_store_does_not_affect_slot_load() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let start = g.new_start(StartType::Default);
        g.append(b, start);
        let obj = g.new_parameter(0, None);
        g.append(b, obj);
        let idx = g.new_constant(ConstValue::Int32(0));
        g.append(b, idx);
        let elements = g.new_elements(obj);
        g.append(b, elements);
        let store = g.new_store_element(elements, idx, obj);
        g.append(b, store);
        let load = g.new_load_fixed_slot(obj, 2);
        g.append(b, load);
        let ret = g.new_return(load);
        g.end(b, ret);

        AliasAnalysis::new().run(&mut g).unwrap();
        assert_eq!(g.def(load).dependency(), Some(start));
    }

    #[test]
    fn test_loop_store_pins_load() {
        let mut g = MirGraph::default();
        let entry = g.new_block(BlockKind::Normal, 0, 0);
        let header = g.new_block(BlockKind::PendingLoopHeader, 1, 0);
        let exit = g.new_block(BlockKind::Normal, 9, 0);

        let start = g.new_start(StartType::Default);
        g.append(entry, start);
        let obj = g.new_parameter(0, None);
        g.append(entry, obj);
        let goto = g.new_goto(header);
        g.end(entry, goto);

        let check = g.new_interrupt_check();
        g.append(header, check);
        let load = g.new_load_fixed_slot(obj, 0);
        g.append(header, load);
        let elements = g.new_elements(obj);
        g.append(header, elements);
        let store = g.new_store_fixed_slot(obj, load, 0);
        g.append(header, store);
        let test = g.new_test(load, header, exit);
        g.append(header, test);
        g.add_predecessor(exit, header);
        g.set_backedge(header, header);

        let ret = g.new_return(elements);
        g.end(exit, ret);

        let mut aa = AliasAnalysis::new();
        aa.run(&mut g).unwrap();
        assert_eq!(g.def(load).dependency(), Some(check));
        assert_eq!(g.def(elements).dependency(), Some(start));
        assert_eq!(aa.pinned(), 1);
    }
}
