//! Dead Code Elimination.
//!
//! Removes definitions nothing reads. Guards, control instructions and
//! anything that writes memory stay. Discarding an instruction releases
//! its operands, so the inputs it kept alive are revisited through a
//! worklist.

use super::OptimizationPass;
use crate::error::Result;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use tracing::{debug, trace};

/// Dead code elimination pass.
#[derive(Debug, Default)]
pub struct Dce {
    removed: usize,
}

impl Dce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions removed in the last run.
    #[inline]
    pub fn removed(&self) -> usize {
        self.removed
    }

    pub fn run_dce(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.removed = 0;
        let mut worklist: Vec<DefId> = graph.live_defs().collect();
        for &def in &worklist {
            graph.def_mut(def).set_in_worklist_unchecked();
        }

        while let Some(def) = worklist.pop() {
            graph.def_mut(def).set_not_in_worklist_unchecked();
            if !is_dead(graph, def) {
                continue;
            }
            let inputs = graph.def(def).operands().to_vec();
            graph.discard(def);
            self.removed += 1;
            trace!(def = %def, "dead");
            for input in inputs {
                if input.is_valid() && !graph.def(input).is_in_worklist() {
                    graph.def_mut(input).set_in_worklist();
                    worklist.push(input);
                }
            }
        }

        debug!(removed = self.removed, "dce");
        Ok(self.removed > 0)
    }
}

fn is_dead(graph: &MirGraph, def: DefId) -> bool {
    let d = graph.def(def);
    if d.is_discarded() || d.has_uses() {
        return false;
    }
    // Detached definitions belong to whoever built them.
    if d.block().is_none() {
        return false;
    }
    if d.is_phi() {
        return true;
    }
    !d.is_guard() && !d.is_control_instruction() && !graph.is_effectful(def)
}

impl OptimizationPass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.run_dce(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::types::MirType;
    use crate::ir::value::ConstValue;

    #[test]
    fn test_removes_dead_chain() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let c1 = g.new_constant(ConstValue::Int32(1));
        g.append(b, c1);
        let c2 = g.new_constant(ConstValue::Int32(2));
        g.append(b, c2);
        let add = g.new_add(c1, c2);
        g.specialize_arith(add, MirType::Int32);
        g.append(b, add);
        let u = g.new_constant(ConstValue::Undefined);
        g.append(b, u);
        let ret = g.new_return(u);
        g.end(b, ret);

        let mut dce = Dce::new();
        assert!(dce.run(&mut g).unwrap());
        assert_eq!(dce.removed(), 3);
        assert!(g.def(add).is_discarded());
        assert!(g.def(c1).is_discarded());
        assert!(!g.def(u).is_discarded());
        assert_eq!(g.block(b).num_instructions(), 2);
        assert!(g.verify().is_ok());
    }

    #[test]
    fn test_keeps_guards_and_stores() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let obj = g.new_parameter(0, None);
        g.append(b, obj);
        let idx = g.new_constant(ConstValue::Int32(0));
        g.append(b, idx);
        let check = g.new_bounds_check_lower(idx);
        g.append(b, check);
        let store = g.new_store_fixed_slot(obj, idx, 0);
        g.append(b, store);
        let ret = g.new_return(obj);
        g.end(b, ret);

        assert!(!Dce::new().run(&mut g).unwrap());
        assert!(!g.def(check).is_discarded());
        assert!(!g.def(store).is_discarded());
    }

    #[test]
    fn test_unused_phi_removed() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let c = g.new_constant(ConstValue::Int32(0));
        g.append(b, c);
        let phi = g.new_phi(0);
        g.add_phi_input(phi, c);
        g.add_phi(b, phi);
        let ret = g.new_return(c);
        g.end(b, ret);

        Dce::new().run(&mut g).unwrap();
        assert!(g.def(phi).is_discarded());
        assert!(g.block(b).phis().is_empty());
        assert_eq!(g.def(c).use_count(), 1);
    }
}
