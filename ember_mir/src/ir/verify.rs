//! Structural verification.
//!
//! `verify` checks the invariants every pass must preserve:
//! - each operand slot holding a value is recorded exactly once on that
//!   value's use chain, and each use record points at such a slot
//! - no slot names a discarded definition
//! - every block in the layout ends in a control instruction and its
//!   stream only holds instructions placed in that block

use super::graph::MirGraph;
use super::node::{DefId, NodeRef, Use};
use crate::error::{MirError, Result};
use rustc_hash::FxHashSet;

impl MirGraph {
    /// Check the whole graph. Returns the first violation found.
    pub fn verify(&self) -> Result<()> {
        for def in self.live_defs() {
            self.verify_operands(NodeRef::Def(def))?;
        }
        for rp in self.live_resume_points() {
            self.verify_operands(NodeRef::ResumePoint(rp))?;
        }
        for def in self.live_defs() {
            self.verify_uses(def)?;
        }
        for &block in self.blocks() {
            for ins in self.instructions(block) {
                let d = self.def(ins);
                if d.block() != Some(block) || d.is_phi() {
                    return Err(MirError::NotAnInstruction { def: ins });
                }
            }
            for &phi in self.block(block).phis() {
                if self.def(phi).block() != Some(block) {
                    return Err(MirError::NotAnInstruction { def: phi });
                }
            }
            self.control_instruction(block)?;
        }
        Ok(())
    }

    /// Every occupied slot of `node` must be on its occupant's chain.
    fn verify_operands(&self, node: NodeRef) -> Result<()> {
        for index in 0..self.num_operands(node) {
            let value = self.get_operand(node, index);
            if !value.is_valid() {
                continue;
            }
            if self.def(value).is_discarded() {
                return Err(MirError::DanglingOperand { node, index });
            }
            if !self.def(value).uses().contains(&Use::new(node, index)) {
                return Err(MirError::UseChainMismatch {
                    def: value,
                    reason: format!("slot {} of {:?} is not on the use chain", index, node),
                });
            }
        }
        Ok(())
    }

    /// Every use of `def` must be unique and point at a live slot holding it.
    fn verify_uses(&self, def: DefId) -> Result<()> {
        let mut seen = FxHashSet::default();
        for &u in self.def(def).uses() {
            if !seen.insert(u) {
                return Err(MirError::UseChainMismatch {
                    def,
                    reason: format!("duplicate use {:?}", u),
                });
            }
            let live = match u.node {
                NodeRef::Def(user) => !self.def(user).is_discarded(),
                NodeRef::ResumePoint(rp) => !self.resume_point(rp).is_discarded(),
            };
            if !live {
                return Err(MirError::UseChainMismatch {
                    def,
                    reason: format!("use from discarded {:?}", u.node),
                });
            }
            let index = u.index as usize;
            if index >= self.num_operands(u.node) || self.get_operand(u.node, index) != def {
                return Err(MirError::UseChainMismatch {
                    def,
                    reason: format!("use {:?} points at a slot that does not hold it", u),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MirError;
    use crate::ir::block::BlockKind;
    use crate::ir::graph::MirGraph;
    use crate::ir::node::{NodeRef, Use};
    use crate::ir::value::ConstValue;

    fn returning_sum() -> (MirGraph, [crate::ir::node::DefId; 3]) {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let x = g.new_constant(ConstValue::Int32(1));
        let y = g.new_constant(ConstValue::Int32(2));
        g.append(b, x);
        g.append(b, y);
        let add = g.new_add(x, y);
        g.append(b, add);
        let ret = g.new_return(add);
        g.end(b, ret);
        (g, [x, y, add])
    }

    #[test]
    fn test_well_formed_graph_verifies() {
        let (g, _) = returning_sum();
        assert_eq!(g.verify(), Ok(()));
    }

    #[test]
    fn test_replace_all_uses_keeps_bijection() {
        let (mut g, [x, y, add]) = returning_sum();
        g.replace_all_uses_with(x, y);
        assert!(g.verify().is_ok());
        assert_eq!(g.def(y).use_count(), 2);
        assert_eq!(g.def(add).get_operand(0), y);
    }

    #[test]
    fn test_stale_use_is_reported() {
        let (mut g, [x, _, add]) = returning_sum();
        // A use record that no slot backs.
        g.add_use(x, Use::new(NodeRef::Def(add), 1));
        assert!(matches!(
            g.verify(),
            Err(MirError::UseChainMismatch { def, .. }) if def == x
        ));
    }

    #[test]
    fn test_missing_use_is_reported() {
        let (mut g, [x, _, add]) = returning_sum();
        g.remove_use(x, Use::new(NodeRef::Def(add), 0));
        assert!(matches!(g.verify(), Err(MirError::UseChainMismatch { .. })));
    }

    #[test]
    fn test_unterminated_block_is_reported() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let c = g.new_constant(ConstValue::Null);
        g.append(b, c);
        assert_eq!(g.verify(), Err(MirError::BlockNotTerminated { block: b }));
    }
}
