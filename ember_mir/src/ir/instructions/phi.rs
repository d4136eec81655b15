//! Phis.
//!
//! A phi has one input per predecessor of its block, in predecessor order.
//! It starts as a boxed `Value` and is narrowed once by type
//! specialization.

use super::InstructionKind;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::types::MirType;

impl MirGraph {
    /// A phi for interpreter stack slot `slot`, with no inputs yet.
    pub fn new_phi(&mut self, slot: u32) -> DefId {
        self.alloc_def(
            InstructionKind::Phi {
                slot,
                specialized: false,
            },
            MirType::Value,
            0,
        )
    }

    /// Append the input flowing in from the next predecessor.
    pub fn add_phi_input(&mut self, phi: DefId, input: DefId) -> usize {
        debug_assert!(self.def(phi).is_phi(), "{} is not a phi", phi);
        self.push_operand(phi, input)
    }

    pub fn phi_slot(&self, phi: DefId) -> Option<u32> {
        match self.def(phi).kind() {
            InstructionKind::Phi { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    pub fn phi_tried_to_specialize(&self, phi: DefId) -> bool {
        matches!(
            self.def(phi).kind(),
            InstructionKind::Phi {
                specialized: true,
                ..
            }
        )
    }

    /// Narrow the phi's result type. Happens at most once.
    pub fn specialize_phi(&mut self, phi: DefId, ty: MirType) {
        let d = self.def_mut(phi);
        if let InstructionKind::Phi { specialized, .. } = d.kind_mut() {
            debug_assert!(!*specialized, "phi specialized twice");
            *specialized = true;
        }
        d.set_result_type(ty);
    }
}

/// A phi whose inputs are all the same value, ignoring inputs that are the
/// phi itself, is that value.
pub(super) fn fold_phi(graph: &mut MirGraph, def: DefId, use_value_numbers: bool) -> DefId {
    let d = graph.def(def);
    debug_assert!(d.num_operands() != 0, "folding phi {} with no inputs", def);
    let mut unique: Option<DefId> = None;
    for &input in d.operands() {
        if input == def {
            continue;
        }
        match unique {
            None => unique = Some(input),
            Some(seen) if graph.equal_values(use_value_numbers, seen, input) => {}
            Some(_) => return def,
        }
    }
    match unique {
        Some(value) if graph.result_type(value) == d.result_type() => value,
        _ => def,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::alias::AliasSet;
    use crate::ir::block::BlockKind;
    use crate::ir::value::ConstValue;

    #[test]
    fn test_phi_inputs_register_uses() {
        let mut g = MirGraph::default();
        let header = g.new_block(BlockKind::LoopHeader, 0, 1);
        let a = g.new_constant(ConstValue::Int32(0));
        let b = g.new_constant(ConstValue::Int32(1));
        let phi = g.new_phi(0);
        g.add_phi(header, phi);
        assert_eq!(g.add_phi_input(phi, a), 0);
        assert_eq!(g.add_phi_input(phi, b), 1);

        assert_eq!(g.def(phi).operands(), &[a, b]);
        assert_eq!(g.def(a).use_count(), 1);
        assert_eq!(g.block(header).phis(), &[phi]);
        assert_eq!(g.phi_slot(phi), Some(0));
        assert_eq!(g.alias_set(phi), AliasSet::none());
    }

    #[test]
    fn test_fold_ignores_self_inputs() {
        let mut g = MirGraph::default();
        let v = g.new_parameter(0, None);
        let phi = g.new_phi(0);
        g.add_phi_input(phi, v);
        g.add_phi_input(phi, phi);
        assert_eq!(g.fold(phi, false), v);
    }

    #[test]
    fn test_fold_keeps_distinct_inputs() {
        let mut g = MirGraph::default();
        let a = g.new_parameter(0, None);
        let b = g.new_parameter(1, None);
        let phi = g.new_phi(0);
        g.add_phi_input(phi, a);
        g.add_phi_input(phi, b);
        assert_eq!(g.fold(phi, false), phi);

        // Equal value numbers make them the same value.
        g.def_mut(a).set_value_number(7);
        g.def_mut(b).set_value_number(7);
        assert_eq!(g.fold(phi, true), a);
    }

    #[test]
    fn test_fold_respects_specialized_type() {
        let mut g = MirGraph::default();
        let v = g.new_parameter(0, None);
        let phi = g.new_phi(0);
        g.add_phi_input(phi, v);
        g.add_phi_input(phi, v);
        g.specialize_phi(phi, MirType::Int32);
        assert!(g.phi_tried_to_specialize(phi));
        assert_eq!(g.fold(phi, false), phi);
    }

    #[test]
    fn test_phis_congruent_only_in_same_block() {
        let mut g = MirGraph::default();
        let b1 = g.new_block(BlockKind::Normal, 0, 1);
        let b2 = g.new_block(BlockKind::Normal, 4, 1);
        let a = g.new_parameter(0, None);
        let c = g.new_parameter(1, None);
        let mut phis = Vec::new();
        for block in [b1, b1, b2] {
            let phi = g.new_phi(0);
            g.add_phi_input(phi, a);
            g.add_phi_input(phi, c);
            g.add_phi(block, phi);
            phis.push(phi);
        }
        assert!(g.congruent_to(phis[0], phis[1]));
        assert!(!g.congruent_to(phis[0], phis[2]));
    }
}
