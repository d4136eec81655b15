//! Randomized operand rewiring keeps use chains and operand slots in step.

use ember_mir::ir::{BlockKind, ConstValue, DefId, MirGraph, MirType, NodeRef};
use proptest::prelude::*;

const CONSTANTS: usize = 6;
const ADDS: usize = 8;

#[derive(Debug, Clone)]
enum Edit {
    /// Point operand `slot` of add `add` at constant `value`.
    Replace { add: usize, slot: usize, value: usize },
    /// Move every reader of constant `from` to constant `to`.
    ReplaceAll { from: usize, to: usize },
    /// Move the first reader of constant `from` to constant `to`.
    ReplaceFirstUse { from: usize, to: usize },
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0..ADDS, 0..2usize, 0..CONSTANTS)
            .prop_map(|(add, slot, value)| Edit::Replace { add, slot, value }),
        (0..CONSTANTS, 0..CONSTANTS).prop_map(|(from, to)| Edit::ReplaceAll { from, to }),
        (0..CONSTANTS, 0..CONSTANTS).prop_map(|(from, to)| Edit::ReplaceFirstUse { from, to }),
    ]
}

struct Fixture {
    graph: MirGraph,
    constants: Vec<DefId>,
    adds: Vec<DefId>,
}

/// One block: the constants, a row of adds over them, and a return of the
/// last add.
fn fixture() -> Fixture {
    let mut graph = MirGraph::default();
    let b = graph.new_block(BlockKind::Normal, 0, 0);
    let constants: Vec<DefId> = (0..CONSTANTS)
        .map(|i| {
            let c = graph.new_constant(ConstValue::Int32(i as i32));
            graph.append(b, c);
            c
        })
        .collect();
    let adds: Vec<DefId> = (0..ADDS)
        .map(|i| {
            let add = graph.new_add(constants[i % CONSTANTS], constants[(i + 1) % CONSTANTS]);
            graph.specialize_arith(add, MirType::Int32);
            graph.append(b, add);
            add
        })
        .collect();
    let ret = graph.new_return(adds[ADDS - 1]);
    graph.end(b, ret);
    Fixture {
        graph,
        constants,
        adds,
    }
}

proptest! {
    #[test]
    fn prop_use_chains_match_operands(edits in prop::collection::vec(edit(), 0..64)) {
        let Fixture { mut graph, constants, adds } = fixture();

        for edit in edits {
            match edit {
                Edit::Replace { add, slot, value } => {
                    graph.replace_operand(NodeRef::Def(adds[add]), slot, constants[value]);
                }
                Edit::ReplaceAll { from, to } => {
                    graph.replace_all_uses_with(constants[from], constants[to]);
                }
                Edit::ReplaceFirstUse { from, to } => {
                    if graph.def(constants[from]).has_uses() && from != to {
                        graph.replace_operand_at_use(constants[from], 0, constants[to]);
                    }
                }
            }
            prop_assert!(graph.verify().is_ok());
        }

        // Every add slot reads a constant, and each read is one use.
        let total: usize = constants.iter().map(|&c| graph.def(c).use_count()).sum();
        prop_assert_eq!(total, 2 * ADDS);
        for &add in &adds {
            for &op in graph.def(add).operands() {
                let readers = graph
                    .def(op)
                    .uses()
                    .iter()
                    .filter(|u| u.node == NodeRef::Def(add))
                    .count();
                let slots = graph.def(add).operands().iter().filter(|&&o| o == op).count();
                prop_assert_eq!(readers, slots);
            }
        }
    }
}
