//! Control instructions: goto, test, return, throw and the table switch.
//!
//! Successor blocks are held in the instruction kind, apart from value
//! operands, so replacing an operand never touches the CFG.

use super::InstructionKind;
use crate::error::{MirError, Result};
use crate::ir::block::BlockId;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::types::MirType;
use tracing::trace;

/// Dense jump table over `low..=high`.
///
/// `successors[0]` is the default target and case `i` is successor `i + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSwitchInfo {
    low: i32,
    high: i32,
    successors: Vec<BlockId>,
}

impl TableSwitchInfo {
    fn new(low: i32, high: i32) -> Result<Self> {
        if low > high {
            return Err(MirError::InvalidRange { low, high });
        }
        Ok(TableSwitchInfo {
            low,
            high,
            successors: Vec::new(),
        })
    }

    #[inline]
    pub fn low(&self) -> i32 {
        self.low
    }

    #[inline]
    pub fn high(&self) -> i32 {
        self.high
    }

    /// `high - low + 1`.
    #[inline]
    pub fn num_cases(&self) -> usize {
        (self.high as i64 - self.low as i64 + 1) as usize
    }

    #[inline]
    pub fn num_successors(&self) -> usize {
        self.successors.len()
    }

    #[inline]
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    #[inline]
    pub fn get_successor(&self, index: usize) -> BlockId {
        self.successors[index]
    }

    pub fn get_default(&self) -> Option<BlockId> {
        self.successors.first().copied()
    }

    /// Target of case `index`, counted from `low`.
    pub fn get_case(&self, index: usize) -> Option<BlockId> {
        debug_assert!(index < self.num_cases(), "case {} out of range", index);
        self.successors.get(index + 1).copied()
    }

    /// Target for the scrutinee `value`.
    pub fn target_for(&self, value: i32) -> Option<BlockId> {
        if value < self.low || value > self.high {
            return self.get_default();
        }
        self.get_case((value as i64 - self.low as i64) as usize)
    }

    fn is_full(&self) -> bool {
        self.successors.len() == self.num_cases() + 1
    }
}

impl MirGraph {
    pub fn new_goto(&mut self, target: BlockId) -> DefId {
        self.create(InstructionKind::Goto { target: [target] }, MirType::None, &[])
    }

    /// Branch to `if_true` when `input` is truthy, `if_false` otherwise.
    pub fn new_test(&mut self, input: DefId, if_true: BlockId, if_false: BlockId) -> DefId {
        self.create(
            InstructionKind::Test {
                targets: [if_true, if_false],
            },
            MirType::None,
            &[input],
        )
    }

    pub fn new_return(&mut self, value: DefId) -> DefId {
        self.create(InstructionKind::Return, MirType::None, &[value])
    }

    pub fn new_throw(&mut self, value: DefId) -> DefId {
        self.create(InstructionKind::Throw, MirType::None, &[value])
    }

    /// A table switch over `low..=high` with no targets yet. Add the
    /// default first, then one block per case in order.
    pub fn new_table_switch(&mut self, input: DefId, low: i32, high: i32) -> Result<DefId> {
        let info = TableSwitchInfo::new(low, high)?;
        Ok(self.create(InstructionKind::TableSwitch(info), MirType::None, &[input]))
    }

    fn table_switch_mut(&mut self, def: DefId) -> Result<&mut TableSwitchInfo> {
        match self.def_mut(def).kind_mut() {
            InstructionKind::TableSwitch(info) => Ok(info),
            _ => Err(MirError::NotATableSwitch { def }),
        }
    }

    /// Install the default target. Must come before any case.
    pub fn add_default(&mut self, def: DefId, block: BlockId) -> Result<()> {
        let info = self.table_switch_mut(def)?;
        if !info.successors.is_empty() {
            return Err(MirError::TableSwitchDefaultSet { def });
        }
        info.successors.push(block);
        Ok(())
    }

    /// Append the target of the next case.
    pub fn add_case(&mut self, def: DefId, block: BlockId) -> Result<()> {
        let info = self.table_switch_mut(def)?;
        if info.successors.is_empty() {
            return Err(MirError::TableSwitchNoDefault { def });
        }
        if info.is_full() {
            return Err(MirError::TableSwitchFull {
                def,
                cases: info.num_cases(),
            });
        }
        info.successors.push(block);
        Ok(())
    }

    /// The jump table of a table switch.
    pub fn table_switch(&self, def: DefId) -> Option<&TableSwitchInfo> {
        match self.def(def).kind() {
            InstructionKind::TableSwitch(info) => Some(info),
            _ => None,
        }
    }
}

/// `Test(Not x)` becomes `Test(x)` with the targets swapped.
pub(super) fn fold_test(graph: &mut MirGraph, def: DefId) -> DefId {
    let InstructionKind::Test { targets } = *graph.def(def).kind() else {
        return def;
    };
    let input = graph.def(def).get_operand(0);
    if !matches!(graph.def(input).kind(), InstructionKind::Not) {
        return def;
    }
    let negated = graph.def(input).get_operand(0);
    let folded = graph.new_test(negated, targets[1], targets[0]);
    trace!(test = %def, folded = %folded, "fold test of not");
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::value::ConstValue;

    fn blocks(g: &mut MirGraph, n: usize) -> Vec<BlockId> {
        (0..n)
            .map(|i| g.new_block(BlockKind::Normal, i as u32, 0))
            .collect()
    }

    #[test]
    fn test_table_switch_case_mapping() {
        let mut g = MirGraph::default();
        let b = blocks(&mut g, 5);
        let input = g.new_constant(ConstValue::Int32(0));
        let ts = g.new_table_switch(input, 10, 12).unwrap();

        g.add_default(ts, b[0]).unwrap();
        for &case in &b[1..4] {
            g.add_case(ts, case).unwrap();
        }

        let info = g.table_switch(ts).unwrap();
        assert_eq!(info.num_cases(), 3);
        for i in 0..info.num_cases() {
            assert_eq!(info.get_case(i), Some(info.get_successor(i + 1)));
        }
        assert_eq!(info.get_default(), Some(b[0]));
        assert_eq!(info.target_for(11), Some(b[2]));
        assert_eq!(info.target_for(99), Some(b[0]));

        assert_eq!(
            g.add_case(ts, b[4]),
            Err(MirError::TableSwitchFull { def: ts, cases: 3 })
        );
    }

    #[test]
    fn test_table_switch_ordering_errors() {
        let mut g = MirGraph::default();
        let b = blocks(&mut g, 2);
        let input = g.new_constant(ConstValue::Int32(0));
        let ts = g.new_table_switch(input, 0, 0).unwrap();

        assert_eq!(
            g.add_case(ts, b[1]),
            Err(MirError::TableSwitchNoDefault { def: ts })
        );
        g.add_default(ts, b[0]).unwrap();
        assert_eq!(
            g.add_default(ts, b[1]),
            Err(MirError::TableSwitchDefaultSet { def: ts })
        );
    }

    #[test]
    fn test_jump_table_edits_need_a_table_switch() {
        let mut g = MirGraph::default();
        let b = blocks(&mut g, 2);
        let goto = g.new_goto(b[1]);
        assert_eq!(
            g.add_default(goto, b[0]),
            Err(MirError::NotATableSwitch { def: goto })
        );
        assert_eq!(
            g.add_case(goto, b[0]),
            Err(MirError::NotATableSwitch { def: goto })
        );
        assert_eq!(g.def(goto).kind().successors(), &[b[1]]);
    }

    #[test]
    fn test_table_switch_rejects_inverted_range() {
        let mut g = MirGraph::default();
        let input = g.new_constant(ConstValue::Int32(0));
        assert_eq!(
            g.new_table_switch(input, 3, 1),
            Err(MirError::InvalidRange { low: 3, high: 1 })
        );
    }

    #[test]
    fn test_fold_test_of_not_swaps_targets() {
        let mut g = MirGraph::default();
        let b = blocks(&mut g, 2);
        let x = g.new_parameter(0, None);
        let not = g.new_not(x);
        let test = g.new_test(not, b[0], b[1]);

        let folded = g.fold(test, false);

        assert_ne!(folded, test);
        assert_eq!(g.def(folded).get_operand(0), x);
        assert_eq!(g.def(folded).kind().successors(), &[b[1], b[0]]);
    }

    #[test]
    fn test_control_kinds() {
        let mut g = MirGraph::default();
        let b = blocks(&mut g, 1);
        let v = g.new_constant(ConstValue::Undefined);
        let ret = g.new_return(v);
        let goto = g.new_goto(b[0]);

        assert!(g.def(ret).is_control_instruction());
        assert!(g.def(ret).kind().successors().is_empty());
        assert_eq!(g.def(goto).kind().successors(), &[b[0]]);
        assert!(!g.is_effectful(goto));
    }
}
