//! Type policy application as a pipeline pass.
//!
//! Runs last: once value numbering and hoisting have settled, every
//! instruction gets the conversions its specialization expects.

use super::OptimizationPass;
use crate::error::Result;
use crate::ir::graph::MirGraph;

/// Inserts boxing, unboxing and numeric conversions before lowering.
#[derive(Debug, Default)]
pub struct ApplyTypePolicies {
    adjusted: usize,
}

impl ApplyTypePolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions that received a conversion in the last run.
    pub fn adjusted(&self) -> usize {
        self.adjusted
    }
}

impl OptimizationPass for ApplyTypePolicies {
    fn name(&self) -> &'static str {
        "type-policy"
    }

    fn run(&mut self, graph: &mut MirGraph) -> Result<bool> {
        self.adjusted = graph.apply_type_policies()?;
        Ok(self.adjusted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::opcode::Opcode;
    use crate::ir::types::MirType;

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let p1 = g.new_parameter(0, None);
        g.append(b, p1);
        let p2 = g.new_parameter(1, None);
        g.append(b, p2);
        let add = g.new_add(p1, p2);
        g.specialize_arith(add, MirType::Int32);
        g.append(b, add);
        let ret = g.new_return(add);
        g.end(b, ret);

        let mut pass = ApplyTypePolicies::new();
        assert!(pass.run(&mut g).unwrap());
        let lhs = g.def(add).get_operand(0);
        assert_eq!(g.def(lhs).opcode(), Opcode::Unbox);
        assert!(!pass.run(&mut g).unwrap());
        assert!(g.verify().is_ok());
    }
}
