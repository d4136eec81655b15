//! Entry points and leaf values: start markers, constants, parameters and
//! the callee.

use super::InstructionKind;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::oracle::TypeSet;
use crate::ir::types::MirType;
use crate::ir::value::ConstValue;

/// Parameter index of `this`.
pub const THIS_SLOT: i32 = -1;

/// Which entry a `Start` marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StartType {
    Default,
    Osr,
}

impl MirGraph {
    pub fn new_start(&mut self, start_type: StartType) -> DefId {
        self.create(InstructionKind::Start(start_type), MirType::None, &[])
    }

    pub fn new_osr_entry(&mut self) -> DefId {
        self.create(InstructionKind::OsrEntry, MirType::StackFrame, &[])
    }

    /// A movable constant typed by its payload.
    pub fn new_constant(&mut self, value: ConstValue) -> DefId {
        let ty = value.mir_type();
        let def = self.create(InstructionKind::Constant(value), ty, &[]);
        self.def_mut(def).set_movable();
        def
    }

    /// Formal parameter `index`, or `this` for [`THIS_SLOT`]. The optional
    /// type set is what inference observed flowing in.
    pub fn new_parameter(&mut self, index: i32, types: Option<TypeSet>) -> DefId {
        debug_assert!(index >= THIS_SLOT, "parameter index {} below this", index);
        self.create(
            InstructionKind::Parameter { index, types },
            MirType::Value,
            &[],
        )
    }

    pub fn new_callee(&mut self) -> DefId {
        let def = self.create(InstructionKind::Callee, MirType::Object, &[]);
        self.def_mut(def).set_movable();
        def
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::alias::AliasSet;

    #[test]
    fn test_constant_type_follows_payload() {
        let mut g = MirGraph::default();
        let i = g.new_constant(ConstValue::Int32(7));
        let d = g.new_constant(ConstValue::number(0.5));
        let n = g.new_constant(ConstValue::Null);

        assert_eq!(g.result_type(i), MirType::Int32);
        assert_eq!(g.result_type(d), MirType::Double);
        assert_eq!(g.result_type(n), MirType::Null);
        assert!(g.def(i).is_movable());
        assert_eq!(g.alias_set(i), AliasSet::none());
    }

    #[test]
    fn test_equal_constants_are_congruent() {
        let mut g = MirGraph::default();
        let a = g.new_constant(ConstValue::Int32(3));
        let b = g.new_constant(ConstValue::number(3.0));
        let c = g.new_constant(ConstValue::Int32(4));

        assert!(g.congruent_to(a, b));
        assert_eq!(g.value_hash(a), g.value_hash(b));
        assert!(!g.congruent_to(a, c));
    }

    #[test]
    fn test_negative_zero_is_not_zero() {
        let mut g = MirGraph::default();
        let zero = g.new_constant(ConstValue::Int32(0));
        let neg = g.new_constant(ConstValue::number(-0.0));
        assert_eq!(g.result_type(neg), MirType::Double);
        assert!(!g.congruent_to(zero, neg));
    }

    #[test]
    fn test_parameters_compare_by_index() {
        let mut g = MirGraph::default();
        let this = g.new_parameter(THIS_SLOT, None);
        let first = g.new_parameter(0, Some(TypeSet::of(MirType::Int32)));
        let again = g.new_parameter(0, None);

        assert_eq!(g.result_type(this), MirType::Value);
        assert!(!g.congruent_to(this, first));
        assert!(g.congruent_to(first, again));
    }

    #[test]
    fn test_start_is_never_congruent() {
        let mut g = MirGraph::default();
        let a = g.new_start(StartType::Default);
        let b = g.new_start(StartType::Default);
        assert!(!g.congruent_to(a, b));
        assert!(g.is_effectful(a));
    }
}
