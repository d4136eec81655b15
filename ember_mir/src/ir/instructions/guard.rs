//! Guards and runtime checks.
//!
//! A guard produces no value that anything needs; it stays in the graph
//! because its failure path is the point. Guards are movable so LICM can
//! hoist them, but DCE never removes them.

use super::{BailoutKind, InstructionKind};
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::oracle::TypeSet;
use crate::ir::types::MirType;
use crate::ir::value::HeapRef;

impl MirGraph {
    fn new_guard(&mut self, kind: InstructionKind, ty: MirType, operands: &[DefId]) -> DefId {
        let def = self.create(kind, ty, operands);
        let d = self.def_mut(def);
        d.set_guard();
        d.set_movable();
        def
    }

    /// Check `minimum <= index + k < length + k` for every `k` in the
    /// range, which starts as `[0, 0]`.
    pub fn new_bounds_check(&mut self, index: DefId, length: DefId) -> DefId {
        debug_assert!(self.result_type(index) == MirType::Int32, "non-int32 index");
        debug_assert!(self.result_type(length) == MirType::Int32, "non-int32 length");
        self.new_guard(
            InstructionKind::BoundsCheck {
                minimum: 0,
                maximum: 0,
            },
            MirType::None,
            &[index, length],
        )
    }

    /// Widen the checked offset range of a bounds check, as when two
    /// checks on `i + 1` and `i + 3` are merged.
    pub fn set_bounds_check_range(&mut self, def: DefId, min: i32, max: i32) {
        debug_assert!(min <= max, "inverted bounds range [{}, {}]", min, max);
        match self.def_mut(def).kind_mut() {
            InstructionKind::BoundsCheck { minimum, maximum } => {
                *minimum = min;
                *maximum = max;
            }
            other => debug_assert!(false, "{:?} is not a bounds check", other.opcode()),
        }
    }

    /// Check `index >= 0` only.
    pub fn new_bounds_check_lower(&mut self, index: DefId) -> DefId {
        debug_assert!(self.result_type(index) == MirType::Int32, "non-int32 index");
        self.new_guard(
            InstructionKind::BoundsCheckLower {
                minimum: 0,
                fallible: true,
            },
            MirType::None,
            &[index],
        )
    }

    /// Record that range analysis proved the lower bound.
    pub fn set_bounds_check_lower_infallible(&mut self, def: DefId) {
        if let InstructionKind::BoundsCheckLower { fallible, .. } = self.def_mut(def).kind_mut() {
            *fallible = false;
        }
    }

    pub fn new_guard_shape(&mut self, object: DefId, shape: HeapRef) -> DefId {
        debug_assert!(self.result_type(object) == MirType::Object, "shape guard on non-object");
        self.new_guard(
            InstructionKind::GuardShape {
                shape,
                bailout_kind: BailoutKind::Normal,
            },
            MirType::None,
            &[object],
        )
    }

    pub fn new_guard_class(&mut self, object: DefId, class: HeapRef) -> DefId {
        debug_assert!(self.result_type(object) == MirType::Object, "class guard on non-object");
        self.new_guard(InstructionKind::GuardClass { class }, MirType::None, &[object])
    }

    /// Pass `input` through, bailing out when its runtime type is outside
    /// `types`.
    pub fn new_type_barrier(
        &mut self,
        input: DefId,
        types: TypeSet,
        bailout_kind: BailoutKind,
    ) -> DefId {
        self.new_guard(
            InstructionKind::TypeBarrier {
                types,
                bailout_kind,
            },
            MirType::Value,
            &[input],
        )
    }

    /// Barrier whose input can never satisfy the set: the input is
    /// unboxed and its type is not a member.
    pub fn type_barrier_always_bails(&self, def: DefId) -> bool {
        let InstructionKind::TypeBarrier { types, .. } = self.def(def).kind() else {
            return false;
        };
        let input = self.result_type(self.def(def).get_operand(0));
        input != MirType::Value && !types.may_be(input)
    }

    /// Feed the observed type of `input` back to inference.
    pub fn new_monitor_types(&mut self, input: DefId, types: TypeSet) -> DefId {
        debug_assert!(self.result_type(input) == MirType::Value, "monitoring unboxed input");
        let def = self.create(InstructionKind::MonitorTypes { types }, MirType::None, &[input]);
        self.def_mut(def).set_guard();
        def
    }

    pub fn new_check_over_recursed(&mut self) -> DefId {
        self.create(InstructionKind::CheckOverRecursed, MirType::None, &[])
    }

    /// Counter check that triggers recompilation of a hot script.
    pub fn new_recompile_check(&mut self) -> DefId {
        let def = self.create(InstructionKind::RecompileCheck, MirType::None, &[]);
        self.def_mut(def).set_guard();
        def
    }

    pub fn new_interrupt_check(&mut self) -> DefId {
        let def = self.create(InstructionKind::InterruptCheck, MirType::None, &[]);
        self.def_mut(def).set_guard();
        def
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::alias::{AliasFlags, AliasSet};
    use crate::ir::value::ConstValue;

    fn typed_param(g: &mut MirGraph, index: i32, ty: MirType) -> DefId {
        let p = g.new_parameter(index, None);
        g.def_mut(p).set_result_type(ty);
        p
    }

    #[test]
    fn test_guards_are_movable() {
        let mut g = MirGraph::default();
        let i = typed_param(&mut g, 0, MirType::Int32);
        let n = typed_param(&mut g, 1, MirType::Int32);
        let o = typed_param(&mut g, 2, MirType::Object);
        for guard in [
            g.new_bounds_check(i, n),
            g.new_bounds_check_lower(i),
            g.new_guard_shape(o, HeapRef(1)),
            g.new_guard_class(o, HeapRef(2)),
        ] {
            assert!(g.def(guard).is_guard());
            assert!(g.def(guard).is_movable());
            assert!(g.is_fallible(guard));
        }
    }

    #[test]
    fn test_bounds_checks_merge_on_same_range() {
        let mut g = MirGraph::default();
        let i = typed_param(&mut g, 0, MirType::Int32);
        let n = typed_param(&mut g, 1, MirType::Int32);
        let a = g.new_bounds_check(i, n);
        let b = g.new_bounds_check(i, n);
        assert!(g.congruent_to(a, b));
        assert_eq!(g.value_hash(a), g.value_hash(b));

        g.set_bounds_check_range(b, 0, 3);
        assert!(!g.congruent_to(a, b));

        // The operands are not interchangeable.
        let swapped = g.new_bounds_check(n, i);
        assert!(!g.congruent_to(a, swapped));
    }

    #[test]
    fn test_shape_guards_compare_shape() {
        let mut g = MirGraph::default();
        g.set_alias_analyzed();
        let o = typed_param(&mut g, 0, MirType::Object);
        let a = g.new_guard_shape(o, HeapRef(7));
        let b = g.new_guard_shape(o, HeapRef(7));
        let c = g.new_guard_shape(o, HeapRef(8));
        assert!(g.congruent_to(a, b));
        assert!(!g.congruent_to(a, c));
        assert_eq!(g.alias_set(a), AliasSet::load(AliasFlags::OBJECT_FIELDS));
    }

    #[test]
    fn test_lower_check_fallibility() {
        let mut g = MirGraph::default();
        let i = typed_param(&mut g, 0, MirType::Int32);
        let check = g.new_bounds_check_lower(i);
        assert!(g.is_fallible(check));
        g.set_bounds_check_lower_infallible(check);
        assert!(!g.is_fallible(check));
        assert!(g.def(check).is_guard());
    }

    #[test]
    fn test_type_barrier() {
        let mut g = MirGraph::default();
        let v = g.new_parameter(0, None);
        let barrier = g.new_type_barrier(v, TypeSet::of(MirType::Int32), BailoutKind::TypeBarrier);
        assert_eq!(g.bailout_kind(barrier), BailoutKind::TypeBarrier);
        assert!(!g.type_barrier_always_bails(barrier));
        assert!(g.alias_set(barrier).is_none());

        let other = g.new_type_barrier(v, TypeSet::of(MirType::Int32), BailoutKind::TypeBarrier);
        assert!(!g.congruent_to(barrier, other));

        let s = g.new_constant(ConstValue::String("x".into()));
        let doomed = g.new_type_barrier(s, TypeSet::of(MirType::Int32), BailoutKind::Normal);
        assert!(g.type_barrier_always_bails(doomed));
    }

    #[test]
    fn test_checks() {
        let mut g = MirGraph::default();
        let over = g.new_check_over_recursed();
        let recompile = g.new_recompile_check();
        let interrupt = g.new_interrupt_check();
        assert!(g.is_effectful(over));
        assert!(g.alias_set(recompile).is_none());
        assert!(g.def(interrupt).is_guard());
    }
}
