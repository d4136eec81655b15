//! Object storage: slots, dense elements and typed arrays.
//!
//! Loads and stores name the alias category they touch, so a store to a
//! slot never orders against an element load. Loads are movable; alias
//! analysis pins each one after the last store it may observe.

use super::InstructionKind;
use crate::ir::alias::{AliasFlags, AliasSet};
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::types::MirType;

/// Element type of a typed array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    Uint8Clamped,
}

impl TypedArrayKind {
    pub const fn name(self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "int8",
            TypedArrayKind::Uint8 => "uint8",
            TypedArrayKind::Int16 => "int16",
            TypedArrayKind::Uint16 => "uint16",
            TypedArrayKind::Int32 => "int32",
            TypedArrayKind::Uint32 => "uint32",
            TypedArrayKind::Float32 => "float32",
            TypedArrayKind::Float64 => "float64",
            TypedArrayKind::Uint8Clamped => "uint8clamped",
        }
    }

    pub const fn byte_size(self) -> u32 {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 => 8,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, TypedArrayKind::Float32 | TypedArrayKind::Float64)
    }

    #[inline]
    pub const fn is_byte_array(self) -> bool {
        self.byte_size() == 1
    }

    /// Stores wrap the value modulo the element width.
    #[inline]
    pub const fn stores_truncated(self) -> bool {
        !self.is_float() && !matches!(self, TypedArrayKind::Uint8Clamped)
    }

    /// Type an in-bounds load produces. Uint32 reads as int32 and bails
    /// out above `i32::MAX`.
    pub const fn load_type(self) -> MirType {
        if self.is_float() {
            MirType::Double
        } else {
            MirType::Int32
        }
    }
}

/// Which end `ArrayPopShift` removes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PopShiftMode {
    Pop,
    Shift,
}

pub(super) fn load_slot_alias_set(graph: &MirGraph, def: DefId) -> AliasSet {
    let slots = graph.def(def).get_operand(0);
    // Upvar slots never change after the closure is created.
    if slots.is_valid() && graph.result_type(slots) == MirType::UpvarSlots {
        AliasSet::none()
    } else {
        AliasSet::load(AliasFlags::SLOT)
    }
}

impl MirGraph {
    fn new_movable_load(&mut self, kind: InstructionKind, ty: MirType, operands: &[DefId]) -> DefId {
        let def = self.create(kind, ty, operands);
        self.def_mut(def).set_movable();
        def
    }

    fn debug_assert_type(&self, def: DefId, ty: MirType) {
        debug_assert!(
            self.result_type(def) == ty,
            "{} has type {}, expected {}",
            def,
            self.result_type(def),
            ty
        );
    }

    // =========================================================================
    // Object layout
    // =========================================================================

    pub fn new_slots(&mut self, object: DefId) -> DefId {
        self.new_movable_load(InstructionKind::Slots, MirType::Slots, &[object])
    }

    pub fn new_elements(&mut self, object: DefId) -> DefId {
        self.new_movable_load(InstructionKind::Elements, MirType::Elements, &[object])
    }

    pub fn new_initialized_length(&mut self, elements: DefId) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.new_movable_load(InstructionKind::InitializedLength, MirType::Int32, &[elements])
    }

    pub fn new_set_initialized_length(&mut self, elements: DefId, index: DefId) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.create(InstructionKind::SetInitializedLength, MirType::None, &[elements, index])
    }

    pub fn new_array_length(&mut self, elements: DefId) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.new_movable_load(InstructionKind::ArrayLength, MirType::Int32, &[elements])
    }

    pub fn new_typed_array_length(&mut self, object: DefId) -> DefId {
        self.new_movable_load(InstructionKind::TypedArrayLength, MirType::Int32, &[object])
    }

    pub fn new_typed_array_elements(&mut self, object: DefId) -> DefId {
        self.new_movable_load(InstructionKind::TypedArrayElements, MirType::Elements, &[object])
    }

    // =========================================================================
    // Dense elements
    // =========================================================================

    pub fn new_load_element(&mut self, elements: DefId, index: DefId, needs_hole_check: bool) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.debug_assert_type(index, MirType::Int32);
        self.new_movable_load(
            InstructionKind::LoadElement { needs_hole_check },
            MirType::Value,
            &[elements, index],
        )
    }

    /// Load that reads holes and out-of-bounds indices as `undefined`.
    pub fn new_load_element_hole(
        &mut self,
        elements: DefId,
        index: DefId,
        init_length: DefId,
        needs_hole_check: bool,
    ) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.debug_assert_type(index, MirType::Int32);
        self.debug_assert_type(init_length, MirType::Int32);
        self.new_movable_load(
            InstructionKind::LoadElementHole { needs_hole_check },
            MirType::Value,
            &[elements, index, init_length],
        )
    }

    pub fn new_store_element(&mut self, elements: DefId, index: DefId, value: DefId) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.debug_assert_type(index, MirType::Int32);
        self.create(
            InstructionKind::StoreElement {
                needs_barrier: false,
            },
            MirType::None,
            &[elements, index, value],
        )
    }

    /// Store that may grow the array by one element.
    pub fn new_store_element_hole(
        &mut self,
        object: DefId,
        elements: DefId,
        index: DefId,
        value: DefId,
    ) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.debug_assert_type(index, MirType::Int32);
        self.create(
            InstructionKind::StoreElementHole {
                needs_barrier: false,
            },
            MirType::None,
            &[object, elements, index, value],
        )
    }

    pub fn new_array_pop_shift(
        &mut self,
        object: DefId,
        mode: PopShiftMode,
        needs_hole_check: bool,
        maybe_undefined: bool,
    ) -> DefId {
        self.create(
            InstructionKind::ArrayPopShift {
                mode,
                needs_hole_check,
                maybe_undefined,
            },
            MirType::Value,
            &[object],
        )
    }

    pub fn new_array_push(&mut self, object: DefId, value: DefId) -> DefId {
        self.create(InstructionKind::ArrayPush, MirType::Int32, &[object, value])
    }

    /// Mark a store as needing a pre-write barrier.
    pub fn set_needs_barrier(&mut self, def: DefId) {
        match self.def_mut(def).kind_mut() {
            InstructionKind::StoreElement { needs_barrier }
            | InstructionKind::StoreElementHole { needs_barrier }
            | InstructionKind::StoreFixedSlot { needs_barrier, .. }
            | InstructionKind::StoreSlot { needs_barrier, .. } => *needs_barrier = true,
            other => debug_assert!(false, "{:?} has no write barrier", other.opcode()),
        }
    }

    // =========================================================================
    // Typed arrays
    // =========================================================================

    pub fn new_load_typed_array_element(
        &mut self,
        elements: DefId,
        index: DefId,
        array_type: TypedArrayKind,
    ) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.debug_assert_type(index, MirType::Int32);
        self.new_movable_load(
            InstructionKind::LoadTypedArrayElement { array_type },
            array_type.load_type(),
            &[elements, index],
        )
    }

    /// Out-of-bounds reads go through the VM, which may run getters.
    pub fn new_load_typed_array_element_hole(
        &mut self,
        object: DefId,
        index: DefId,
        array_type: TypedArrayKind,
        allow_double: bool,
    ) -> DefId {
        self.debug_assert_type(index, MirType::Int32);
        self.create(
            InstructionKind::LoadTypedArrayElementHole {
                array_type,
                allow_double,
            },
            MirType::Value,
            &[object, index],
        )
    }

    pub fn new_store_typed_array_element(
        &mut self,
        elements: DefId,
        index: DefId,
        value: DefId,
        array_type: TypedArrayKind,
    ) -> DefId {
        self.debug_assert_type(elements, MirType::Elements);
        self.debug_assert_type(index, MirType::Int32);
        self.create(
            InstructionKind::StoreTypedArrayElement { array_type },
            MirType::None,
            &[elements, index, value],
        )
    }

    // =========================================================================
    // Slots
    // =========================================================================

    pub fn new_load_fixed_slot(&mut self, object: DefId, slot: u32) -> DefId {
        self.new_movable_load(InstructionKind::LoadFixedSlot { slot }, MirType::Value, &[object])
    }

    pub fn new_store_fixed_slot(&mut self, object: DefId, value: DefId, slot: u32) -> DefId {
        self.create(
            InstructionKind::StoreFixedSlot {
                slot,
                needs_barrier: false,
            },
            MirType::None,
            &[object, value],
        )
    }

    /// Load `slots[slot]` from dynamic or upvar slots.
    pub fn new_load_slot(&mut self, slots: DefId, slot: u32) -> DefId {
        debug_assert!(
            matches!(self.result_type(slots), MirType::Slots | MirType::UpvarSlots),
            "load slot from {} of type {}",
            slots,
            self.result_type(slots)
        );
        self.new_movable_load(InstructionKind::LoadSlot { slot }, MirType::Value, &[slots])
    }

    pub fn new_store_slot(&mut self, slots: DefId, slot: u32, value: DefId) -> DefId {
        self.debug_assert_type(slots, MirType::Slots);
        self.create(
            InstructionKind::StoreSlot {
                slot,
                needs_barrier: false,
            },
            MirType::None,
            &[slots, value],
        )
    }

    pub fn new_function_environment(&mut self, function: DefId) -> DefId {
        self.new_movable_load(InstructionKind::FunctionEnvironment, MirType::Object, &[function])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::ConstValue;

    fn object(g: &mut MirGraph) -> DefId {
        let p = g.new_parameter(0, None);
        g.def_mut(p).set_result_type(MirType::Object);
        p
    }

    #[test]
    fn test_categories_do_not_interfere() {
        let mut g = MirGraph::default();
        let obj = object(&mut g);
        let slots = g.new_slots(obj);
        let elements = g.new_elements(obj);
        let index = g.new_constant(ConstValue::Int32(0));
        let value = g.new_constant(ConstValue::Null);

        let store_slot = g.new_store_slot(slots, 2, value);
        let load_element = g.new_load_element(elements, index, false);
        let store_element = g.new_store_element(elements, index, value);

        let (ss, le, se) = (
            g.alias_set(store_slot),
            g.alias_set(load_element),
            g.alias_set(store_element),
        );
        assert!(ss.is_store() && le.is_load());
        assert!(!ss.intersects(le));
        assert!(se.intersects(le));
    }

    #[test]
    fn test_store_element_hole_touches_fields() {
        let mut g = MirGraph::default();
        let obj = object(&mut g);
        let elements = g.new_elements(obj);
        let length = g.new_initialized_length(elements);
        let index = g.new_constant(ConstValue::Int32(0));
        let value = g.new_constant(ConstValue::Null);
        let store = g.new_store_element_hole(obj, elements, index, value);

        assert!(g.alias_set(store).intersects(g.alias_set(length)));
        assert_eq!(
            g.alias_set(store).flags(),
            AliasFlags::ELEMENT | AliasFlags::OBJECT_FIELDS
        );
    }

    #[test]
    fn test_upvar_slots_are_immutable() {
        let mut g = MirGraph::default();
        let env = g.new_parameter(0, None);
        g.def_mut(env).set_result_type(MirType::UpvarSlots);
        let upvar = g.new_load_slot(env, 1);
        assert!(g.alias_set(upvar).is_none());

        let obj = object(&mut g);
        let slots = g.new_slots(obj);
        let dynamic = g.new_load_slot(slots, 1);
        assert_eq!(g.alias_set(dynamic), AliasSet::load(AliasFlags::SLOT));
    }

    #[test]
    fn test_fixed_slot_loads_compare_slot_and_dependency() {
        let mut g = MirGraph::default();
        g.set_alias_analyzed();
        let obj = object(&mut g);
        let a = g.new_load_fixed_slot(obj, 3);
        let b = g.new_load_fixed_slot(obj, 3);
        let c = g.new_load_fixed_slot(obj, 4);
        assert!(g.congruent_to(a, b));
        assert!(!g.congruent_to(a, c));

        let value = g.new_constant(ConstValue::Null);
        let store = g.new_store_fixed_slot(obj, value, 3);
        g.def_mut(b).set_dependency(Some(store));
        assert!(!g.congruent_to(a, b));
    }

    #[test]
    fn test_typed_array_loads() {
        let mut g = MirGraph::default();
        let obj = object(&mut g);
        let elements = g.new_typed_array_elements(obj);
        let index = g.new_constant(ConstValue::Int32(0));

        let floats = g.new_load_typed_array_element(elements, index, TypedArrayKind::Float64);
        assert_eq!(g.result_type(floats), MirType::Double);
        assert!(!g.is_fallible(floats));

        let words = g.new_load_typed_array_element(elements, index, TypedArrayKind::Uint32);
        assert_eq!(g.result_type(words), MirType::Int32);
        assert!(g.is_fallible(words));

        let hole = g.new_load_typed_array_element_hole(obj, index, TypedArrayKind::Int8, true);
        assert!(g.is_effectful(hole));
        assert!(!TypedArrayKind::Uint8Clamped.stores_truncated());
        assert!(TypedArrayKind::Int16.stores_truncated());
    }

    #[test]
    fn test_needs_barrier() {
        let mut g = MirGraph::default();
        let obj = object(&mut g);
        let value = g.new_constant(ConstValue::Null);
        let store = g.new_store_fixed_slot(obj, value, 0);
        g.set_needs_barrier(store);
        assert_eq!(
            g.def(store).kind(),
            &InstructionKind::StoreFixedSlot {
                slot: 0,
                needs_barrier: true
            }
        );
    }
}
