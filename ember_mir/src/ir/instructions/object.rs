//! Allocation, strings, environment access and every operation that
//! calls back into the VM: inline caches, generic property calls and
//! iterators. Unless noted these keep the default `Store(Any)` footprint.

use super::InstructionKind;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::types::MirType;
use crate::ir::value::{Atom, HeapRef};

impl MirGraph {
    fn new_movable_value(&mut self, kind: InstructionKind, ty: MirType, operands: &[DefId]) -> DefId {
        let def = self.create(kind, ty, operands);
        self.def_mut(def).set_movable();
        def
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Array literal of `count` elements. An allocating array reserves
    /// its element storage up front.
    pub fn new_new_array(&mut self, count: u32, template: HeapRef, allocating: bool) -> DefId {
        self.create(
            InstructionKind::NewArray {
                count,
                template,
                allocating,
            },
            MirType::Object,
            &[],
        )
    }

    pub fn new_new_object(&mut self, template: HeapRef) -> DefId {
        self.create(InstructionKind::NewObject { template }, MirType::Object, &[])
    }

    /// Define `name` on a freshly allocated literal object.
    pub fn new_init_prop(&mut self, object: DefId, name: Atom, value: DefId) -> DefId {
        self.create(InstructionKind::InitProp { name }, MirType::None, &[object, value])
    }

    /// `this` for a constructor call.
    pub fn new_create_this(
        &mut self,
        callee: DefId,
        prototype: DefId,
        template: Option<HeapRef>,
    ) -> DefId {
        self.create(
            InstructionKind::CreateThis { template },
            MirType::Object,
            &[callee, prototype],
        )
    }

    /// Regular expression literal. Cloning observes the regexp statics, so
    /// only the non-cloning form may move.
    pub fn new_regexp(&mut self, source: HeapRef, must_clone: bool) -> DefId {
        let def = self.create(
            InstructionKind::RegExp { source, must_clone },
            MirType::Object,
            &[],
        );
        if !must_clone {
            self.def_mut(def).set_movable();
        }
        def
    }

    pub fn new_lambda(&mut self, scope_chain: DefId, function: HeapRef) -> DefId {
        self.create(InstructionKind::Lambda { function }, MirType::Object, &[scope_chain])
    }

    pub fn new_def_var(&mut self, name: Atom, attrs: u32, scope_chain: DefId) -> DefId {
        self.create(InstructionKind::DefVar { name, attrs }, MirType::None, &[scope_chain])
    }

    pub fn new_implicit_this(&mut self, callee: DefId) -> DefId {
        self.new_movable_value(InstructionKind::ImplicitThis, MirType::Value, &[callee])
    }

    // =========================================================================
    // Strings
    // =========================================================================

    pub fn new_concat(&mut self, left: DefId, right: DefId) -> DefId {
        self.new_movable_value(InstructionKind::Concat, MirType::String, &[left, right])
    }

    pub fn new_char_code_at(&mut self, string: DefId, index: DefId) -> DefId {
        self.new_movable_value(InstructionKind::CharCodeAt, MirType::Int32, &[string, index])
    }

    pub fn new_from_char_code(&mut self, code: DefId) -> DefId {
        self.new_movable_value(InstructionKind::FromCharCode, MirType::String, &[code])
    }

    pub fn new_string_length(&mut self, string: DefId) -> DefId {
        self.new_movable_value(InstructionKind::StringLength, MirType::Int32, &[string])
    }

    // =========================================================================
    // OSR
    // =========================================================================

    /// Value at `frame_offset` of the interpreter frame being replaced.
    pub fn new_osr_value(&mut self, entry: DefId, frame_offset: i32) -> DefId {
        debug_assert!(
            self.result_type(entry) == MirType::StackFrame,
            "OSR value read from {}",
            entry
        );
        self.create(InstructionKind::OsrValue { frame_offset }, MirType::Value, &[entry])
    }

    pub fn new_osr_scope_chain(&mut self, entry: DefId) -> DefId {
        debug_assert!(
            self.result_type(entry) == MirType::StackFrame,
            "OSR scope chain read from {}",
            entry
        );
        self.create(InstructionKind::OsrScopeChain, MirType::Object, &[entry])
    }

    // =========================================================================
    // Inline caches
    // =========================================================================

    pub fn new_get_property_cache(&mut self, object: DefId, name: Atom) -> DefId {
        self.create(
            InstructionKind::GetPropertyCache {
                name,
                idempotent: false,
                allow_get_set: false,
            },
            MirType::Value,
            &[object],
        )
    }

    /// Mark a property cache as free of side effects: it only ever reads
    /// own or prototype data properties. Idempotent caches are loads and
    /// may be hoisted and deduplicated.
    pub fn set_get_property_cache_idempotent(&mut self, def: DefId) {
        let d = self.def_mut(def);
        if let InstructionKind::GetPropertyCache { idempotent, .. } = d.kind_mut() {
            debug_assert!(!*idempotent, "cache already idempotent");
            *idempotent = true;
            d.set_movable();
        }
    }

    /// Let the cache call getters and setters.
    pub fn set_get_property_cache_allow_get_set(&mut self, def: DefId) {
        if let InstructionKind::GetPropertyCache { allow_get_set, .. } = self.def_mut(def).kind_mut()
        {
            *allow_get_set = true;
        }
    }

    pub fn new_get_element_cache(
        &mut self,
        object: DefId,
        index: DefId,
        monitored_result: bool,
    ) -> DefId {
        self.create(
            InstructionKind::GetElementCache { monitored_result },
            MirType::Value,
            &[object, index],
        )
    }

    /// Find the scope object that binds `name` for the op at `pc`.
    pub fn new_bind_name_cache(&mut self, scope_chain: DefId, name: Atom, pc: u32) -> DefId {
        self.create(
            InstructionKind::BindNameCache { name, pc },
            MirType::Object,
            &[scope_chain],
        )
    }

    pub fn new_set_property_cache(
        &mut self,
        object: DefId,
        value: DefId,
        name: Atom,
        strict: bool,
    ) -> DefId {
        self.create(
            InstructionKind::SetPropertyCache { name, strict },
            MirType::None,
            &[object, value],
        )
    }

    // =========================================================================
    // Generic property calls
    // =========================================================================

    pub fn new_call_get_name(&mut self, scope_object: DefId, name: Atom) -> DefId {
        self.create(InstructionKind::CallGetName { name }, MirType::Value, &[scope_object])
    }

    /// Name lookup for `typeof name`, which yields `undefined` instead of
    /// throwing on an unbound name.
    pub fn new_call_get_name_type_of(&mut self, scope_object: DefId, name: Atom) -> DefId {
        self.create(
            InstructionKind::CallGetNameTypeOf { name },
            MirType::Value,
            &[scope_object],
        )
    }

    pub fn new_call_set_property(
        &mut self,
        object: DefId,
        value: DefId,
        name: Atom,
        strict: bool,
    ) -> DefId {
        self.create(
            InstructionKind::CallSetProperty { name, strict },
            MirType::None,
            &[object, value],
        )
    }

    pub fn new_delete_property(&mut self, value: DefId, name: Atom) -> DefId {
        self.create(InstructionKind::DeleteProperty { name }, MirType::Boolean, &[value])
    }

    pub fn new_call_get_property(&mut self, value: DefId, name: Atom) -> DefId {
        self.create(
            InstructionKind::CallGetProperty {
                name,
                effectful: true,
            },
            MirType::Value,
            &[value],
        )
    }

    /// Inference proved the lookup runs no getter. The call then has no
    /// memory footprint and can be value numbered.
    pub fn mark_call_get_property_uneffectful(&mut self, def: DefId) {
        if let InstructionKind::CallGetProperty { effectful, .. } = self.def_mut(def).kind_mut() {
            *effectful = false;
        }
    }

    pub fn new_call_get_element(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.create(InstructionKind::CallGetElement, MirType::Value, &[lhs, rhs])
    }

    pub fn new_call_set_element(&mut self, object: DefId, index: DefId, value: DefId) -> DefId {
        self.create(
            InstructionKind::CallSetElement,
            MirType::None,
            &[object, index, value],
        )
    }

    // =========================================================================
    // Iterators
    // =========================================================================

    pub fn new_iterator_start(&mut self, object: DefId, flags: u8) -> DefId {
        self.create(InstructionKind::IteratorStart { flags }, MirType::Object, &[object])
    }

    pub fn new_iterator_next(&mut self, iterator: DefId) -> DefId {
        self.create(InstructionKind::IteratorNext, MirType::Value, &[iterator])
    }

    pub fn new_iterator_more(&mut self, iterator: DefId) -> DefId {
        self.create(InstructionKind::IteratorMore, MirType::Boolean, &[iterator])
    }

    pub fn new_iterator_end(&mut self, iterator: DefId) -> DefId {
        self.create(InstructionKind::IteratorEnd, MirType::None, &[iterator])
    }
}
