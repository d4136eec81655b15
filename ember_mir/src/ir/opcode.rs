//! Opcode discriminants and visitor dispatch.
//!
//! The opcode list is the single source for the [`Opcode`] enum, its
//! printable names and the [`MirVisitor`] trait. Visiting is a `match` on
//! the opcode that calls one handler per kind; handlers a visitor does not
//! override fall through to [`MirVisitor::visit_default`].

use super::graph::MirGraph;
use super::node::DefId;
use std::fmt;

macro_rules! mir_opcode_list {
    ($($op:ident => $visit:ident,)*) => {
        /// Kind tag of every MIR instruction.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opcode {
            $($op,)*
        }

        impl Opcode {
            /// Every opcode, in declaration order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$op,)*];

            /// Printable name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Opcode::$op => stringify!($op),)*
                }
            }
        }

        /// Per-opcode handlers over a read-only graph.
        pub trait MirVisitor {
            type Output;

            /// Fallback for every handler that is not overridden.
            fn visit_default(&mut self, graph: &MirGraph, def: DefId) -> Self::Output;

            $(
                fn $visit(&mut self, graph: &MirGraph, def: DefId) -> Self::Output {
                    self.visit_default(graph, def)
                }
            )*
        }

        /// Dispatch `def` to the handler for its opcode.
        pub fn accept<V: MirVisitor + ?Sized>(
            visitor: &mut V,
            graph: &MirGraph,
            def: DefId,
        ) -> V::Output {
            match graph.def(def).opcode() {
                $(Opcode::$op => visitor.$visit(graph, def),)*
            }
        }
    };
}

mir_opcode_list! {
    Start => visit_start,
    OsrEntry => visit_osr_entry,
    Constant => visit_constant,
    Parameter => visit_parameter,
    Callee => visit_callee,
    TableSwitch => visit_table_switch,
    Goto => visit_goto,
    Test => visit_test,
    Return => visit_return,
    Throw => visit_throw,
    NewArray => visit_new_array,
    NewObject => visit_new_object,
    InitProp => visit_init_prop,
    PrepareCall => visit_prepare_call,
    PassArg => visit_pass_arg,
    Call => visit_call,
    Compare => visit_compare,
    Box => visit_box,
    Unbox => visit_unbox,
    GuardObject => visit_guard_object,
    CreateThis => visit_create_this,
    ToDouble => visit_to_double,
    ToInt32 => visit_to_int32,
    TruncateToInt32 => visit_truncate_to_int32,
    ToString => visit_to_string,
    BitNot => visit_bit_not,
    TypeOf => visit_type_of,
    ToId => visit_to_id,
    BitAnd => visit_bit_and,
    BitOr => visit_bit_or,
    BitXor => visit_bit_xor,
    Lsh => visit_lsh,
    Rsh => visit_rsh,
    Ursh => visit_ursh,
    Abs => visit_abs,
    Sqrt => visit_sqrt,
    Add => visit_add,
    Sub => visit_sub,
    Mul => visit_mul,
    Div => visit_div,
    Mod => visit_mod,
    Concat => visit_concat,
    CharCodeAt => visit_char_code_at,
    FromCharCode => visit_from_char_code,
    Phi => visit_phi,
    OsrValue => visit_osr_value,
    OsrScopeChain => visit_osr_scope_chain,
    CheckOverRecursed => visit_check_over_recursed,
    RecompileCheck => visit_recompile_check,
    InterruptCheck => visit_interrupt_check,
    DefVar => visit_def_var,
    RegExp => visit_reg_exp,
    Lambda => visit_lambda,
    ImplicitThis => visit_implicit_this,
    Slots => visit_slots,
    Elements => visit_elements,
    InitializedLength => visit_initialized_length,
    SetInitializedLength => visit_set_initialized_length,
    ArrayLength => visit_array_length,
    TypedArrayLength => visit_typed_array_length,
    TypedArrayElements => visit_typed_array_elements,
    Not => visit_not,
    BoundsCheck => visit_bounds_check,
    BoundsCheckLower => visit_bounds_check_lower,
    LoadElement => visit_load_element,
    LoadElementHole => visit_load_element_hole,
    StoreElement => visit_store_element,
    StoreElementHole => visit_store_element_hole,
    ArrayPopShift => visit_array_pop_shift,
    ArrayPush => visit_array_push,
    LoadTypedArrayElement => visit_load_typed_array_element,
    LoadTypedArrayElementHole => visit_load_typed_array_element_hole,
    StoreTypedArrayElement => visit_store_typed_array_element,
    ClampToUint8 => visit_clamp_to_uint8,
    LoadFixedSlot => visit_load_fixed_slot,
    StoreFixedSlot => visit_store_fixed_slot,
    GetPropertyCache => visit_get_property_cache,
    GetElementCache => visit_get_element_cache,
    BindNameCache => visit_bind_name_cache,
    GuardShape => visit_guard_shape,
    GuardClass => visit_guard_class,
    LoadSlot => visit_load_slot,
    FunctionEnvironment => visit_function_environment,
    StoreSlot => visit_store_slot,
    CallGetName => visit_call_get_name,
    CallGetNameTypeOf => visit_call_get_name_type_of,
    CallSetProperty => visit_call_set_property,
    SetPropertyCache => visit_set_property_cache,
    DeleteProperty => visit_delete_property,
    CallGetProperty => visit_call_get_property,
    CallGetElement => visit_call_get_element,
    CallSetElement => visit_call_set_element,
    StringLength => visit_string_length,
    Floor => visit_floor,
    Round => visit_round,
    IteratorStart => visit_iterator_start,
    IteratorNext => visit_iterator_next,
    IteratorMore => visit_iterator_more,
    IteratorEnd => visit_iterator_end,
    TypeBarrier => visit_type_barrier,
    MonitorTypes => visit_monitor_types,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = Opcode::ALL.iter().map(|op| op.name()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(Opcode::TableSwitch.to_string(), "TableSwitch");
        assert_eq!(Opcode::ALL.first(), Some(&Opcode::Start));
    }
}
