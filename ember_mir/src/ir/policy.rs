//! Type policies: the input representations each instruction accepts.
//!
//! After specialization an instruction's operands may not yet have the
//! representation it operates on. The policy says what each operand must
//! be, and `adjust_inputs` inserts the conversion right before the
//! instruction:
//!
//! ```text
//!   v3 = parameter 0          : Value          v3 = parameter 0 : Value
//!   v4 = constant 1           : Int32    =>    v4 = constant 1  : Int32
//!   v5 = add v3, v4  [Int32]                   v6 = unbox v3    : Int32
//!                                              v5 = add v6, v4  [Int32]
//! ```
//!
//! Conversions that may fail (unboxing, int32 conversion of a double) are
//! fallible instructions and bail out like any other speculation.

use super::graph::MirGraph;
use super::instructions::{InstructionKind, TypedArrayKind, UnboxMode};
use super::node::{DefId, NodeRef};
use super::types::MirType;
use crate::error::Result;
use tracing::{debug, trace};

/// Representation one operand must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandPolicy {
    /// Boxed `Value`.
    Box,
    /// Object, or one of the raw object pointer types.
    Object,
    /// Int32, converting with a bailout on loss.
    Int32,
    /// Int32 by ECMAScript truncation, never failing.
    Truncate,
    Double,
    String,
}

/// Input conversion policy of an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypePolicy {
    /// Box every operand.
    BoxInputs,
    /// Operands match the arithmetic specialization, or are boxed when
    /// the operation is generic.
    Arithmetic(MirType),
    /// Operands are truncated to int32, or boxed when generic.
    Bitwise(MirType),
    /// Operands match the comparison specialization.
    Comparison(MirType),
    /// Branches accept any unboxed type.
    Test,
    /// The callee must be an object.
    Call,
    /// Object receiver followed by boxed operands.
    CallSetElement,
    /// The switch input must be int32.
    TableSwitch,
    /// Int32 index, and a value in the element representation.
    StoreTypedArray(TypedArrayKind),
    /// Number or boxed input.
    Clamp,
    /// Fixed requirements for leading operands. Operands past the end of
    /// the list are left alone.
    Operands(&'static [OperandPolicy]),
}

const SINGLE_OBJECT: &[OperandPolicy] = &[OperandPolicy::Object];
const OBJECT_BOX: &[OperandPolicy] = &[OperandPolicy::Object, OperandPolicy::Box];
const OBJECT_OBJECT: &[OperandPolicy] = &[OperandPolicy::Object, OperandPolicy::Object];
const STRING: &[OperandPolicy] = &[OperandPolicy::String];
const STRING_STRING: &[OperandPolicy] = &[OperandPolicy::String, OperandPolicy::String];
const STRING_INT: &[OperandPolicy] = &[OperandPolicy::String, OperandPolicy::Int32];
const INT: &[OperandPolicy] = &[OperandPolicy::Int32];
const DOUBLE: &[OperandPolicy] = &[OperandPolicy::Double];

impl TypePolicy {
    /// The policy of `kind`, or `None` for instructions that take their
    /// operands as they come.
    pub fn for_kind(kind: &InstructionKind) -> Option<TypePolicy> {
        use InstructionKind as K;
        let policy = match kind {
            K::Return
            | K::Throw
            | K::PassArg { .. }
            | K::TypeOf { .. }
            | K::ToId
            | K::CallGetElement
            | K::CallGetProperty { .. }
            | K::DeleteProperty { .. } => TypePolicy::BoxInputs,
            K::Add(info) | K::Sub(info) | K::Mul(info) | K::Div(info) | K::Mod(info) => {
                TypePolicy::Arithmetic(info.specialization)
            }
            K::Abs { specialization } => TypePolicy::Arithmetic(*specialization),
            K::BitAnd(info)
            | K::BitOr(info)
            | K::BitXor(info)
            | K::Lsh(info)
            | K::Rsh(info)
            | K::Ursh(info) => TypePolicy::Bitwise(info.specialization),
            K::BitNot { specialization } => TypePolicy::Bitwise(*specialization),
            K::Compare { specialization, .. } => TypePolicy::Comparison(*specialization),
            K::Test { .. } | K::Not => TypePolicy::Test,
            K::Call { .. } => TypePolicy::Call,
            K::CallSetElement | K::CallSetProperty { .. } => TypePolicy::CallSetElement,
            K::TableSwitch(_) => TypePolicy::TableSwitch,
            K::StoreTypedArrayElement { array_type } => TypePolicy::StoreTypedArray(*array_type),
            K::ClampToUint8 => TypePolicy::Clamp,
            K::Concat => TypePolicy::Operands(STRING_STRING),
            K::CharCodeAt => TypePolicy::Operands(STRING_INT),
            K::StringLength => TypePolicy::Operands(STRING),
            K::FromCharCode => TypePolicy::Operands(INT),
            K::Sqrt | K::Floor | K::Round => TypePolicy::Operands(DOUBLE),
            K::InitProp { .. } | K::GetElementCache { .. } => TypePolicy::Operands(OBJECT_BOX),
            K::CreateThis { .. } => TypePolicy::Operands(OBJECT_OBJECT),
            K::ArrayPopShift { .. }
            | K::ArrayPush
            | K::BindNameCache { .. }
            | K::CallGetName { .. }
            | K::CallGetNameTypeOf { .. }
            | K::Elements
            | K::FunctionEnvironment
            | K::GetPropertyCache { .. }
            | K::GuardClass { .. }
            | K::GuardShape { .. }
            | K::ImplicitThis
            | K::IteratorStart { .. }
            | K::IteratorNext
            | K::IteratorMore
            | K::IteratorEnd
            | K::Lambda { .. }
            | K::LoadElement { .. }
            | K::LoadElementHole { .. }
            | K::LoadFixedSlot { .. }
            | K::LoadSlot { .. }
            | K::LoadTypedArrayElementHole { .. }
            | K::SetPropertyCache { .. }
            | K::Slots
            | K::StoreElement { .. }
            | K::StoreElementHole { .. }
            | K::StoreFixedSlot { .. }
            | K::StoreSlot { .. }
            | K::TypedArrayElements
            | K::TypedArrayLength => TypePolicy::Operands(SINGLE_OBJECT),
            _ => return None,
        };
        Some(policy)
    }
}

fn arithmetic_operand(specialization: MirType) -> OperandPolicy {
    match specialization {
        MirType::Int32 => OperandPolicy::Int32,
        MirType::Double => OperandPolicy::Double,
        _ => OperandPolicy::Box,
    }
}

impl MirGraph {
    /// Insert the conversions `def`'s policy requires. Returns whether any
    /// operand changed. `def` must be an instruction in a block.
    pub fn adjust_inputs(&mut self, def: DefId) -> Result<bool> {
        let Some(policy) = self.type_policy(def) else {
            return Ok(false);
        };
        let n = self.def(def).num_operands();
        let mut changed = false;
        match policy {
            TypePolicy::BoxInputs => {
                for i in 0..n {
                    changed |= self.ensure_operand(def, i, OperandPolicy::Box)?;
                }
            }
            TypePolicy::Arithmetic(spec) => {
                let want = arithmetic_operand(spec);
                for i in 0..n {
                    changed |= self.ensure_operand(def, i, want)?;
                }
            }
            TypePolicy::Bitwise(spec) => {
                let want = if spec == MirType::None {
                    OperandPolicy::Box
                } else {
                    OperandPolicy::Truncate
                };
                for i in 0..n {
                    changed |= self.ensure_operand(def, i, want)?;
                }
            }
            TypePolicy::Comparison(spec) => {
                let want = match spec {
                    MirType::Object => Some(OperandPolicy::Object),
                    MirType::Int32 | MirType::Double | MirType::None => {
                        Some(arithmetic_operand(spec))
                    }
                    _ => None,
                };
                if let Some(want) = want {
                    for i in 0..n {
                        changed |= self.ensure_operand(def, i, want)?;
                    }
                }
            }
            TypePolicy::Test => {}
            TypePolicy::Call => {
                // Slot 0 is the prepare-call marker, slot 1 the callee.
                changed |= self.ensure_operand(def, 1, OperandPolicy::Object)?;
            }
            TypePolicy::CallSetElement => {
                changed |= self.ensure_operand(def, 0, OperandPolicy::Object)?;
                for i in 1..n {
                    changed |= self.ensure_operand(def, i, OperandPolicy::Box)?;
                }
            }
            TypePolicy::TableSwitch => {
                if self.operand_type(def, 0) != MirType::Int32 {
                    changed |= self.ensure_operand(def, 0, OperandPolicy::Box)?;
                    changed |= self.ensure_operand(def, 0, OperandPolicy::Int32)?;
                }
            }
            TypePolicy::StoreTypedArray(array_type) => {
                changed |= self.ensure_operand(def, 1, OperandPolicy::Int32)?;
                changed |= if array_type.is_float() {
                    self.ensure_operand(def, 2, OperandPolicy::Double)?
                } else if array_type == TypedArrayKind::Uint8Clamped {
                    self.clamp_operand(def, 2)?
                } else {
                    self.ensure_operand(def, 2, OperandPolicy::Truncate)?
                };
            }
            TypePolicy::Clamp => {
                if !matches!(
                    self.operand_type(def, 0),
                    MirType::Int32 | MirType::Double | MirType::Value
                ) {
                    changed |= self.ensure_operand(def, 0, OperandPolicy::Box)?;
                }
            }
            TypePolicy::Operands(wants) => {
                for (i, &want) in wants.iter().enumerate().take(n) {
                    changed |= self.ensure_operand(def, i, want)?;
                }
            }
        }
        Ok(changed)
    }

    fn operand_type(&self, def: DefId, index: usize) -> MirType {
        self.result_type(self.def(def).get_operand(index))
    }

    /// Put `conversion` before `def` and make it operand `index`.
    fn install_conversion(&mut self, def: DefId, index: usize, conversion: DefId) -> Result<()> {
        self.insert_before(def, conversion)?;
        self.replace_operand(NodeRef::Def(def), index, conversion);
        trace!(def = %def, index, conversion = %conversion, "insert conversion");
        Ok(())
    }

    fn box_operand(&mut self, def: DefId, index: usize) -> Result<DefId> {
        let input = self.def(def).get_operand(index);
        if self.result_type(input) == MirType::Value {
            return Ok(input);
        }
        let boxed = self.new_box(input);
        self.install_conversion(def, index, boxed)?;
        Ok(boxed)
    }

    fn ensure_operand(&mut self, def: DefId, index: usize, want: OperandPolicy) -> Result<bool> {
        let ty = self.operand_type(def, index);
        let conversion = match want {
            OperandPolicy::Box => {
                if ty == MirType::Value || !ty.is_boxable() {
                    return Ok(false);
                }
                self.box_operand(def, index)?;
                return Ok(true);
            }
            OperandPolicy::Object => {
                if matches!(
                    ty,
                    MirType::Object | MirType::Slots | MirType::Elements | MirType::UpvarSlots
                ) {
                    return Ok(false);
                }
                let boxed = self.box_operand(def, index)?;
                self.new_unbox(boxed, MirType::Object, UnboxMode::Fallible)
            }
            OperandPolicy::String => {
                if ty == MirType::String {
                    return Ok(false);
                }
                let boxed = self.box_operand(def, index)?;
                self.new_unbox(boxed, MirType::String, UnboxMode::Fallible)
            }
            OperandPolicy::Int32 => {
                if ty == MirType::Int32 {
                    return Ok(false);
                }
                let input = self.def(def).get_operand(index);
                if ty == MirType::Value {
                    self.new_unbox(input, MirType::Int32, UnboxMode::Fallible)
                } else {
                    self.new_to_int32(input)
                }
            }
            OperandPolicy::Truncate => {
                if ty == MirType::Int32 {
                    return Ok(false);
                }
                let input = if ty == MirType::Object {
                    self.box_operand(def, index)?
                } else {
                    self.def(def).get_operand(index)
                };
                self.new_truncate_to_int32(input)
            }
            OperandPolicy::Double => {
                if ty == MirType::Double {
                    return Ok(false);
                }
                let input = if ty == MirType::Object {
                    self.box_operand(def, index)?
                } else {
                    self.def(def).get_operand(index)
                };
                self.new_to_double(input)
            }
        };
        self.install_conversion(def, index, conversion)?;
        Ok(true)
    }

    fn clamp_operand(&mut self, def: DefId, index: usize) -> Result<bool> {
        let input = self.def(def).get_operand(index);
        match self.result_type(input) {
            MirType::Int32 => Ok(false),
            MirType::Double | MirType::Value => {
                let clamp = self.new_clamp_to_uint8(input);
                self.install_conversion(def, index, clamp)?;
                Ok(true)
            }
            _ => {
                let boxed = self.box_operand(def, index)?;
                let clamp = self.new_clamp_to_uint8(boxed);
                self.install_conversion(def, index, clamp)?;
                Ok(true)
            }
        }
    }

    /// Run `adjust_inputs` over every instruction in layout order. Returns
    /// the number of instructions whose inputs changed.
    pub fn apply_type_policies(&mut self) -> Result<usize> {
        let mut adjusted = 0;
        for bi in 0..self.blocks().len() {
            let block = self.blocks()[bi];
            for ins in self.instruction_ids(block) {
                if self.adjust_inputs(ins)? {
                    adjusted += 1;
                }
            }
        }
        debug!(adjusted, "applied type policies");
        Ok(adjusted)
    }
}
