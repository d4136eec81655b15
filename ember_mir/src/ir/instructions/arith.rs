//! Arithmetic: add, sub, mul, div, mod, and the unary math operations.
//!
//! Binary arithmetic starts unspecialized (result `Value`, effectful) and
//! is narrowed to `Int32` or `Double` by [`MirGraph::specialize_arith`] or
//! type inference. Int32 specializations carry edge-case flags
//! (overflow, negative zero, division by zero) that the range hooks clear
//! when they can prove the case impossible.

use super::InstructionKind;
use crate::ir::alias::AliasSet;
use crate::ir::graph::MirGraph;
use crate::ir::node::{DefId, NodeRef};
use crate::ir::opcode::Opcode;
use crate::ir::oracle::BinaryTypes;
use crate::ir::types::MirType;
use crate::ir::value::ConstValue;
use tracing::trace;

/// Specialization and edge-case state of a binary arithmetic instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArithInfo {
    pub specialization: MirType,
    /// Every consumer truncates the result to int32 anyway.
    pub implicit_truncate: bool,
    pub can_overflow: bool,
    pub can_be_negative_zero: bool,
    pub can_be_negative_overflow: bool,
    pub can_be_divide_by_zero: bool,
}

impl Default for ArithInfo {
    fn default() -> Self {
        ArithInfo {
            specialization: MirType::None,
            implicit_truncate: false,
            can_overflow: true,
            can_be_negative_zero: true,
            can_be_negative_overflow: true,
            can_be_divide_by_zero: true,
        }
    }
}

pub(super) fn alias_set(specialization: MirType) -> AliasSet {
    if specialization >= MirType::Object {
        AliasSet::default()
    } else {
        AliasSet::none()
    }
}

/// Identity element of the operation, when it has one that folds.
fn identity(op: Opcode) -> Option<f64> {
    match op {
        Opcode::Add | Opcode::Sub => Some(0.0),
        Opcode::Mul => Some(1.0),
        _ => None,
    }
}

// =============================================================================
// Factories
// =============================================================================

impl MirGraph {
    fn new_binary_arith(
        &mut self,
        wrap: fn(ArithInfo) -> InstructionKind,
        lhs: DefId,
        rhs: DefId,
    ) -> DefId {
        let def = self.create(wrap(ArithInfo::default()), MirType::Value, &[lhs, rhs]);
        self.def_mut(def).set_movable();
        def
    }

    pub fn new_add(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_arith(InstructionKind::Add, lhs, rhs)
    }

    pub fn new_sub(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_arith(InstructionKind::Sub, lhs, rhs)
    }

    pub fn new_mul(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_arith(InstructionKind::Mul, lhs, rhs)
    }

    pub fn new_div(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_arith(InstructionKind::Div, lhs, rhs)
    }

    pub fn new_mod(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_arith(InstructionKind::Mod, lhs, rhs)
    }

    /// `Math.abs` specialized to `Int32` or `Double`.
    pub fn new_abs(&mut self, num: DefId, ty: MirType) -> DefId {
        debug_assert!(
            matches!(ty, MirType::Int32 | MirType::Double),
            "abs specialized to {}",
            ty
        );
        let def = self.create(InstructionKind::Abs { specialization: ty }, ty, &[num]);
        self.def_mut(def).set_movable();
        def
    }

    pub fn new_sqrt(&mut self, num: DefId) -> DefId {
        let def = self.create(InstructionKind::Sqrt, MirType::Double, &[num]);
        self.def_mut(def).set_movable();
        def
    }

    pub fn new_floor(&mut self, num: DefId) -> DefId {
        let def = self.create(InstructionKind::Floor, MirType::Int32, &[num]);
        self.def_mut(def).set_movable();
        def
    }

    pub fn new_round(&mut self, num: DefId) -> DefId {
        let def = self.create(InstructionKind::Round, MirType::Int32, &[num]);
        self.def_mut(def).set_movable();
        def
    }

    /// Edge-case state of a binary arithmetic instruction.
    pub fn arith_info(&self, def: DefId) -> Option<&ArithInfo> {
        match self.def(def).kind() {
            InstructionKind::Add(info)
            | InstructionKind::Sub(info)
            | InstructionKind::Mul(info)
            | InstructionKind::Div(info)
            | InstructionKind::Mod(info) => Some(info),
            _ => None,
        }
    }

    pub fn arith_info_mut(&mut self, def: DefId) -> Option<&mut ArithInfo> {
        match self.def_mut(def).kind_mut() {
            InstructionKind::Add(info)
            | InstructionKind::Sub(info)
            | InstructionKind::Mul(info)
            | InstructionKind::Div(info)
            | InstructionKind::Mod(info) => Some(info),
            _ => None,
        }
    }

    /// Narrow a binary arithmetic instruction to `Int32` or `Double`.
    pub fn specialize_arith(&mut self, def: DefId, ty: MirType) {
        debug_assert!(
            matches!(ty, MirType::Int32 | MirType::Double),
            "arithmetic specialized to {}",
            ty
        );
        let op = self.def(def).opcode();
        let Some(info) = self.arith_info_mut(def) else {
            debug_assert!(false, "{} is not binary arithmetic", def);
            return;
        };
        info.specialization = ty;
        let d = self.def_mut(def);
        d.set_result_type(ty);
        if matches!(op, Opcode::Add | Opcode::Mul) {
            d.set_commutative_unchecked();
        }
    }

    /// Pick a specialization from observed operand and result types.
    ///
    /// Only numeric results specialize. Strings and objects never do, a
    /// boxed operand only when the result is a double, and an `undefined`
    /// operand never yields int32 since it converts to NaN.
    pub fn infer_arith(&mut self, def: DefId, types: &BinaryTypes) {
        let lhs = types.lhs.known_type();
        let lhs_coerces = types.lhs.known_non_string_primitive();
        let (rhs, rhs_coerces) = match types.rhs {
            Some(rhs) => (rhs.known_type(), rhs.known_non_string_primitive()),
            None => (MirType::Int32, true),
        };
        let rval = types.output.known_type();

        if !matches!(rval, MirType::Int32 | MirType::Double) {
            return;
        }
        if !lhs_coerces || !rhs_coerces {
            return;
        }
        if (lhs == MirType::Value || rhs == MirType::Value) && rval != MirType::Double {
            return;
        }
        if rval == MirType::Int32 && (lhs == MirType::Undefined || rhs == MirType::Undefined) {
            return;
        }
        self.specialize_arith(def, rval);
    }

    // =========================================================================
    // Edge-case queries
    // =========================================================================

    /// Whether any use of `def` can tell `-0` from `0`.
    ///
    /// Resume points always can. Definition uses are judged per opcode:
    /// consumers that convert to int32 or only read a numeric index are
    /// blind to the sign of zero in the slots listed below.
    pub fn need_negative_zero_check(&self, def: DefId) -> bool {
        for u in self.def(def).uses() {
            let NodeRef::Def(user) = u.node else {
                return true;
            };
            let user_def = self.def(user);
            match user_def.opcode() {
                Opcode::Add => {
                    // x + y is -0 only when both are -0. The operand that
                    // executes second may drop its check because the first
                    // is already known to be an int32. The first may drop
                    // its check only when the second cannot change type on
                    // a bailout between the two.
                    let (mut first, mut second) =
                        (user_def.get_operand(0), user_def.get_operand(1));
                    if self.def(first).id() > self.def(second).id() {
                        std::mem::swap(&mut first, &mut second);
                    }
                    if def == first
                        && !matches!(
                            self.def(second).opcode(),
                            Opcode::Constant
                                | Opcode::BitAnd
                                | Opcode::BitOr
                                | Opcode::BitXor
                                | Opcode::BitNot
                                | Opcode::Lsh
                                | Opcode::Rsh
                        )
                    {
                        return true;
                    }
                }
                Opcode::StoreElement
                | Opcode::StoreElementHole
                | Opcode::LoadElement
                | Opcode::LoadElementHole
                | Opcode::LoadTypedArrayElement
                | Opcode::LoadTypedArrayElementHole
                | Opcode::CharCodeAt
                | Opcode::Mod => {
                    // Only the index (operand 1) is blind.
                    if user_def.get_operand(0) == def
                        || user_def.operands().iter().skip(2).any(|&op| op == def)
                    {
                        return true;
                    }
                }
                Opcode::BoundsCheck => {
                    if user_def.get_operand(1) == def {
                        return true;
                    }
                }
                Opcode::ToString
                | Opcode::FromCharCode
                | Opcode::TableSwitch
                | Opcode::Compare
                | Opcode::BitAnd
                | Opcode::BitOr
                | Opcode::BitXor
                | Opcode::Abs
                | Opcode::TruncateToInt32 => {}
                _ => return true,
            }
        }
        false
    }

    /// Whether every use of `def` truncates it to int32, so computing it
    /// modulo 2^32 is unobservable.
    pub fn all_uses_truncate(&self, def: DefId) -> bool {
        self.def(def).uses().iter().all(|u| {
            let NodeRef::Def(user) = u.node else {
                return false;
            };
            match self.def(user).kind() {
                InstructionKind::TruncateToInt32
                | InstructionKind::BitNot { .. }
                | InstructionKind::BitAnd(_)
                | InstructionKind::BitOr(_)
                | InstructionKind::BitXor(_)
                | InstructionKind::Lsh(_)
                | InstructionKind::Rsh(_)
                | InstructionKind::Ursh(_) => true,
                InstructionKind::Add(info) | InstructionKind::Sub(info) => info.implicit_truncate,
                InstructionKind::StoreTypedArrayElement { array_type } => {
                    u.index == 2 && array_type.stores_truncated()
                }
                _ => false,
            }
        })
    }

    /// Merge the edge-case state of `dropped` into `keep` before value
    /// numbering replaces one with the other. Any case either side could
    /// hit survives; truncation survives only if both were truncated.
    pub fn update_for_replacement(&mut self, keep: DefId, dropped: DefId) -> bool {
        if let InstructionKind::ToInt32 {
            can_be_negative_zero: other,
        } = *self.def(dropped).kind()
        {
            if let InstructionKind::ToInt32 {
                can_be_negative_zero,
            } = self.def_mut(keep).kind_mut()
            {
                *can_be_negative_zero |= other;
            }
            return true;
        }
        let (Some(&kept), Some(&other)) = (self.arith_info(keep), self.arith_info(dropped)) else {
            return true;
        };
        if let Some(info) = self.arith_info_mut(keep) {
            info.implicit_truncate = kept.implicit_truncate && other.implicit_truncate;
            info.can_overflow |= other.can_overflow;
            info.can_be_negative_zero |= other.can_be_negative_zero;
            info.can_be_negative_overflow |= other.can_be_negative_overflow;
            info.can_be_divide_by_zero |= other.can_be_divide_by_zero;
        }
        true
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Bitwise, so that `-0` never stands in for the `+0` identity.
fn is_constant_number(graph: &MirGraph, def: DefId, value: f64) -> bool {
    graph
        .constant_value(def)
        .and_then(ConstValue::to_number)
        .is_some_and(|n| n.to_bits() == value.to_bits())
}

/// Evaluate a binary arithmetic, bitwise or shift instruction whose
/// operands are both constants. The result is rejected when its type
/// differs from the instruction's.
pub(super) fn evaluate_constant_operands(graph: &MirGraph, def: DefId) -> Option<ConstValue> {
    let d = graph.def(def);
    let lhs = graph.constant_value(d.get_operand(0))?;
    let rhs = graph.constant_value(d.get_operand(1))?;

    let int32 = |f: fn(i32, i32) -> i32| Some(ConstValue::Int32(f(lhs.to_int32()?, rhs.to_int32()?)));
    let number = |f: fn(f64, f64) -> f64| Some(ConstValue::number(f(lhs.to_number()?, rhs.to_number()?)));

    let result = match d.opcode() {
        Opcode::BitAnd => int32(|a, b| a & b)?,
        Opcode::BitOr => int32(|a, b| a | b)?,
        Opcode::BitXor => int32(|a, b| a ^ b)?,
        Opcode::Lsh => int32(|a, b| a.wrapping_shl((b & 0x1F) as u32))?,
        Opcode::Rsh => int32(|a, b| a.wrapping_shr((b & 0x1F) as u32))?,
        Opcode::Ursh => {
            let shifted = (lhs.to_int32()? as u32) >> ((rhs.to_int32()? & 0x1F) as u32);
            ConstValue::number(shifted as f64)
        }
        Opcode::Add => number(|a, b| a + b)?,
        Opcode::Sub => number(|a, b| a - b)?,
        Opcode::Mul => number(|a, b| a * b)?,
        Opcode::Div => number(|a, b| a / b)?,
        Opcode::Mod => number(|a, b| a % b)?,
        _ => return None,
    };
    (result.mir_type() == d.result_type()).then_some(result)
}

pub(super) fn fold_binary(graph: &mut MirGraph, def: DefId, use_value_numbers: bool) -> DefId {
    let Some(&info) = graph.arith_info(def) else {
        return def;
    };
    if info.specialization == MirType::None {
        return def;
    }
    if let Some(value) = evaluate_constant_operands(graph, def) {
        let folded = graph.new_constant(value);
        trace!(def = %def, folded = %folded, "fold arithmetic constants");
        return folded;
    }

    let op = graph.def(def).opcode();
    let (lhs, rhs) = (graph.def(def).get_operand(0), graph.def(def).get_operand(1));
    let ty = graph.result_type(def);
    // 0 + -0 is 0, so only int32 addition drops its identity.
    if op == Opcode::Add && info.specialization != MirType::Int32 {
        return def;
    }
    if let Some(id) = identity(op) {
        if is_constant_number(graph, rhs, id) && graph.result_type(lhs) == ty {
            return lhs;
        }
        if op == Opcode::Sub {
            return def;
        }
        if is_constant_number(graph, lhs, id) && graph.result_type(rhs) == ty {
            return rhs;
        }
    }

    if op == Opcode::Mul
        && info.specialization == MirType::Int32
        && graph.equal_values(use_value_numbers, lhs, rhs)
    {
        // x * x is never -0.
        if let Some(info) = graph.arith_info_mut(def) {
            info.can_be_negative_zero = false;
        }
    }
    def
}

pub(super) fn mul_range_forward(graph: &mut MirGraph, def: DefId) {
    let Some(&info) = graph.arith_info(def) else {
        return;
    };
    if info.specialization != MirType::Int32 {
        return;
    }
    let d = graph.def(def);
    let lhs = graph.constant_value(d.get_operand(0)).and_then(ConstValue::as_int32);
    let rhs = graph.constant_value(d.get_operand(1)).and_then(ConstValue::as_int32);

    let positive = lhs.is_some_and(|v| v > 0) || rhs.is_some_and(|v| v > 0);
    let fits = matches!((lhs, rhs), (Some(l), Some(r)) if l.checked_mul(r).is_some());
    if let Some(info) = graph.arith_info_mut(def) {
        if positive {
            info.can_be_negative_zero = false;
        }
        if fits {
            info.can_overflow = false;
        }
    }
}

pub(super) fn div_range_forward(graph: &mut MirGraph, def: DefId) {
    let Some(&info) = graph.arith_info(def) else {
        return;
    };
    if info.specialization != MirType::Int32 {
        return;
    }
    let d = graph.def(def);
    let lhs = graph.constant_value(d.get_operand(0)).cloned();
    let rhs = graph.constant_value(d.get_operand(1)).cloned();
    let Some(info) = graph.arith_info_mut(def) else {
        return;
    };

    if let Some(lhs) = &lhs {
        if lhs.as_int32() != Some(0) {
            info.can_be_negative_zero = false;
        }
        if lhs.as_int32() != Some(i32::MIN) {
            info.can_be_negative_overflow = false;
        }
    }
    if let Some(rhs) = &rhs {
        if rhs.as_int32() != Some(-1) {
            info.can_be_negative_overflow = false;
        }
        if rhs.as_int32() != Some(0) {
            info.can_be_divide_by_zero = false;
        }
        if rhs.as_int32().is_some_and(|v| v > 0) {
            info.can_be_negative_zero = false;
        }
    }
}

pub(super) fn negative_zero_backward(graph: &mut MirGraph, def: DefId) {
    if graph.need_negative_zero_check(def) {
        return;
    }
    match graph.def_mut(def).kind_mut() {
        InstructionKind::ToInt32 {
            can_be_negative_zero,
        } => *can_be_negative_zero = false,
        InstructionKind::Mul(info) | InstructionKind::Div(info) => {
            info.can_be_negative_zero = false
        }
        _ => return,
    }
    trace!(def = %def, "negative zero check removed");
}

pub(super) fn truncate_backward(graph: &mut MirGraph, def: DefId) {
    let Some(info) = graph.arith_info(def) else {
        return;
    };
    if info.implicit_truncate || !graph.all_uses_truncate(def) {
        return;
    }
    if let Some(info) = graph.arith_info_mut(def) {
        info.implicit_truncate = true;
        trace!(def = %def, "truncated");
    }
}

pub(super) fn fallible(op: Opcode, info: &ArithInfo) -> bool {
    if info.specialization != MirType::Int32 {
        return false;
    }
    match op {
        Opcode::Add | Opcode::Sub | Opcode::Div => !info.implicit_truncate,
        Opcode::Mul => info.can_be_negative_zero || info.can_overflow,
        Opcode::Mod => info.can_be_negative_zero || info.can_be_divide_by_zero,
        _ => false,
    }
}
