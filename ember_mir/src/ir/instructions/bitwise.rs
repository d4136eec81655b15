//! Bitwise operators and shifts.
//!
//! All of them produce `Int32`. Until inference specializes them they may
//! call `valueOf` on an object operand and so report `Store(Any)`.

use super::InstructionKind;
use super::arith::evaluate_constant_operands;
use crate::ir::alias::AliasSet;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::opcode::Opcode;
use crate::ir::oracle::{BinaryTypes, UnaryTypes};
use crate::ir::types::MirType;
use crate::ir::value::ConstValue;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitwiseInfo {
    pub specialization: MirType,
    /// Ursh only: the unsigned result may not fit an int32.
    pub can_overflow: bool,
}

impl Default for BitwiseInfo {
    fn default() -> Self {
        BitwiseInfo {
            specialization: MirType::None,
            can_overflow: true,
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

impl MirGraph {
    fn new_binary_bitwise(
        &mut self,
        wrap: fn(BitwiseInfo) -> InstructionKind,
        lhs: DefId,
        rhs: DefId,
    ) -> DefId {
        let def = self.create(wrap(BitwiseInfo::default()), MirType::Int32, &[lhs, rhs]);
        self.def_mut(def).set_movable();
        def
    }

    pub fn new_bit_and(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_bitwise(InstructionKind::BitAnd, lhs, rhs)
    }

    pub fn new_bit_or(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_bitwise(InstructionKind::BitOr, lhs, rhs)
    }

    pub fn new_bit_xor(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_bitwise(InstructionKind::BitXor, lhs, rhs)
    }

    pub fn new_lsh(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_bitwise(InstructionKind::Lsh, lhs, rhs)
    }

    pub fn new_rsh(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_bitwise(InstructionKind::Rsh, lhs, rhs)
    }

    pub fn new_ursh(&mut self, lhs: DefId, rhs: DefId) -> DefId {
        self.new_binary_bitwise(InstructionKind::Ursh, lhs, rhs)
    }

    pub fn new_bit_not(&mut self, input: DefId) -> DefId {
        let def = self.create(
            InstructionKind::BitNot {
                specialization: MirType::None,
            },
            MirType::Int32,
            &[input],
        );
        self.def_mut(def).set_movable();
        def
    }

    pub fn bitwise_info(&self, def: DefId) -> Option<&BitwiseInfo> {
        match self.def(def).kind() {
            InstructionKind::BitAnd(info)
            | InstructionKind::BitOr(info)
            | InstructionKind::BitXor(info)
            | InstructionKind::Lsh(info)
            | InstructionKind::Rsh(info)
            | InstructionKind::Ursh(info) => Some(info),
            _ => None,
        }
    }

    fn bitwise_info_mut(&mut self, def: DefId) -> Option<&mut BitwiseInfo> {
        match self.def_mut(def).kind_mut() {
            InstructionKind::BitAnd(info)
            | InstructionKind::BitOr(info)
            | InstructionKind::BitXor(info)
            | InstructionKind::Lsh(info)
            | InstructionKind::Rsh(info)
            | InstructionKind::Ursh(info) => Some(info),
            _ => None,
        }
    }

    /// Specialize a bitwise instruction to `Int32`. And, or and xor become
    /// commutative; shifts do not.
    pub fn specialize_bitwise(&mut self, def: DefId) {
        if let InstructionKind::BitNot { specialization } = self.def_mut(def).kind_mut() {
            *specialization = MirType::Int32;
            return;
        }
        let op = self.def(def).opcode();
        if let Some(info) = self.bitwise_info_mut(def) {
            info.specialization = MirType::Int32;
        }
        if matches!(op, Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor) {
            self.def_mut(def).set_commutative_unchecked();
        }
    }

    /// Int32 unless an operand may be an object. An unsigned shift whose
    /// observed result is a double specializes to `Double` instead.
    pub fn infer_bitwise(&mut self, def: DefId, types: &BinaryTypes) {
        let maybe_object =
            types.lhs.maybe_object() || types.rhs.is_some_and(|rhs| rhs.maybe_object());
        if self.def(def).opcode() == Opcode::Ursh {
            if maybe_object {
                self.def_mut(def).set_result_type(MirType::Value);
                return;
            }
            if types.output.known_type() == MirType::Double {
                if let Some(info) = self.bitwise_info_mut(def) {
                    info.specialization = MirType::Double;
                    info.can_overflow = false;
                }
                self.def_mut(def).set_result_type(MirType::Double);
                return;
            }
        }
        if !maybe_object {
            self.specialize_bitwise(def);
        }
    }

    pub fn infer_bit_not(&mut self, def: DefId, types: &UnaryTypes) {
        if !types.input.maybe_object() {
            self.specialize_bitwise(def);
        }
    }
}

/// The unsigned result is negative as an int32 only when the left side is
/// negative and the shift count is a multiple of 32.
pub(super) fn ursh_can_overflow(graph: &MirGraph, def: DefId) -> bool {
    let Some(info) = graph.bitwise_info(def) else {
        return false;
    };
    if info.specialization != MirType::Int32 {
        return false;
    }
    let d = graph.def(def);
    let lhs = graph.constant_value(d.get_operand(0)).and_then(ConstValue::as_int32);
    let rhs = graph.constant_value(d.get_operand(1)).and_then(ConstValue::as_int32);
    if lhs.is_some_and(|v| v >= 0) || rhs.is_some_and(|v| v % 32 != 0) {
        return false;
    }
    info.can_overflow
}

fn operand(graph: &MirGraph, def: DefId, index: usize) -> DefId {
    graph.def(def).get_operand(index)
}

/// Operand `index` is the constant 0.
fn fold_if_zero(graph: &MirGraph, def: DefId, op: Opcode, index: usize) -> DefId {
    match op {
        // 0 & x is 0.
        Opcode::BitAnd => operand(graph, def, index),
        // 0 | x and 0 ^ x are x.
        Opcode::BitOr | Opcode::BitXor => operand(graph, def, 1 - index),
        // 0 << x is 0 and x << 0 is x.
        Opcode::Lsh | Opcode::Rsh => operand(graph, def, 0),
        // x >>> 0 is unsigned, so only 0 >>> x folds.
        Opcode::Ursh if index == 0 => operand(graph, def, 0),
        _ => def,
    }
}

/// Operand `index` is the constant -1.
fn fold_if_neg_one(graph: &MirGraph, def: DefId, op: Opcode, index: usize) -> DefId {
    match op {
        Opcode::BitAnd => operand(graph, def, 1 - index),
        Opcode::BitOr => operand(graph, def, index),
        // -1 >> x is -1.
        Opcode::Rsh if index == 0 => operand(graph, def, 0),
        _ => def,
    }
}

fn fold_if_equal(graph: &mut MirGraph, def: DefId, op: Opcode) -> DefId {
    match op {
        Opcode::BitAnd | Opcode::BitOr => operand(graph, def, 0),
        Opcode::BitXor => graph.new_constant(ConstValue::Int32(0)),
        _ => def,
    }
}

fn is_int32_constant(graph: &MirGraph, def: DefId, value: i32) -> bool {
    graph.is_constant(def, &ConstValue::Int32(value))
}

pub(super) fn fold_binary(graph: &mut MirGraph, def: DefId, use_value_numbers: bool) -> DefId {
    let Some(info) = graph.bitwise_info(def) else {
        return def;
    };
    if info.specialization != MirType::Int32 {
        return def;
    }
    if let Some(value) = evaluate_constant_operands(graph, def) {
        let folded = graph.new_constant(value);
        trace!(def = %def, folded = %folded, "fold bitwise constants");
        return folded;
    }

    let op = graph.def(def).opcode();
    let (lhs, rhs) = (operand(graph, def, 0), operand(graph, def, 1));
    let folded = if is_int32_constant(graph, lhs, 0) {
        fold_if_zero(graph, def, op, 0)
    } else if is_int32_constant(graph, rhs, 0) {
        fold_if_zero(graph, def, op, 1)
    } else if is_int32_constant(graph, lhs, -1) {
        fold_if_neg_one(graph, def, op, 0)
    } else if is_int32_constant(graph, rhs, -1) {
        fold_if_neg_one(graph, def, op, 1)
    } else if graph.equal_values(use_value_numbers, lhs, rhs) {
        fold_if_equal(graph, def, op)
    } else {
        def
    };
    // An operand not yet converted to int32 cannot stand in for the result.
    if folded != def && graph.result_type(folded) != MirType::Int32 {
        return def;
    }
    folded
}

pub(super) fn fold_bit_not(graph: &mut MirGraph, def: DefId) -> DefId {
    let InstructionKind::BitNot { specialization } = *graph.def(def).kind() else {
        return def;
    };
    if specialization != MirType::Int32 {
        return def;
    }
    let input = operand(graph, def, 0);
    if let Some(v) = graph.constant_value(input).and_then(ConstValue::to_int32) {
        return graph.new_constant(ConstValue::Int32(!v));
    }
    if graph.def(input).opcode() == Opcode::BitNot {
        // ~~x is x for an int32 x.
        let inner = operand(graph, input, 0);
        if graph.result_type(inner) == MirType::Int32 {
            return inner;
        }
    }
    def
}
