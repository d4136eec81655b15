//! Comparisons, boxing and type conversions.

use super::{BailoutKind, InstructionKind};
use crate::ir::alias::AliasSet;
use crate::ir::graph::MirGraph;
use crate::ir::node::DefId;
use crate::ir::opcode::Opcode;
use crate::ir::oracle::BinaryTypes;
use crate::ir::types::MirType;
use crate::ir::value::{ConstValue, js_to_int32};
use std::cmp::Ordering;
use tracing::trace;

// =============================================================================
// Comparison
// =============================================================================

/// Relational and equality operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

impl CompareOp {
    pub const fn name(self) -> &'static str {
        match self {
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::StrictEq => "stricteq",
            CompareOp::StrictNe => "strictne",
        }
    }

    #[inline]
    pub const fn is_strict(self) -> bool {
        matches!(self, CompareOp::StrictEq | CompareOp::StrictNe)
    }

    fn from_ordering(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (_, None) => matches!(self, CompareOp::Ne | CompareOp::StrictNe),
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
            (CompareOp::Eq | CompareOp::StrictEq, Some(o)) => o == Ordering::Equal,
            (CompareOp::Ne | CompareOp::StrictNe, Some(o)) => o != Ordering::Equal,
        }
    }

    /// Evaluate on two constants, when the answer needs no conversion the
    /// runtime would observe.
    pub fn evaluate(self, lhs: &ConstValue, rhs: &ConstValue) -> Option<bool> {
        use ConstValue as V;
        if let (Some(l), Some(r)) = (lhs.to_number(), rhs.to_number()) {
            return Some(self.from_ordering(l.partial_cmp(&r)));
        }
        match (lhs, rhs) {
            (V::String(l), V::String(r)) => {
                Some(self.from_ordering(Some(l.encode_utf16().cmp(r.encode_utf16()))))
            }
            (V::Boolean(l), V::Boolean(r)) => Some(self.from_ordering(Some(l.cmp(r)))),
            (V::Undefined | V::Null, V::Undefined | V::Null) => {
                let same = std::mem::discriminant(lhs) == std::mem::discriminant(rhs);
                match self {
                    CompareOp::Eq => Some(true),
                    CompareOp::Ne => Some(false),
                    CompareOp::StrictEq => Some(same),
                    CompareOp::StrictNe => Some(!same),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

pub(super) fn compare_alias_set(specialization: MirType) -> AliasSet {
    if specialization == MirType::None {
        AliasSet::default()
    } else {
        AliasSet::none()
    }
}

pub(super) fn type_of_alias_set(input_type: MirType) -> AliasSet {
    // typeof on an object may run a hook.
    if input_type <= MirType::String {
        AliasSet::none()
    } else {
        AliasSet::default()
    }
}

// =============================================================================
// Unboxing
// =============================================================================

/// What an unbox does when the value has another type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnboxMode {
    /// Bail out.
    Fallible,
    /// The type is already known.
    Infallible,
    /// Bail out and record the type for the barrier.
    TypeBarrier,
    /// Bail out; the unbox also stands as a guard. Stored as `Fallible`.
    TypeGuard,
}

impl UnboxMode {
    #[inline]
    pub const fn is_fallible(self) -> bool {
        !matches!(self, UnboxMode::Infallible)
    }

    pub const fn bailout_kind(self) -> BailoutKind {
        match self {
            UnboxMode::TypeBarrier => BailoutKind::TypeBarrier,
            _ => BailoutKind::Normal,
        }
    }
}

// =============================================================================
// Factories
// =============================================================================

impl MirGraph {
    fn new_movable(&mut self, kind: InstructionKind, ty: MirType, operands: &[DefId]) -> DefId {
        let def = self.create(kind, ty, operands);
        self.def_mut(def).set_movable();
        def
    }

    pub fn new_compare(&mut self, lhs: DefId, rhs: DefId, op: CompareOp) -> DefId {
        self.new_movable(
            InstructionKind::Compare {
                op,
                specialization: MirType::None,
            },
            MirType::Boolean,
            &[lhs, rhs],
        )
    }

    pub fn specialize_compare(&mut self, def: DefId, ty: MirType) {
        debug_assert!(ty <= MirType::Object, "compare specialized to {}", ty);
        if let InstructionKind::Compare { specialization, .. } = self.def_mut(def).kind_mut() {
            *specialization = ty;
        }
    }

    /// Int32 for int32 or boolean pairs, Double for any numeric pair, and
    /// Object for strict identity of two objects.
    pub fn infer_compare(&mut self, def: DefId, types: &BinaryTypes) {
        let Some(rhs) = types.rhs else {
            return;
        };
        let (l, r) = (types.lhs.known_type(), rhs.known_type());
        let InstructionKind::Compare { op, .. } = *self.def(def).kind() else {
            return;
        };
        let ty = if (l == MirType::Int32 && r == MirType::Int32)
            || (l == MirType::Boolean && r == MirType::Boolean)
        {
            MirType::Int32
        } else if l.is_number() && r.is_number() {
            MirType::Double
        } else if op.is_strict() && l == MirType::Object && r == MirType::Object {
            MirType::Object
        } else {
            return;
        };
        self.specialize_compare(def, ty);
    }

    /// Logical not of any value.
    pub fn new_not(&mut self, input: DefId) -> DefId {
        self.new_movable(InstructionKind::Not, MirType::Boolean, &[input])
    }

    /// Box a typed value into a `Value`.
    pub fn new_box(&mut self, input: DefId) -> DefId {
        debug_assert!(
            self.result_type(input) != MirType::Value,
            "boxing already boxed {}",
            input
        );
        self.new_movable(InstructionKind::Box, MirType::Value, &[input])
    }

    /// Unbox a `Value` to `ty`. Barrier and guard modes make the unbox a
    /// guard.
    pub fn new_unbox(&mut self, input: DefId, ty: MirType, mode: UnboxMode) -> DefId {
        debug_assert!(
            self.result_type(input) == MirType::Value,
            "unboxing {} of type {}",
            input,
            self.result_type(input)
        );
        let stored = match mode {
            UnboxMode::TypeGuard => UnboxMode::Fallible,
            other => other,
        };
        let def = self.new_movable(InstructionKind::Unbox { mode: stored }, ty, &[input]);
        if matches!(mode, UnboxMode::TypeBarrier | UnboxMode::TypeGuard) {
            self.def_mut(def).set_guard();
        }
        def
    }

    pub fn new_guard_object(&mut self, input: DefId) -> DefId {
        let def = self.new_movable(InstructionKind::GuardObject, MirType::Object, &[input]);
        self.def_mut(def).set_guard();
        def
    }

    pub fn new_to_double(&mut self, input: DefId) -> DefId {
        self.new_movable(InstructionKind::ToDouble, MirType::Double, &[input])
    }

    pub fn new_to_int32(&mut self, input: DefId) -> DefId {
        self.new_movable(
            InstructionKind::ToInt32 {
                can_be_negative_zero: true,
            },
            MirType::Int32,
            &[input],
        )
    }

    pub fn new_truncate_to_int32(&mut self, input: DefId) -> DefId {
        self.new_movable(InstructionKind::TruncateToInt32, MirType::Int32, &[input])
    }

    pub fn new_to_string(&mut self, input: DefId) -> DefId {
        self.new_movable(InstructionKind::ToString, MirType::String, &[input])
    }

    pub fn new_type_of(&mut self, input: DefId, input_type: MirType) -> DefId {
        self.create(InstructionKind::TypeOf { input_type }, MirType::String, &[input])
    }

    pub fn new_to_id(&mut self, object: DefId, index: DefId) -> DefId {
        self.create(InstructionKind::ToId, MirType::Value, &[object, index])
    }

    pub fn new_clamp_to_uint8(&mut self, input: DefId) -> DefId {
        self.new_movable(InstructionKind::ClampToUint8, MirType::Int32, &[input])
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Whether a conversion from `input` can fail at runtime.
pub(super) fn conversion_fallible(op: Opcode, input: MirType) -> bool {
    match op {
        Opcode::ToInt32 => !matches!(input, MirType::Int32 | MirType::Boolean | MirType::Null),
        Opcode::TruncateToInt32 | Opcode::ToDouble => !matches!(
            input,
            MirType::Int32
                | MirType::Double
                | MirType::Boolean
                | MirType::Null
                | MirType::Undefined
        ),
        _ => false,
    }
}

/// JS `ClampToUint8`: NaN and negatives to 0, ties to even.
fn clamp_to_uint8(d: f64) -> i32 {
    if d.is_nan() || d <= 0.0 {
        0
    } else if d >= 255.0 {
        255
    } else {
        d.round_ties_even() as i32
    }
}

pub(super) fn fold_compare(graph: &mut MirGraph, def: DefId) -> DefId {
    let InstructionKind::Compare { op, .. } = *graph.def(def).kind() else {
        return def;
    };
    let d = graph.def(def);
    let (Some(lhs), Some(rhs)) = (
        graph.constant_value(d.get_operand(0)),
        graph.constant_value(d.get_operand(1)),
    ) else {
        return def;
    };
    match op.evaluate(lhs, rhs) {
        Some(result) => {
            let folded = graph.new_constant(ConstValue::Boolean(result));
            trace!(def = %def, folded = %folded, "fold compare");
            folded
        }
        None => def,
    }
}

/// A conversion whose input already has the target type is the input.
fn passes_through(kind: &InstructionKind, input_type: MirType) -> bool {
    match kind {
        InstructionKind::ToDouble => input_type == MirType::Double,
        InstructionKind::ToInt32 { .. } | InstructionKind::TruncateToInt32 => {
            input_type == MirType::Int32
        }
        InstructionKind::ToString => input_type == MirType::String,
        _ => false,
    }
}

fn fold_to_constant(
    kind: &InstructionKind,
    input_type: MirType,
    constant: Option<&ConstValue>,
) -> Option<ConstValue> {
    match kind {
        InstructionKind::ToDouble => Some(ConstValue::Double(constant?.to_number()?)),
        InstructionKind::TruncateToInt32 => Some(ConstValue::Int32(constant?.to_int32()?)),
        InstructionKind::TypeOf { input_type } => {
            Some(ConstValue::String(input_type.type_of_name()?.into()))
        }
        InstructionKind::Not => match constant {
            Some(c) => Some(ConstValue::Boolean(!c.to_boolean()?)),
            None => matches!(input_type, MirType::Undefined | MirType::Null)
                .then_some(ConstValue::Boolean(true)),
        },
        InstructionKind::ClampToUint8 => {
            Some(ConstValue::Int32(clamp_to_uint8(constant?.to_number()?)))
        }
        _ => None,
    }
}

pub(super) fn fold_conversion(graph: &mut MirGraph, def: DefId) -> DefId {
    let d = graph.def(def);
    let input = d.get_operand(0);
    let input_type = graph.result_type(input);
    if passes_through(d.kind(), input_type) {
        return input;
    }
    match fold_to_constant(d.kind(), input_type, graph.constant_value(input)) {
        Some(value) => {
            let folded = graph.new_constant(value);
            trace!(def = %def, folded = %folded, "fold conversion");
            folded
        }
        None => def,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::oracle::TypeSet;

    fn constant(g: &mut MirGraph, v: ConstValue) -> DefId {
        g.new_constant(v)
    }

    #[test]
    fn test_compare_evaluate() {
        use ConstValue as V;
        assert_eq!(CompareOp::Lt.evaluate(&V::Int32(1), &V::Double(1.5)), Some(true));
        assert_eq!(CompareOp::Eq.evaluate(&V::Double(f64::NAN), &V::Double(f64::NAN)), Some(false));
        assert_eq!(CompareOp::Ne.evaluate(&V::Double(f64::NAN), &V::Int32(0)), Some(true));
        assert_eq!(CompareOp::Eq.evaluate(&V::Null, &V::Undefined), Some(true));
        assert_eq!(CompareOp::StrictEq.evaluate(&V::Null, &V::Undefined), Some(false));
        assert_eq!(
            CompareOp::Lt.evaluate(&V::String("a".into()), &V::String("b".into())),
            Some(true)
        );
        assert_eq!(CompareOp::Eq.evaluate(&V::Int32(1), &V::String("1".into())), None);
    }

    #[test]
    fn test_fold_compare_of_constants() {
        let mut g = MirGraph::default();
        let a = constant(&mut g, ConstValue::Int32(2));
        let b = constant(&mut g, ConstValue::Int32(3));
        let cmp = g.new_compare(a, b, CompareOp::Ge);
        let folded = g.fold(cmp, false);
        assert_eq!(g.constant_value(folded), Some(&ConstValue::Boolean(false)));
        assert_eq!(g.result_type(folded), g.result_type(cmp));
    }

    #[test]
    fn test_compare_specialization_and_congruence() {
        let mut g = MirGraph::default();
        let x = g.new_parameter(0, None);
        let y = g.new_parameter(1, None);
        let lt = g.new_compare(x, y, CompareOp::Lt);
        let gt = g.new_compare(x, y, CompareOp::Gt);
        assert!(g.is_effectful(lt));

        let int = TypeSet::of(MirType::Int32);
        let boolean = TypeSet::of(MirType::Boolean);
        g.infer_compare(lt, &BinaryTypes::new(int, int, boolean));
        g.infer_compare(gt, &BinaryTypes::new(int, int, boolean));
        assert!(!g.is_effectful(lt));
        assert!(!g.congruent_to(lt, gt));

        let lt2 = g.new_compare(x, y, CompareOp::Lt);
        g.specialize_compare(lt2, MirType::Int32);
        assert!(g.congruent_to(lt, lt2));

        let objects = g.new_compare(x, y, CompareOp::StrictEq);
        let object = TypeSet::of(MirType::Object);
        g.infer_compare(objects, &BinaryTypes::new(object, object, boolean));
        assert_eq!(
            g.def(objects).kind(),
            &InstructionKind::Compare {
                op: CompareOp::StrictEq,
                specialization: MirType::Object
            }
        );
    }

    #[test]
    fn test_unbox_modes() {
        let mut g = MirGraph::default();
        let v = g.new_parameter(0, None);
        let plain = g.new_unbox(v, MirType::Int32, UnboxMode::Infallible);
        let barrier = g.new_unbox(v, MirType::Int32, UnboxMode::TypeBarrier);
        let guard = g.new_unbox(v, MirType::Int32, UnboxMode::TypeGuard);

        assert!(!g.def(plain).is_guard());
        assert!(!g.is_fallible(plain));
        assert!(g.def(barrier).is_guard());
        assert_eq!(g.bailout_kind(barrier), BailoutKind::TypeBarrier);
        assert!(g.def(guard).is_guard());
        assert_eq!(
            g.def(guard).kind(),
            &InstructionKind::Unbox {
                mode: UnboxMode::Fallible
            }
        );
        assert_eq!(g.bailout_kind(guard), BailoutKind::Normal);
        assert!(g.is_fallible(guard));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "boxing already boxed")]
    fn test_box_of_boxed_value_panics() {
        let mut g = MirGraph::default();
        let v = g.new_parameter(0, None);
        g.new_box(v);
    }

    #[test]
    fn test_conversions_pass_through_matching_input() {
        let mut g = MirGraph::default();
        let x = g.new_parameter(0, None);
        g.def_mut(x).set_result_type(MirType::Int32);

        let to_int = g.new_to_int32(x);
        assert_eq!(g.fold(to_int, false), x);
        let trunc = g.new_truncate_to_int32(x);
        assert_eq!(g.fold(trunc, false), x);
        let to_double = g.new_to_double(x);
        assert_eq!(g.fold(to_double, false), to_double);
    }

    #[test]
    fn test_conversions_fold_constants() {
        let mut g = MirGraph::default();
        let big = constant(&mut g, ConstValue::Double(4_294_967_297.5));
        let trunc = g.new_truncate_to_int32(big);
        let folded = g.fold(trunc, false);
        assert_eq!(g.constant_value(folded), Some(&ConstValue::Int32(1)));

        let three = constant(&mut g, ConstValue::Int32(3));
        let to_double = g.new_to_double(three);
        let folded = g.fold(to_double, false);
        assert_eq!(g.result_type(folded), MirType::Double);

        let half = constant(&mut g, ConstValue::Double(2.5));
        let clamp = g.new_clamp_to_uint8(half);
        let folded = g.fold(clamp, false);
        assert_eq!(g.constant_value(folded), Some(&ConstValue::Int32(2)));

        let empty = constant(&mut g, ConstValue::String("".into()));
        let not = g.new_not(empty);
        let folded = g.fold(not, false);
        assert_eq!(g.constant_value(folded), Some(&ConstValue::Boolean(true)));
    }

    #[test]
    fn test_type_of_folds_known_types() {
        let mut g = MirGraph::default();
        let x = g.new_parameter(0, None);
        let num = g.new_type_of(x, MirType::Double);
        let folded = g.fold(num, false);
        assert_eq!(
            g.constant_value(folded),
            Some(&ConstValue::String("number".into()))
        );

        let obj = g.new_type_of(x, MirType::Object);
        assert_eq!(g.fold(obj, false), obj);
        assert!(g.is_effectful(obj));
        assert!(!g.is_effectful(num));
    }

    #[test]
    fn test_to_int32_negative_zero_backward() {
        let mut g = MirGraph::default();
        let x = g.new_parameter(0, None);
        let to_int = g.new_to_int32(x);
        let _ = g.new_to_string(to_int);
        g.analyze_range_backward(to_int);
        assert_eq!(
            g.def(to_int).kind(),
            &InstructionKind::ToInt32 {
                can_be_negative_zero: false
            }
        );
    }
}
