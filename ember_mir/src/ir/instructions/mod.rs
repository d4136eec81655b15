//! The instruction catalog.
//!
//! Every MIR instruction is a variant of [`InstructionKind`]. The variant
//! carries the per-kind attributes (specialization, slot index, shape
//! handle, ...); operands live in the owning [`Definition`] so the graph
//! can keep use chains exact.
//!
//! # Capabilities
//!
//! Per-kind behavior is reached through a handful of hooks on
//! [`MirGraph`], each a `match` that delegates to the family module:
//!
//! - **`alias_set`**: memory footprint, `Store(Any)` unless overridden
//! - **`fold`**: constant folding and algebraic simplification
//! - **`congruent_to` / `value_hash`**: value-numbering equivalence
//! - **`analyze_range_*` / `analyze_truncate_backward`**: numeric edge cases
//! - **`type_policy`**: input conversions inserted before lowering
//!
//! # Families
//!
//! - [`constants`]: start, OSR, constants, parameters, callee
//! - [`control`]: goto, test, return, throw, table switch
//! - [`call`]: prepare-call, pass-arg, call
//! - [`arith`]: add, sub, mul, div, mod, abs, sqrt, floor, round
//! - [`bitwise`]: bitnot, and, or, xor, shifts
//! - [`convert`]: compare, box/unbox, numeric and string conversions
//! - [`memory`]: slots, elements, typed arrays
//! - [`guard`]: bounds checks, shape and class guards, type barriers
//! - [`object`]: allocation, property caches, calls into the VM, iterators
//! - [`phi`]: phis

pub mod arith;
pub mod bitwise;
pub mod call;
pub mod constants;
pub mod control;
pub mod convert;
pub mod guard;
pub mod memory;
pub mod object;
pub mod phi;

pub use arith::ArithInfo;
pub use bitwise::BitwiseInfo;
pub use constants::{StartType, THIS_SLOT};
pub use control::TableSwitchInfo;
pub use convert::{CompareOp, UnboxMode};
pub use memory::{PopShiftMode, TypedArrayKind};

use super::alias::{AliasFlags, AliasSet};
use super::block::BlockId;
use super::graph::MirGraph;
use super::node::{DefId, Definition, LoweringSlot};
use super::opcode::Opcode;
use super::oracle::TypeSet;
use super::policy::TypePolicy;
use super::types::MirType;
use super::value::{Atom, ConstValue, HeapRef};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Hash used by value numbering.
pub type HashNumber = u32;

/// How lowering reports a failed speculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BailoutKind {
    /// Resume in the interpreter at the enclosing resume point.
    Normal,
    /// Also record the observed type so the type set can be widened.
    TypeBarrier,
}

// =============================================================================
// Instruction Kind
// =============================================================================

/// Every MIR instruction kind with its attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    Start(StartType),
    OsrEntry,
    Constant(ConstValue),
    Parameter { index: i32, types: Option<TypeSet> },
    Callee,

    TableSwitch(TableSwitchInfo),
    Goto { target: [BlockId; 1] },
    /// `targets[0]` is taken when the input is truthy.
    Test { targets: [BlockId; 2] },
    Return,
    Throw,

    NewArray { count: u32, template: HeapRef, allocating: bool },
    NewObject { template: HeapRef },
    InitProp { name: Atom },
    PrepareCall,
    PassArg { argnum: Option<u32> },
    Call { construct: bool, bytecode_argc: u32, target: Option<HeapRef> },
    Compare { op: CompareOp, specialization: MirType },
    Box,
    Unbox { mode: UnboxMode },
    GuardObject,
    CreateThis { template: Option<HeapRef> },

    ToDouble,
    ToInt32 { can_be_negative_zero: bool },
    TruncateToInt32,
    ToString,
    BitNot { specialization: MirType },
    TypeOf { input_type: MirType },
    ToId,

    BitAnd(BitwiseInfo),
    BitOr(BitwiseInfo),
    BitXor(BitwiseInfo),
    Lsh(BitwiseInfo),
    Rsh(BitwiseInfo),
    Ursh(BitwiseInfo),

    Abs { specialization: MirType },
    Sqrt,
    Add(ArithInfo),
    Sub(ArithInfo),
    Mul(ArithInfo),
    Div(ArithInfo),
    Mod(ArithInfo),

    Concat,
    CharCodeAt,
    FromCharCode,

    Phi { slot: u32, specialized: bool },
    OsrValue { frame_offset: i32 },
    OsrScopeChain,

    CheckOverRecursed,
    RecompileCheck,
    InterruptCheck,

    DefVar { name: Atom, attrs: u32 },
    RegExp { source: HeapRef, must_clone: bool },
    Lambda { function: HeapRef },
    ImplicitThis,

    Slots,
    Elements,
    InitializedLength,
    SetInitializedLength,
    ArrayLength,
    TypedArrayLength,
    TypedArrayElements,
    Not,

    BoundsCheck { minimum: i32, maximum: i32 },
    BoundsCheckLower { minimum: i32, fallible: bool },

    LoadElement { needs_hole_check: bool },
    LoadElementHole { needs_hole_check: bool },
    StoreElement { needs_barrier: bool },
    StoreElementHole { needs_barrier: bool },
    ArrayPopShift { mode: PopShiftMode, needs_hole_check: bool, maybe_undefined: bool },
    ArrayPush,
    LoadTypedArrayElement { array_type: TypedArrayKind },
    LoadTypedArrayElementHole { array_type: TypedArrayKind, allow_double: bool },
    StoreTypedArrayElement { array_type: TypedArrayKind },
    ClampToUint8,

    LoadFixedSlot { slot: u32 },
    StoreFixedSlot { slot: u32, needs_barrier: bool },
    GetPropertyCache { name: Atom, idempotent: bool, allow_get_set: bool },
    GetElementCache { monitored_result: bool },
    BindNameCache { name: Atom, pc: u32 },
    GuardShape { shape: HeapRef, bailout_kind: BailoutKind },
    GuardClass { class: HeapRef },
    LoadSlot { slot: u32 },
    FunctionEnvironment,
    StoreSlot { slot: u32, needs_barrier: bool },

    CallGetName { name: Atom },
    CallGetNameTypeOf { name: Atom },
    CallSetProperty { name: Atom, strict: bool },
    SetPropertyCache { name: Atom, strict: bool },
    DeleteProperty { name: Atom },
    CallGetProperty { name: Atom, effectful: bool },
    CallGetElement,
    CallSetElement,

    StringLength,
    Floor,
    Round,

    IteratorStart { flags: u8 },
    IteratorNext,
    IteratorMore,
    IteratorEnd,

    TypeBarrier { types: TypeSet, bailout_kind: BailoutKind },
    MonitorTypes { types: TypeSet },
}

impl InstructionKind {
    /// The opcode tag of this kind.
    pub fn opcode(&self) -> Opcode {
        use InstructionKind as K;
        match self {
            K::Start(_) => Opcode::Start,
            K::OsrEntry => Opcode::OsrEntry,
            K::Constant(_) => Opcode::Constant,
            K::Parameter { .. } => Opcode::Parameter,
            K::Callee => Opcode::Callee,
            K::TableSwitch(_) => Opcode::TableSwitch,
            K::Goto { .. } => Opcode::Goto,
            K::Test { .. } => Opcode::Test,
            K::Return => Opcode::Return,
            K::Throw => Opcode::Throw,
            K::NewArray { .. } => Opcode::NewArray,
            K::NewObject { .. } => Opcode::NewObject,
            K::InitProp { .. } => Opcode::InitProp,
            K::PrepareCall => Opcode::PrepareCall,
            K::PassArg { .. } => Opcode::PassArg,
            K::Call { .. } => Opcode::Call,
            K::Compare { .. } => Opcode::Compare,
            K::Box => Opcode::Box,
            K::Unbox { .. } => Opcode::Unbox,
            K::GuardObject => Opcode::GuardObject,
            K::CreateThis { .. } => Opcode::CreateThis,
            K::ToDouble => Opcode::ToDouble,
            K::ToInt32 { .. } => Opcode::ToInt32,
            K::TruncateToInt32 => Opcode::TruncateToInt32,
            K::ToString => Opcode::ToString,
            K::BitNot { .. } => Opcode::BitNot,
            K::TypeOf { .. } => Opcode::TypeOf,
            K::ToId => Opcode::ToId,
            K::BitAnd(_) => Opcode::BitAnd,
            K::BitOr(_) => Opcode::BitOr,
            K::BitXor(_) => Opcode::BitXor,
            K::Lsh(_) => Opcode::Lsh,
            K::Rsh(_) => Opcode::Rsh,
            K::Ursh(_) => Opcode::Ursh,
            K::Abs { .. } => Opcode::Abs,
            K::Sqrt => Opcode::Sqrt,
            K::Add(_) => Opcode::Add,
            K::Sub(_) => Opcode::Sub,
            K::Mul(_) => Opcode::Mul,
            K::Div(_) => Opcode::Div,
            K::Mod(_) => Opcode::Mod,
            K::Concat => Opcode::Concat,
            K::CharCodeAt => Opcode::CharCodeAt,
            K::FromCharCode => Opcode::FromCharCode,
            K::Phi { .. } => Opcode::Phi,
            K::OsrValue { .. } => Opcode::OsrValue,
            K::OsrScopeChain => Opcode::OsrScopeChain,
            K::CheckOverRecursed => Opcode::CheckOverRecursed,
            K::RecompileCheck => Opcode::RecompileCheck,
            K::InterruptCheck => Opcode::InterruptCheck,
            K::DefVar { .. } => Opcode::DefVar,
            K::RegExp { .. } => Opcode::RegExp,
            K::Lambda { .. } => Opcode::Lambda,
            K::ImplicitThis => Opcode::ImplicitThis,
            K::Slots => Opcode::Slots,
            K::Elements => Opcode::Elements,
            K::InitializedLength => Opcode::InitializedLength,
            K::SetInitializedLength => Opcode::SetInitializedLength,
            K::ArrayLength => Opcode::ArrayLength,
            K::TypedArrayLength => Opcode::TypedArrayLength,
            K::TypedArrayElements => Opcode::TypedArrayElements,
            K::Not => Opcode::Not,
            K::BoundsCheck { .. } => Opcode::BoundsCheck,
            K::BoundsCheckLower { .. } => Opcode::BoundsCheckLower,
            K::LoadElement { .. } => Opcode::LoadElement,
            K::LoadElementHole { .. } => Opcode::LoadElementHole,
            K::StoreElement { .. } => Opcode::StoreElement,
            K::StoreElementHole { .. } => Opcode::StoreElementHole,
            K::ArrayPopShift { .. } => Opcode::ArrayPopShift,
            K::ArrayPush => Opcode::ArrayPush,
            K::LoadTypedArrayElement { .. } => Opcode::LoadTypedArrayElement,
            K::LoadTypedArrayElementHole { .. } => Opcode::LoadTypedArrayElementHole,
            K::StoreTypedArrayElement { .. } => Opcode::StoreTypedArrayElement,
            K::ClampToUint8 => Opcode::ClampToUint8,
            K::LoadFixedSlot { .. } => Opcode::LoadFixedSlot,
            K::StoreFixedSlot { .. } => Opcode::StoreFixedSlot,
            K::GetPropertyCache { .. } => Opcode::GetPropertyCache,
            K::GetElementCache { .. } => Opcode::GetElementCache,
            K::BindNameCache { .. } => Opcode::BindNameCache,
            K::GuardShape { .. } => Opcode::GuardShape,
            K::GuardClass { .. } => Opcode::GuardClass,
            K::LoadSlot { .. } => Opcode::LoadSlot,
            K::FunctionEnvironment => Opcode::FunctionEnvironment,
            K::StoreSlot { .. } => Opcode::StoreSlot,
            K::CallGetName { .. } => Opcode::CallGetName,
            K::CallGetNameTypeOf { .. } => Opcode::CallGetNameTypeOf,
            K::CallSetProperty { .. } => Opcode::CallSetProperty,
            K::SetPropertyCache { .. } => Opcode::SetPropertyCache,
            K::DeleteProperty { .. } => Opcode::DeleteProperty,
            K::CallGetProperty { .. } => Opcode::CallGetProperty,
            K::CallGetElement => Opcode::CallGetElement,
            K::CallSetElement => Opcode::CallSetElement,
            K::StringLength => Opcode::StringLength,
            K::Floor => Opcode::Floor,
            K::Round => Opcode::Round,
            K::IteratorStart { .. } => Opcode::IteratorStart,
            K::IteratorNext => Opcode::IteratorNext,
            K::IteratorMore => Opcode::IteratorMore,
            K::IteratorEnd => Opcode::IteratorEnd,
            K::TypeBarrier { .. } => Opcode::TypeBarrier,
            K::MonitorTypes { .. } => Opcode::MonitorTypes,
        }
    }

    /// Block terminators.
    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            InstructionKind::TableSwitch(_)
                | InstructionKind::Goto { .. }
                | InstructionKind::Test { .. }
                | InstructionKind::Return
                | InstructionKind::Throw
        )
    }

    /// Successor blocks of a control instruction; empty for everything else.
    pub fn successors(&self) -> &[BlockId] {
        match self {
            InstructionKind::Goto { target } => target,
            InstructionKind::Test { targets } => targets,
            InstructionKind::TableSwitch(info) => info.successors(),
            _ => &[],
        }
    }

    /// The constant payload, for `Constant`.
    #[inline]
    pub fn as_constant(&self) -> Option<&ConstValue> {
        match self {
            InstructionKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// Attributes that must match for two instructions of the same opcode
    /// to compute the same value. Analysis-refined flags are ignored.
    fn congruent_attributes(&self, other: &InstructionKind) -> bool {
        use InstructionKind as K;
        match (self, other) {
            (K::Add(a), K::Add(b))
            | (K::Sub(a), K::Sub(b))
            | (K::Mul(a), K::Mul(b))
            | (K::Div(a), K::Div(b))
            | (K::Mod(a), K::Mod(b)) => a.specialization == b.specialization,
            (K::BitAnd(a), K::BitAnd(b))
            | (K::BitOr(a), K::BitOr(b))
            | (K::BitXor(a), K::BitXor(b))
            | (K::Lsh(a), K::Lsh(b))
            | (K::Rsh(a), K::Rsh(b))
            | (K::Ursh(a), K::Ursh(b)) => a.specialization == b.specialization,
            (K::ToInt32 { .. }, K::ToInt32 { .. }) => true,
            (K::Phi { .. }, K::Phi { .. }) => true,
            (K::Parameter { index: a, .. }, K::Parameter { index: b, .. }) => a == b,
            (
                K::GetPropertyCache { name: a, idempotent: ia, .. },
                K::GetPropertyCache { name: b, idempotent: ib, .. },
            ) => *ia && *ib && a == b,
            (K::CallGetProperty { name: a, .. }, K::CallGetProperty { name: b, .. }) => a == b,
            (K::BoundsCheckLower { minimum: a, .. }, K::BoundsCheckLower { minimum: b, .. }) => {
                a == b
            }
            (K::GuardShape { shape: a, .. }, K::GuardShape { shape: b, .. }) => a == b,
            _ => self == other,
        }
    }

    /// Kinds whose every execution produces a distinct value or must
    /// happen once per occurrence.
    fn never_congruent(&self) -> bool {
        matches!(
            self,
            InstructionKind::Start(_)
                | InstructionKind::OsrEntry
                | InstructionKind::NewArray { .. }
                | InstructionKind::NewObject { .. }
                | InstructionKind::CreateThis { .. }
                | InstructionKind::RegExp { .. }
                | InstructionKind::Lambda { .. }
                | InstructionKind::PrepareCall
                | InstructionKind::PassArg { .. }
                | InstructionKind::Call { .. }
                | InstructionKind::CheckOverRecursed
                | InstructionKind::RecompileCheck
                | InstructionKind::InterruptCheck
                | InstructionKind::TypeBarrier { .. }
                | InstructionKind::MonitorTypes { .. }
        )
    }
}

// =============================================================================
// Hashing helpers
// =============================================================================

const GOLDEN_RATIO_U32: u32 = 0x9E37_79B9;

/// Mix `value` into `hash`.
#[inline]
pub fn add_u32_to_hash(hash: HashNumber, value: u32) -> HashNumber {
    GOLDEN_RATIO_U32.wrapping_mul(hash.rotate_left(5) ^ value)
}

fn hash_of<T: Hash>(value: &T) -> HashNumber {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

// =============================================================================
// Capability hooks
// =============================================================================

impl MirGraph {
    /// Memory footprint of `def`.
    pub fn alias_set(&self, def: DefId) -> AliasSet {
        use InstructionKind as K;
        let d = self.def(def);
        match d.kind() {
            K::Add(info) | K::Sub(info) | K::Mul(info) | K::Div(info) | K::Mod(info) => {
                arith::alias_set(info.specialization)
            }
            K::BitAnd(info)
            | K::BitOr(info)
            | K::BitXor(info)
            | K::Lsh(info)
            | K::Rsh(info)
            | K::Ursh(info) => bitwise::alias_set(info.specialization),
            K::BitNot { specialization } => bitwise::alias_set(*specialization),
            K::Compare { specialization, .. } => convert::compare_alias_set(*specialization),
            K::TypeOf { input_type } => convert::type_of_alias_set(*input_type),
            K::Constant(_)
            | K::Parameter { .. }
            | K::Callee
            | K::Goto { .. }
            | K::Test { .. }
            | K::Return
            | K::Throw
            | K::PrepareCall
            | K::PassArg { .. }
            | K::CreateThis { .. }
            | K::NewArray { .. }
            | K::Box
            | K::Unbox { .. }
            | K::GuardObject
            | K::ToDouble
            | K::ToInt32 { .. }
            | K::TruncateToInt32
            | K::ToString
            | K::Abs { .. }
            | K::Sqrt
            | K::Floor
            | K::Round
            | K::Concat
            | K::FromCharCode
            | K::Phi { .. }
            | K::OsrValue { .. }
            | K::OsrScopeChain
            | K::RecompileCheck
            | K::InterruptCheck
            | K::RegExp { .. }
            | K::ImplicitThis
            | K::TypedArrayLength
            | K::Not
            | K::BoundsCheck { .. }
            | K::BoundsCheckLower { .. }
            | K::ClampToUint8
            | K::FunctionEnvironment
            | K::TypeBarrier { .. }
            | K::MonitorTypes { .. } => AliasSet::none(),
            K::CharCodeAt
            | K::StringLength
            | K::TypedArrayElements
            | K::Slots
            | K::Elements
            | K::InitializedLength
            | K::ArrayLength
            | K::GuardShape { .. }
            | K::GuardClass { .. } => AliasSet::load(AliasFlags::OBJECT_FIELDS),
            K::SetInitializedLength => AliasSet::store(AliasFlags::OBJECT_FIELDS),
            K::LoadElement { .. } | K::LoadElementHole { .. } => {
                AliasSet::load(AliasFlags::ELEMENT)
            }
            K::StoreElement { .. } => AliasSet::store(AliasFlags::ELEMENT),
            K::StoreElementHole { .. } | K::ArrayPopShift { .. } | K::ArrayPush => {
                AliasSet::store(AliasFlags::ELEMENT | AliasFlags::OBJECT_FIELDS)
            }
            K::LoadTypedArrayElement { .. } => AliasSet::load(AliasFlags::TYPED_ARRAY_ELEMENT),
            K::StoreTypedArrayElement { .. } => {
                AliasSet::store(AliasFlags::TYPED_ARRAY_ELEMENT)
            }
            K::LoadFixedSlot { .. } => AliasSet::load(AliasFlags::SLOT),
            K::StoreFixedSlot { .. } | K::StoreSlot { .. } => AliasSet::store(AliasFlags::SLOT),
            K::LoadSlot { .. } => memory::load_slot_alias_set(self, def),
            K::GetPropertyCache { idempotent: true, .. } => {
                AliasSet::load(AliasFlags::OBJECT_FIELDS | AliasFlags::SLOT)
            }
            K::CallGetProperty { effectful: false, .. } => AliasSet::none(),
            _ => AliasSet::default(),
        }
    }

    /// Whether `def` may write memory.
    #[inline]
    pub fn is_effectful(&self, def: DefId) -> bool {
        self.alias_set(def).is_store()
    }

    /// Simplify `def`. Returns `def` itself when nothing applies, otherwise
    /// a replacement (possibly a new, detached constant) that the caller
    /// substitutes with `replace_all_uses_with`.
    pub fn fold(&mut self, def: DefId, use_value_numbers: bool) -> DefId {
        match self.def(def).opcode() {
            Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::BitXor
            | Opcode::Lsh
            | Opcode::Rsh
            | Opcode::Ursh => bitwise::fold_binary(self, def, use_value_numbers),
            Opcode::BitNot => bitwise::fold_bit_not(self, def),
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                arith::fold_binary(self, def, use_value_numbers)
            }
            Opcode::Test => control::fold_test(self, def),
            Opcode::Compare => convert::fold_compare(self, def),
            Opcode::ToDouble
            | Opcode::ToInt32
            | Opcode::TruncateToInt32
            | Opcode::ToString
            | Opcode::TypeOf
            | Opcode::Not
            | Opcode::ClampToUint8 => convert::fold_conversion(self, def),
            Opcode::Phi => phi::fold_phi(self, def, use_value_numbers),
            _ => def,
        }
    }

    /// Value-numbering hash of `def`.
    pub fn value_hash(&self, def: DefId) -> HashNumber {
        let d = self.def(def);
        let op = d.opcode() as u32;
        let mut hash = match d.kind() {
            InstructionKind::Constant(value) => hash_of(value),
            _ if d.num_operands() == 2 => {
                // Symmetric in the operands, so commuted pairs collide.
                op ^ self.operand_vn(d, 0) ^ self.operand_vn(d, 1)
            }
            _ => {
                let mut out = op;
                for i in 0..d.num_operands() {
                    out = self
                        .operand_vn(d, i)
                        .wrapping_add(out << 6)
                        .wrapping_add(out << 16)
                        .wrapping_sub(out);
                }
                out
            }
        };
        match d.kind() {
            InstructionKind::BoundsCheck { minimum, maximum } => {
                hash = add_u32_to_hash(hash, *minimum as u32);
                hash = add_u32_to_hash(hash, *maximum as u32);
            }
            InstructionKind::LoadFixedSlot { slot } | InstructionKind::LoadSlot { slot } => {
                hash = add_u32_to_hash(hash, *slot);
            }
            InstructionKind::GuardShape { shape, .. } => {
                hash = add_u32_to_hash(hash, shape.0 as u32);
            }
            _ => {}
        }
        hash
    }

    fn operand_vn(&self, d: &Definition, index: usize) -> u32 {
        let op = d.get_operand(index);
        if op.is_valid() {
            self.def(op).value_number_or_id()
        } else {
            u32::MAX
        }
    }

    /// Whether `a` and `b` compute the same value.
    ///
    /// Requires the same opcode, result type and attributes, no memory
    /// writes on either side, loads that alias analysis has visited with
    /// equal dependencies, and operands with equal value numbers. Operands
    /// of commutative binary instructions are compared after ordering each
    /// pair by value number.
    pub fn congruent_to(&self, a: DefId, b: DefId) -> bool {
        let (da, db) = (self.def(a), self.def(b));
        if da.opcode() != db.opcode() || da.result_type() != db.result_type() {
            return false;
        }
        if da.kind().never_congruent() || !da.kind().congruent_attributes(db.kind()) {
            return false;
        }
        if da.is_phi() && da.block() != db.block() {
            return false;
        }
        let (sa, sb) = (self.alias_set(a), self.alias_set(b));
        if sa.is_store() || sb.is_store() {
            return false;
        }
        if sa.is_load() || sb.is_load() {
            if !self.alias_analyzed() || !same_dependency(da, db) {
                return false;
            }
        }
        if da.num_operands() != db.num_operands() {
            return false;
        }
        if da.num_operands() == 2 && da.is_commutative() {
            let ordered = |d: &Definition| {
                let (l, r) = (self.operand_vn(d, 0), self.operand_vn(d, 1));
                if l > r { (r, l) } else { (l, r) }
            };
            return ordered(da) == ordered(db);
        }
        (0..da.num_operands()).all(|i| self.operand_vn(da, i) == self.operand_vn(db, i))
    }

    /// Whether `a` and `b` are the same value: equal value numbers when
    /// they are in use, otherwise the same definition.
    pub fn equal_values(&self, use_value_numbers: bool, a: DefId, b: DefId) -> bool {
        if a == b {
            return true;
        }
        use_value_numbers && {
            let (va, vb) = (self.def(a).value_number(), self.def(b).value_number());
            va.is_some() && va == vb
        }
    }

    /// Constant payload of `def`, if it is a constant.
    #[inline]
    pub fn constant_value(&self, def: DefId) -> Option<&ConstValue> {
        self.def(def).kind().as_constant()
    }

    /// Whether `def` is the constant `value`.
    pub fn is_constant(&self, def: DefId, value: &ConstValue) -> bool {
        self.constant_value(def).is_some_and(|v| v == value)
    }

    /// Forward numeric edge-case refinement.
    pub fn analyze_range_forward(&mut self, def: DefId) {
        match self.def(def).opcode() {
            Opcode::Mul => arith::mul_range_forward(self, def),
            Opcode::Div => arith::div_range_forward(self, def),
            _ => {}
        }
    }

    /// Backward refinement: drop negative-zero checks no use can observe.
    pub fn analyze_range_backward(&mut self, def: DefId) {
        match self.def(def).opcode() {
            Opcode::Mul | Opcode::Div | Opcode::ToInt32 => arith::negative_zero_backward(self, def),
            _ => {}
        }
    }

    /// Backward truncation: mark add/sub as truncated when every use
    /// truncates anyway.
    pub fn analyze_truncate_backward(&mut self, def: DefId) {
        match self.def(def).opcode() {
            Opcode::Add | Opcode::Sub => arith::truncate_backward(self, def),
            _ => {}
        }
    }

    /// Input-conversion policy of `def`.
    pub fn type_policy(&self, def: DefId) -> Option<TypePolicy> {
        TypePolicy::for_kind(self.def(def).kind())
    }

    /// Whether lowering must emit a bailout path for `def`.
    pub fn is_fallible(&self, def: DefId) -> bool {
        use InstructionKind as K;
        let d = self.def(def);
        match d.kind() {
            K::Add(info) | K::Sub(info) | K::Mul(info) | K::Div(info) | K::Mod(info) => {
                arith::fallible(d.opcode(), info)
            }
            K::Ursh(_) => bitwise::ursh_can_overflow(self, def),
            K::Unbox { mode } => mode.is_fallible(),
            K::ToInt32 { .. } | K::TruncateToInt32 | K::ToDouble => {
                convert::conversion_fallible(d.opcode(), self.result_type(d.get_operand(0)))
            }
            K::BoundsCheckLower { fallible, .. } => *fallible,
            K::LoadElement { needs_hole_check } | K::LoadElementHole { needs_hole_check } => {
                *needs_hole_check
            }
            K::ArrayPopShift {
                needs_hole_check, ..
            } => *needs_hole_check,
            K::LoadTypedArrayElement { array_type } => {
                *array_type == TypedArrayKind::Uint32 && d.result_type() == MirType::Int32
            }
            K::LoadTypedArrayElementHole {
                array_type,
                allow_double,
            } => *array_type == TypedArrayKind::Uint32 && !*allow_double,
            K::Floor | K::Round => true,
            _ => d.is_guard(),
        }
    }

    /// Bailout kind lowering attaches to a fallible `def`.
    pub fn bailout_kind(&self, def: DefId) -> BailoutKind {
        match self.def(def).kind() {
            InstructionKind::Unbox { mode } => mode.bailout_kind(),
            InstructionKind::GuardShape { bailout_kind, .. }
            | InstructionKind::TypeBarrier { bailout_kind, .. } => *bailout_kind,
            _ => BailoutKind::Normal,
        }
    }
}

fn same_dependency(a: &Definition, b: &Definition) -> bool {
    match (a.lowering_slot(), b.lowering_slot()) {
        (LoweringSlot::Dependency(x), LoweringSlot::Dependency(y)) => x == y,
        _ => false,
    }
}
