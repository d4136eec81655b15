//! Definitions, use records and node references.
//!
//! A [`Definition`] is an SSA value. It owns its use chain: one [`Use`]
//! per operand slot, anywhere in the graph, that currently holds it. A
//! `Use` names the consuming node (a definition or a resume point) and the
//! slot index. The graph keeps the two sides in bijection; nothing outside
//! [`MirGraph`](super::graph::MirGraph) writes operand storage directly.

use super::arena::Id;
use super::block::BlockId;
use super::instructions::InstructionKind;
use super::opcode::Opcode;
use super::resume::ResumePointId;
use super::types::MirType;
use smallvec::SmallVec;
use std::fmt;

/// Identifier of a definition in the graph arena.
pub type DefId = Id<Definition>;

/// Operand storage. Arity up to four stays inline.
pub type OperandList = SmallVec<[DefId; 4]>;

/// Identity class assigned by value numbering.
pub type ValueNumber = u32;

// =============================================================================
// Node references and uses
// =============================================================================

/// A node that can hold operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Def(DefId),
    ResumePoint(ResumePointId),
}

impl NodeRef {
    #[inline]
    pub fn as_def(self) -> Option<DefId> {
        match self {
            NodeRef::Def(def) => Some(def),
            NodeRef::ResumePoint(_) => None,
        }
    }

    #[inline]
    pub fn is_resume_point(self) -> bool {
        matches!(self, NodeRef::ResumePoint(_))
    }
}

/// One reader of a definition: operand slot `index` of `node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub node: NodeRef,
    pub index: u32,
}

impl Use {
    #[inline]
    pub fn new(node: NodeRef, index: usize) -> Self {
        Use {
            node,
            index: index as u32,
        }
    }
}

// =============================================================================
// Flags
// =============================================================================

bitflags::bitflags! {
    /// Accumulating per-definition flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DefFlags: u16 {
        const IN_WORKLIST = 1 << 0;
        const EMITTED_AT_USES = 1 << 1;
        const LOOP_INVARIANT = 1 << 2;
        const COMMUTATIVE = 1 << 3;
        const MOVABLE = 1 << 4;
        const LOWERED = 1 << 5;
        const GUARD = 1 << 6;
        const UNUSED = 1 << 7;
    }
}

/// Generates `is_x`, `set_x`, `set_not_x` and their unchecked variants.
///
/// `set_x` requires the flag to be clear and `set_not_x` requires it to be
/// set. A pass that flips a flag twice has lost track of the graph.
macro_rules! def_flag_accessors {
    ($($flag:ident: $is:ident, $set:ident, $unset:ident, $set_unchecked:ident, $unset_unchecked:ident;)*) => {
        $(
            #[inline]
            pub fn $is(&self) -> bool {
                self.flags.contains(DefFlags::$flag)
            }

            #[inline]
            pub fn $set(&mut self) {
                debug_assert!(
                    !self.flags.contains(DefFlags::$flag),
                    concat!("flag ", stringify!($flag), " already set")
                );
                self.flags.insert(DefFlags::$flag);
            }

            #[inline]
            pub fn $unset(&mut self) {
                debug_assert!(
                    self.flags.contains(DefFlags::$flag),
                    concat!("flag ", stringify!($flag), " not set")
                );
                self.flags.remove(DefFlags::$flag);
            }

            #[inline]
            pub fn $set_unchecked(&mut self) {
                self.flags.insert(DefFlags::$flag);
            }

            #[inline]
            pub fn $unset_unchecked(&mut self) {
                self.flags.remove(DefFlags::$flag);
            }
        )*
    };
}

// =============================================================================
// Lowering slot
// =============================================================================

/// Storage shared by the alias-analysis dependency and the register id
/// lowering assigns. Exactly one is meaningful at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoweringSlot {
    /// Last instruction this one must stay ordered after, if any.
    Dependency(Option<DefId>),
    /// Virtual register assigned by lowering.
    VirtualRegister(u32),
}

// =============================================================================
// Definition
// =============================================================================

/// An SSA value: an instruction in a block's stream, or a phi.
#[derive(Clone)]
pub struct Definition {
    pub(crate) id: u32,
    pub(crate) value_number: Option<ValueNumber>,
    pub(crate) result_type: MirType,
    pub(crate) flags: DefFlags,
    pub(crate) lowering: LoweringSlot,
    pub(crate) tracked_pc: Option<u32>,
    pub(crate) block: Option<BlockId>,
    pub(crate) prev: Option<DefId>,
    pub(crate) next: Option<DefId>,
    pub(crate) resume_point: Option<ResumePointId>,
    pub(crate) operands: OperandList,
    pub(crate) uses: Vec<Use>,
    pub(crate) discarded: bool,
    pub(crate) kind: InstructionKind,
}

impl Definition {
    pub(crate) fn new(id: u32, kind: InstructionKind, result_type: MirType) -> Self {
        Definition {
            id,
            value_number: None,
            result_type,
            flags: DefFlags::empty(),
            lowering: LoweringSlot::Dependency(None),
            tracked_pc: None,
            block: None,
            prev: None,
            next: None,
            resume_point: None,
            operands: OperandList::new(),
            uses: Vec::new(),
            discarded: false,
            kind,
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Program-order id. Reassigned by `MirGraph::renumber_definitions`.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.kind.opcode()
    }

    #[inline]
    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    #[inline]
    pub fn kind_mut(&mut self) -> &mut InstructionKind {
        &mut self.kind
    }

    #[inline]
    pub fn result_type(&self) -> MirType {
        self.result_type
    }

    #[inline]
    pub fn set_result_type(&mut self, ty: MirType) {
        self.result_type = ty;
    }

    #[inline]
    pub fn value_number(&self) -> Option<ValueNumber> {
        self.value_number
    }

    /// Value number, falling back to the id for unnumbered definitions.
    #[inline]
    pub fn value_number_or_id(&self) -> ValueNumber {
        self.value_number.unwrap_or(self.id)
    }

    #[inline]
    pub fn set_value_number(&mut self, vn: ValueNumber) {
        self.value_number = Some(vn);
    }

    #[inline]
    pub fn clear_value_number(&mut self) {
        self.value_number = None;
    }

    #[inline]
    pub fn tracked_pc(&self) -> Option<u32> {
        self.tracked_pc
    }

    #[inline]
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    #[inline]
    pub fn resume_point(&self) -> Option<ResumePointId> {
        self.resume_point
    }

    #[inline]
    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    #[inline]
    pub fn is_phi(&self) -> bool {
        self.opcode() == Opcode::Phi
    }

    #[inline]
    pub fn is_control_instruction(&self) -> bool {
        self.kind.is_control()
    }

    // =========================================================================
    // Flags
    // =========================================================================

    #[inline]
    pub fn flags(&self) -> DefFlags {
        self.flags
    }

    def_flag_accessors! {
        IN_WORKLIST: is_in_worklist, set_in_worklist, set_not_in_worklist,
            set_in_worklist_unchecked, set_not_in_worklist_unchecked;
        EMITTED_AT_USES: is_emitted_at_uses, set_emitted_at_uses, set_not_emitted_at_uses,
            set_emitted_at_uses_unchecked, set_not_emitted_at_uses_unchecked;
        LOOP_INVARIANT: is_loop_invariant, set_loop_invariant, set_not_loop_invariant,
            set_loop_invariant_unchecked, set_not_loop_invariant_unchecked;
        COMMUTATIVE: is_commutative, set_commutative, set_not_commutative,
            set_commutative_unchecked, set_not_commutative_unchecked;
        MOVABLE: is_movable, set_movable, set_not_movable,
            set_movable_unchecked, set_not_movable_unchecked;
        LOWERED: is_lowered, set_lowered, set_not_lowered,
            set_lowered_unchecked, set_not_lowered_unchecked;
        GUARD: is_guard, set_guard, set_not_guard,
            set_guard_unchecked, set_not_guard_unchecked;
        UNUSED: is_unused, set_unused, set_not_unused,
            set_unused_unchecked, set_not_unused_unchecked;
    }

    // =========================================================================
    // Lowering slot
    // =========================================================================

    /// The alias-analysis dependency. Must not be read once a virtual
    /// register has been assigned.
    #[inline]
    pub fn dependency(&self) -> Option<DefId> {
        match self.lowering {
            LoweringSlot::Dependency(dep) => dep,
            LoweringSlot::VirtualRegister(_) => {
                debug_assert!(false, "dependency read after register assignment");
                None
            }
        }
    }

    #[inline]
    pub fn set_dependency(&mut self, dep: Option<DefId>) {
        debug_assert!(
            matches!(self.lowering, LoweringSlot::Dependency(_)),
            "dependency written after register assignment"
        );
        self.lowering = LoweringSlot::Dependency(dep);
    }

    /// The virtual register assigned by lowering, if any.
    #[inline]
    pub fn virtual_register(&self) -> Option<u32> {
        match self.lowering {
            LoweringSlot::VirtualRegister(vreg) => Some(vreg),
            LoweringSlot::Dependency(_) => None,
        }
    }

    #[inline]
    pub fn lowering_slot(&self) -> LoweringSlot {
        self.lowering
    }

    /// Switch the slot to its register form. The dependency is gone after
    /// this.
    #[inline]
    pub fn set_virtual_register(&mut self, vreg: u32) {
        self.lowering = LoweringSlot::VirtualRegister(vreg);
    }

    // =========================================================================
    // Operands and uses
    // =========================================================================

    #[inline]
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    /// Operand `index`. Slots not yet initialized read as `DefId::INVALID`.
    #[inline]
    pub fn get_operand(&self, index: usize) -> DefId {
        self.operands[index]
    }

    #[inline]
    pub fn operands(&self) -> &[DefId] {
        &self.operands
    }

    #[inline]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    #[inline]
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    #[inline]
    pub fn has_uses(&self) -> bool {
        !self.uses.is_empty()
    }

    #[inline]
    pub fn has_one_use(&self) -> bool {
        self.uses.len() == 1
    }

    /// Uses by other definitions, skipping resume points.
    pub fn def_uses(&self) -> impl Iterator<Item = (DefId, usize)> + '_ {
        self.uses
            .iter()
            .filter_map(|u| u.node.as_def().map(|def| (def, u.index as usize)))
    }

    /// Whether any resume point observes this value.
    pub fn has_resume_point_use(&self) -> bool {
        self.uses.iter().any(|u| u.node.is_resume_point())
    }

    /// Raw slot write. Callers keep the use chains in sync.
    #[inline]
    pub(crate) fn set_operand(&mut self, index: usize, def: DefId) {
        self.operands[index] = def;
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.opcode().name().to_ascii_lowercase(), self.id)?;
        write!(f, " : {}", self.result_type)?;
        if !self.operands.is_empty() {
            f.write_str(" (")?;
            for (i, op) in self.operands.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", op)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}
