//! Mid-level SSA intermediate representation.
//!
//! # Core Components
//!
//! - **Types** (`types.rs`): the MIR type lattice
//! - **Arena** (`arena.rs`): typed ids, side tables and bit sets
//! - **Definition** (`node.rs`): SSA values, use records and flags
//! - **Instructions** (`instructions/`): the opcode catalog and its hooks
//! - **Graph** (`graph.rs`): blocks, instruction streams and use chains
//! - **Resume points** (`resume.rs`): bailout snapshots
//! - **CFG** (`cfg.rs`): reverse postorder, dominators and loops
//! - **Policies** (`policy.rs`): input conversions before lowering
//!
//! # Design Principles
//!
//! - **Arena indices**: nodes refer to each other by id, never by pointer
//! - **Exact use chains**: each value lists the slots that read it
//! - **Closed instruction set**: one enum, per-family hook functions

pub mod alias;
pub mod arena;
pub mod block;
pub mod cfg;
pub mod graph;
pub mod instructions;
pub mod node;
pub mod opcode;
pub mod oracle;
pub mod policy;
pub mod print;
pub mod resume;
pub mod types;
pub mod value;
mod verify;

// Re-export commonly used types
pub use alias::{AliasFlags, AliasSet, NUM_CATEGORIES};
pub use arena::{Arena, BitSet, Id, SecondaryMap};
pub use block::{BasicBlock, BlockId, BlockKind};
pub use cfg::{Cfg, DominatorTree, Loop, LoopAnalysis};
pub use graph::{GraphPhase, InstructionIter, MirGraph};
pub use instructions::{
    BailoutKind, CompareOp, HashNumber, InstructionKind, PopShiftMode, StartType,
    TypedArrayKind, UnboxMode, THIS_SLOT,
};
pub use node::{DefFlags, DefId, Definition, LoweringSlot, NodeRef, Use, ValueNumber};
pub use opcode::{accept, MirVisitor, Opcode};
pub use oracle::{BinaryTypes, TypeOracle, TypeSet, UnaryTypes, UnknownOracle};
pub use policy::{OperandPolicy, TypePolicy};
pub use resume::{FlattenedResumePointIter, ResumeMode, ResumePoint, ResumePointId};
pub use types::MirType;
pub use value::{Atom, ConstValue, HeapRef, MagicKind};
