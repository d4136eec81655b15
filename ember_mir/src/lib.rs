//! SSA mid-level IR for a method-at-a-time JIT.
//!
//! Typed instructions in basic blocks, with:
//! - Use chains kept in step with every operand slot
//! - Alias sets describing each instruction's memory footprint
//! - Resume points capturing interpreter state for bailouts
//! - Folding, congruence and type-policy hooks per opcode
//! - GVN, alias analysis, LICM, range analysis and DCE passes
pub mod config;
pub mod error;
pub mod ir;
pub mod opt;

pub use config::MirConfig;
pub use error::{MirError, Result};
pub use ir::{BasicBlock, BlockId, BlockKind, DefId, Definition, MirGraph, MirType, Opcode};
pub use opt::{optimize, OptPipeline, OptimizationPass};
