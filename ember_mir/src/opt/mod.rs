//! Optimization passes over MIR.
//!
//! Passes only rewrite the graph through the use-chain primitives
//! (`replace_all_uses_with`, `replace_operand`, `discard`), so the graph
//! still verifies after each one.
//!
//! # Passes
//!
//! - [`alias_analysis`]: load dependencies on the last aliasing store
//! - [`gvn`]: folding plus dominator-scoped value numbering
//! - [`range`]: negative-zero, overflow and truncation refinement
//! - [`licm`]: hoisting loop-invariant instructions to preheaders
//! - [`dce`]: removal of unused pure instructions and phis
//! - [`policy`]: input conversions before lowering
//! - [`pipeline`]: phase ordering and fixed-point iteration

pub mod alias_analysis;
pub mod dce;
pub mod gvn;
pub mod licm;
pub mod pipeline;
pub mod policy;
pub mod range;

pub use alias_analysis::AliasAnalysis;
pub use dce::Dce;
pub use gvn::Gvn;
pub use licm::Licm;
pub use pipeline::{optimize, OptPipeline, PassPhase, PassStat, PipelineStats};
pub use policy::ApplyTypePolicies;
pub use range::RangeAnalysis;

use crate::error::Result;
use crate::ir::graph::MirGraph;

/// A transformation over a whole graph.
pub trait OptimizationPass {
    /// Short name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Run once. Returns whether the graph changed.
    fn run(&mut self, graph: &mut MirGraph) -> Result<bool>;
}
