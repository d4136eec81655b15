//! Optimization Pipeline.
//!
//! Runs the MIR passes in phases. Each phase repeats its passes until none
//! of them changes the graph or the configured iteration bound is hit.
//!
//! # Pass Phases
//!
//! 1. **Analysis**: alias analysis (load dependencies)
//! 2. **Local**: GVN, range analysis
//! 3. **Loop**: LICM
//! 4. **Cleanup**: DCE
//! 5. **Lowering**: type policies
//!
//! When `verify_use_chains` is set, the graph is verified after every pass
//! that reported a change, and the first failure aborts the pipeline.

use super::alias_analysis::AliasAnalysis;
use super::dce::Dce;
use super::gvn::Gvn;
use super::licm::Licm;
use super::policy::ApplyTypePolicies;
use super::range::RangeAnalysis;
use super::OptimizationPass;
use crate::config::MirConfig;
use crate::error::Result;
use crate::ir::graph::{GraphPhase, MirGraph};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// =============================================================================
// Pass Phase
// =============================================================================

/// Phase of the optimization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassPhase {
    /// Analyses other passes read: load dependencies.
    Analysis,
    /// Redundancy elimination and numeric refinement.
    Local,
    /// Loop optimizations.
    Loop,
    /// Dead code removal.
    Cleanup,
    /// Conversions required before lowering.
    Lowering,
}

impl PassPhase {
    pub const ALL: [PassPhase; 5] = [
        PassPhase::Analysis,
        PassPhase::Local,
        PassPhase::Loop,
        PassPhase::Cleanup,
        PassPhase::Lowering,
    ];
}

// =============================================================================
// Pass Entry
// =============================================================================

struct PassEntry {
    pass: Box<dyn OptimizationPass>,
    phase: PassPhase,
    runs: usize,
    changes: usize,
    time: Duration,
}

impl PassEntry {
    fn new<P: OptimizationPass + 'static>(pass: P, phase: PassPhase) -> Self {
        Self {
            pass: Box::new(pass),
            phase,
            runs: 0,
            changes: 0,
            time: Duration::ZERO,
        }
    }
}

// =============================================================================
// Optimization Pipeline
// =============================================================================

/// The MIR optimization pipeline.
pub struct OptPipeline {
    config: MirConfig,
    passes: Vec<PassEntry>,
    total_iterations: usize,
    total_time: Duration,
}

impl OptPipeline {
    /// Create a pipeline with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MirConfig::default())
    }

    /// Create a pipeline whose passes follow `config`'s switches.
    pub fn with_config(config: MirConfig) -> Self {
        let mut pipeline = Self {
            config,
            passes: Vec::new(),
            total_iterations: 0,
            total_time: Duration::ZERO,
        };
        pipeline.register_default_passes();
        pipeline
    }

    fn register_default_passes(&mut self) {
        let c = &self.config;
        if c.enable_alias_analysis || c.enable_gvn || c.enable_licm {
            self.register(AliasAnalysis::new(), PassPhase::Analysis);
        }

        if self.config.enable_gvn {
            self.register(Gvn::new(), PassPhase::Local);
        }
        if self.config.enable_range_analysis {
            self.register(RangeAnalysis::new(), PassPhase::Local);
        }

        if self.config.enable_licm {
            self.register(Licm::new(), PassPhase::Loop);
        }

        if self.config.enable_dce {
            self.register(Dce::new(), PassPhase::Cleanup);
        }

        self.register(ApplyTypePolicies::new(), PassPhase::Lowering);
    }

    /// Register a custom pass.
    pub fn register<P: OptimizationPass + 'static>(&mut self, pass: P, phase: PassPhase) {
        self.passes.push(PassEntry::new(pass, phase));
    }

    /// Number of registered passes.
    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// Run every phase over `graph`.
    pub fn run(&mut self, graph: &mut MirGraph) -> Result<PipelineStats> {
        let start = Instant::now();
        graph.set_phase(GraphPhase::Optimizing);
        let mut stats = PipelineStats {
            initial_size: graph.live_defs().count(),
            ..Default::default()
        };

        for phase in PassPhase::ALL {
            stats.total_iterations += self.run_phase(graph, phase)?;
            stats.phases_run += 1;
        }

        self.total_iterations = stats.total_iterations;
        self.total_time = start.elapsed();
        stats.total_time = self.total_time;
        stats.final_size = graph.live_defs().count();
        debug!(
            iterations = stats.total_iterations,
            initial = stats.initial_size,
            final_size = stats.final_size,
            "pipeline finished"
        );
        Ok(stats)
    }

    /// Run the passes of `phase` to a fixed point. Returns the number of
    /// rounds.
    fn run_phase(&mut self, graph: &mut MirGraph, phase: PassPhase) -> Result<usize> {
        if !self.passes.iter().any(|entry| entry.phase == phase) {
            return Ok(0);
        }
        let bound = self.config.max_iterations.max(1);
        let mut rounds = 0;
        while rounds < bound {
            rounds += 1;
            let mut round_changed = false;
            for entry in self.passes.iter_mut().filter(|entry| entry.phase == phase) {
                let start = Instant::now();
                let changed = entry.pass.run(graph)?;
                entry.time += start.elapsed();
                entry.runs += 1;
                if changed {
                    entry.changes += 1;
                    round_changed = true;
                    if self.config.verify_use_chains {
                        graph.verify()?;
                    }
                }
                trace!(pass = entry.pass.name(), changed, "pass");
            }
            if !round_changed {
                break;
            }
        }
        debug!(?phase, rounds, "phase");
        Ok(rounds)
    }

    /// Per-pass statistics.
    pub fn pass_stats(&self) -> Vec<PassStat> {
        self.passes
            .iter()
            .map(|e| PassStat {
                name: e.pass.name(),
                phase: e.phase,
                runs: e.runs,
                changes: e.changes,
                time: e.time,
            })
            .collect()
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.total_iterations
    }

    #[inline]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }
}

impl Default for OptPipeline {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Statistics from a single pass.
#[derive(Debug, Clone)]
pub struct PassStat {
    pub name: &'static str,
    pub phase: PassPhase,
    /// Number of times run.
    pub runs: usize,
    /// Number of runs that changed the graph.
    pub changes: usize,
    pub time: Duration,
}

/// Statistics from the entire pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Rounds summed over all phases.
    pub total_iterations: usize,
    pub phases_run: usize,
    pub total_time: Duration,
    /// Live definitions before the run.
    pub initial_size: usize,
    /// Live definitions after the run.
    pub final_size: usize,
}

impl PipelineStats {
    /// Final size over initial size.
    pub fn size_reduction(&self) -> f64 {
        if self.initial_size == 0 {
            1.0
        } else {
            self.final_size as f64 / self.initial_size as f64
        }
    }
}

// =============================================================================
// Quick Optimize Functions
// =============================================================================

/// Optimize with the graph's own configuration.
pub fn optimize(graph: &mut MirGraph) -> Result<PipelineStats> {
    OptPipeline::with_config(graph.config().clone()).run(graph)
}

/// Optimize with every pass enabled.
pub fn optimize_full(graph: &mut MirGraph) -> Result<PipelineStats> {
    OptPipeline::with_config(MirConfig::full()).run(graph)
}

/// Optimize with the minimal pass set.
pub fn optimize_minimal(graph: &mut MirGraph) -> Result<PipelineStats> {
    OptPipeline::with_config(MirConfig::minimal()).run(graph)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;
    use crate::ir::opcode::Opcode;
    use crate::ir::types::MirType;
    use crate::ir::value::ConstValue;

    fn redundant_adds() -> MirGraph {
        let mut g = MirGraph::default();
        let b = g.new_block(BlockKind::Normal, 0, 0);
        let p1 = g.new_parameter(0, None);
        g.append(b, p1);
        let p2 = g.new_parameter(1, None);
        g.append(b, p2);
        let a1 = g.new_add(p1, p2);
        g.specialize_arith(a1, MirType::Int32);
        g.append(b, a1);
        let a2 = g.new_add(p1, p2);
        g.specialize_arith(a2, MirType::Int32);
        g.append(b, a2);
        let dead = g.new_constant(ConstValue::Int32(9));
        g.append(b, dead);
        let sum = g.new_add(a1, a2);
        g.specialize_arith(sum, MirType::Int32);
        g.append(b, sum);
        let ret = g.new_return(sum);
        g.end(b, ret);
        g
    }

    #[test]
    fn test_pass_phase_ordering() {
        assert!(PassPhase::Analysis < PassPhase::Local);
        assert!(PassPhase::Local < PassPhase::Loop);
        assert!(PassPhase::Loop < PassPhase::Cleanup);
        assert!(PassPhase::Cleanup < PassPhase::Lowering);
    }

    #[test]
    fn test_minimal_registers_fewer_passes() {
        let full = OptPipeline::with_config(MirConfig::full());
        let minimal = OptPipeline::with_config(MirConfig::minimal());
        assert_eq!(full.num_passes(), 6);
        // Alias analysis still runs ahead of GVN.
        assert_eq!(minimal.num_passes(), 4);
        let mut bare = MirConfig::minimal();
        bare.enable_gvn = false;
        assert_eq!(OptPipeline::with_config(bare).num_passes(), 2);
    }

    #[test]
    fn test_pipeline_run_empty() {
        let mut graph = MirGraph::default();
        let stats = OptPipeline::new().run(&mut graph).unwrap();
        assert_eq!(stats.phases_run, 5);
        assert_eq!(stats.initial_size, 0);
        assert_eq!(graph.phase(), GraphPhase::Optimizing);
    }

    #[test]
    fn test_pipeline_shrinks_graph() {
        let mut graph = redundant_adds();
        let mut pipeline = OptPipeline::with_config(MirConfig::full());
        let stats = pipeline.run(&mut graph).unwrap();

        assert!(stats.final_size < stats.initial_size);
        assert!(stats.size_reduction() < 1.0);
        let gvn = pipeline
            .pass_stats()
            .into_iter()
            .find(|s| s.name == "gvn")
            .unwrap();
        assert!(gvn.changes >= 1);
        assert!(graph.verify().is_ok());
    }

    #[test]
    fn test_policies_run_last() {
        let mut graph = redundant_adds();
        optimize(&mut graph).unwrap();
        let unboxes = graph
            .live_defs()
            .filter(|&d| graph.def(d).opcode() == Opcode::Unbox)
            .count();
        // One unbox per parameter once the duplicate add is gone.
        assert_eq!(unboxes, 2);
    }

    #[test]
    fn test_optimize_functions() {
        let mut g1 = redundant_adds();
        assert!(optimize_minimal(&mut g1).unwrap().total_iterations >= 1);
        let mut g2 = redundant_adds();
        assert!(optimize_full(&mut g2).unwrap().total_iterations >= 1);
    }

    #[test]
    fn test_pipeline_stats_zero_size() {
        let stats = PipelineStats::default();
        assert_eq!(stats.size_reduction(), 1.0);
    }
}
