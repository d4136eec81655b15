//! MIR configuration.
//!
//! Controls optional bookkeeping on definitions and which optimization
//! passes the pipeline schedules.

/// Configuration for a single MIR compilation.
#[derive(Debug, Clone)]
pub struct MirConfig {
    /// Record the bytecode pc that created each definition.
    pub track_snapshots: bool,

    /// Re-verify the use-chain invariant after every pass that changed the
    /// graph.
    pub verify_use_chains: bool,

    /// Run global value numbering (folding plus congruence).
    pub enable_gvn: bool,

    /// Run alias analysis to compute load dependencies. GVN and LICM
    /// schedule it regardless, since both read those dependencies.
    pub enable_alias_analysis: bool,

    /// Run loop-invariant code motion.
    pub enable_licm: bool,

    /// Run the numeric edge-case and truncation analysis.
    pub enable_range_analysis: bool,

    /// Run dead code elimination.
    pub enable_dce: bool,

    /// Maximum fixed-point iterations for GVN.
    pub max_iterations: usize,
}

impl Default for MirConfig {
    fn default() -> Self {
        Self {
            track_snapshots: cfg!(feature = "track-snapshots"),
            verify_use_chains: cfg!(debug_assertions),
            enable_gvn: true,
            enable_alias_analysis: true,
            enable_licm: true,
            enable_range_analysis: true,
            enable_dce: true,
            max_iterations: 4,
        }
    }
}

impl MirConfig {
    /// Fewest passes, for fast baseline compiles.
    pub fn minimal() -> Self {
        Self {
            enable_alias_analysis: false,
            enable_licm: false,
            enable_range_analysis: false,
            max_iterations: 1,
            ..Default::default()
        }
    }

    /// Every pass enabled, with verification and pc tracking.
    pub fn full() -> Self {
        Self {
            track_snapshots: true,
            verify_use_chains: true,
            max_iterations: 8,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_disables_loop_passes() {
        let config = MirConfig::minimal();
        assert!(config.enable_gvn);
        assert!(config.enable_dce);
        assert!(!config.enable_licm);
        assert!(!config.enable_alias_analysis);
    }

    #[test]
    fn test_full_tracks_snapshots() {
        let config = MirConfig::full();
        assert!(config.track_snapshots);
        assert!(config.verify_use_chains);
    }
}
