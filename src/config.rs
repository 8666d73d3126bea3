//! SA hyperparameters and cadences, populated from CLI flags.
//!
//! Grounded on `paiml-rosetta-ruchy/harness/runner/src/main.rs`'s
//! `BenchmarkConfig` — a plain struct carrying the knobs a run needs,
//! constructed once at the CLI boundary and threaded down into the
//! engine.

use serde::{Deserialize, Serialize};

use crate::geo::DEFAULT_CACHE_CAPACITY;

/// Hyperparameters and cadences for one annealing run (spec section 4.4,
/// section 6 CLI surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Initial temperature `T0`.
    pub temperature: f64,
    /// Geometric cooling factor `alpha`, applied every `cooling_interval`
    /// iterations.
    pub alpha: f64,
    /// Iterations between temperature multiplications.
    pub cooling_interval: u64,
    /// Iterations between progress log lines (and windowed-stat resets).
    pub log_interval: u64,
    /// Iterations between checkpoint writes.
    pub checkpoint_interval: u64,
    /// Reheat after this many accepted-bad-plus-rejected-bad solutions
    /// (spec section 9 Design Notes: the `% N == 0` bug, fixed here as an
    /// explicit comparison).
    pub reheat_interval: u64,
    /// Total iteration budget for the run.
    pub iterations: u64,
    /// Deterministic RNG seed.
    pub random_seed: u64,
    /// Worker pool size for parallel fast-candidate evaluation (spec
    /// section 5: "typically 2", bounded 2-4).
    pub worker_pool_size: usize,
    /// Fraction of the run (from the start) during which neighbor
    /// selection is biased toward the current least-efficient trip.
    pub bad_trip_focus_fraction: f64,
    /// Capacity of the shared distance cache.
    pub distance_cache_capacity: usize,
    /// Namespaces checkpoint/solution output files.
    pub evaluation_id: String,
    /// Enables the cost-delta reconciliation check after every apply
    /// (spec section 4.5, off by default for speed).
    pub verify_cost_delta: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0e6,
            alpha: 0.9,
            cooling_interval: 100,
            log_interval: 1_000,
            checkpoint_interval: 10_000,
            reheat_interval: 5_000,
            iterations: 10_000,
            random_seed: 0,
            worker_pool_size: 2,
            bad_trip_focus_fraction: 0.1,
            distance_cache_capacity: DEFAULT_CACHE_CAPACITY,
            evaluation_id: "run".to_string(),
            verify_cost_delta: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = RunConfig::default();
        assert_eq!(config.reheat_interval, 5_000);
        assert!(config.worker_pool_size >= 2 && config.worker_pool_size <= 4);
    }
}
