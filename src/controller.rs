//! Simulated-annealing controller (spec section 4.4): the main
//! iteration loop tying the trip store, neighbor family, and distance
//! cache together.
//!
//! Grounded on `paiml-rosetta-ruchy/harness/runner/src/main.rs`'s
//! `BenchmarkRunner` for the shape of a config-driven driver loop with
//! windowed progress logging, and on `original_source`'s annealing
//! driver for the cooling/reheat/bad-trip-focus cadences this loop
//! reproduces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::cost::trip_cost;
use crate::error::SleighError;
use crate::geo::DistanceCache;
use crate::model::Partition;
use crate::neighbors::{fast_candidates, fast_candidates_focused, slow_candidates};
use crate::verifier::{reconcile_cost_delta, Verifier};

/// Per-window counters, reset every `log_interval` iterations (spec
/// section 4.4 "State").
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowStats {
    pub good: u64,
    pub accepted_bad: u64,
    pub rejected_bad: u64,
}

/// Time series accumulated across the whole run, the payload of a
/// checkpoint's metrics bundle (spec section 6). The first four series
/// are sampled once per log-cadence window; `cost_delta_series` records
/// every iteration's chosen delta.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MetricsBundle {
    pub iterations_completed: u64,
    pub log_interval: u64,
    pub temperature_series: Vec<f64>,
    pub good_series: Vec<u64>,
    pub accepted_series: Vec<u64>,
    pub rejected_series: Vec<u64>,
    pub cost_delta_series: Vec<f64>,
}

/// Outcome of a single iteration, for callers that want per-iteration
/// visibility (tests, the checkpoint hook).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationOutcome {
    Good,
    AcceptedBad,
    RejectedBad,
    NoCandidate,
}

/// Drives the annealing run: owns the temperature schedule, the seeded
/// RNG, the worker pool, and the accumulated metrics. The [`Partition`]
/// and [`DistanceCache`] it mutates are supplied by the caller so I/O
/// (loading, checkpointing) stays outside this type.
pub struct Controller {
    config: RunConfig,
    temperature: f64,
    rng: ChaCha8Rng,
    pool: rayon::ThreadPool,
    iteration: u64,
    window: WindowStats,
    metrics: MetricsBundle,
    cancel: Arc<AtomicBool>,
    /// Lifetime accepted-bad/rejected-bad totals, independent of the
    /// windowed counters `self.window` resets every log cadence. The
    /// reheat gate (spec section 9 Design Notes) needs these, not the
    /// windowed counts, or it can never fire once `log_interval` is
    /// smaller than `reheat_interval`.
    accepted_bad_total: u64,
    rejected_bad_total: u64,
}

impl Controller {
    pub fn new(config: RunConfig) -> Self {
        let temperature = config.temperature;
        let log_interval = config.log_interval;
        let rng = ChaCha8Rng::seed_from_u64(config.random_seed);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_pool_size.max(1))
            .build()
            .expect("worker pool size is valid");
        Self {
            config,
            temperature,
            rng,
            pool,
            iteration: 0,
            window: WindowStats::default(),
            metrics: MetricsBundle {
                log_interval,
                ..MetricsBundle::default()
            },
            cancel: Arc::new(AtomicBool::new(false)),
            accepted_bad_total: 0,
            rejected_bad_total: 0,
        }
    }

    /// Shared flag a SIGINT handler can set to request a clean stop at
    /// the next log-cadence boundary (spec section 5 "Cancellation").
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn metrics(&self) -> &MetricsBundle {
        &self.metrics
    }

    /// Runs the structural checks that don't need the gift catalog
    /// (capacity, trip-id consistency) and turns any violation into a
    /// fatal error (spec section 4.4 step 2: "verify invariants; abort
    /// the run if verification fails"). Coverage is skipped here since
    /// it requires the catalog and the controller doesn't hold one.
    fn verify_checkpoint_invariants(partition: &Partition) -> Result<(), SleighError> {
        let mut violations = Verifier::check_capacity(partition);
        violations.extend(Verifier::check_trip_id_consistency(partition));
        if violations.is_empty() {
            Ok(())
        } else {
            let detail = violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ");
            Err(SleighError::InvariantViolation(detail))
        }
    }

    /// Index of the trip with the lowest cost-to-weight ratio, used to
    /// bias neighbor selection during the bad-trip-focus phase (spec
    /// section 4.4 "State"). Returns `None` for an empty partition.
    fn least_efficient_trip(partition: &Partition, cache: &mut DistanceCache) -> Option<usize> {
        partition
            .trips
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(|(idx, t)| {
                let weight = t.total_weight().max(f64::EPSILON);
                (idx, trip_cost(&t.stops, cache) / weight)
            })
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(idx, _)| idx)
    }

    /// Runs the full iteration budget, calling `on_checkpoint` at the
    /// configured cadence (spec section 4.4 main loop, step 2) and
    /// honoring the cancellation flag at log-cadence boundaries (step 1).
    pub fn run(
        &mut self,
        partition: &mut Partition,
        cache: &mut DistanceCache,
        mut on_checkpoint: impl FnMut(&Partition, &MetricsBundle) -> Result<(), SleighError>,
    ) -> Result<(), SleighError> {
        let bad_trip_focus_iterations =
            (self.config.iterations as f64 * self.config.bad_trip_focus_fraction) as u64;

        while self.iteration < self.config.iterations {
            if self.iteration % self.config.log_interval == 0 {
                self.log_progress();
                self.sample_window();
                self.window = WindowStats::default();
                if self.cancel.load(Ordering::Relaxed) {
                    warn!(iteration = self.iteration, "cancellation requested, stopping");
                    // Checkpoint the last-completed state before unwinding
                    // (spec section 7 "User cancellation": clean shutdown,
                    // write a final last-state partition) so a later
                    // `resume` can pick up from exactly here.
                    Self::verify_checkpoint_invariants(partition)?;
                    on_checkpoint(partition, &self.metrics)?;
                    return Err(SleighError::Cancelled);
                }
            }

            if self.iteration > 0 && self.iteration % self.config.checkpoint_interval == 0 {
                Self::verify_checkpoint_invariants(partition)?;
                on_checkpoint(partition, &self.metrics)?;
            }

            if self.iteration > 0 && self.iteration % self.config.cooling_interval == 0 {
                self.temperature *= self.config.alpha;
            }

            let focus_trip = if self.iteration < bad_trip_focus_iterations {
                Self::least_efficient_trip(partition, cache)
            } else {
                None
            };

            let outcome = self.step(partition, cache, focus_trip)?;
            self.record(outcome);
            self.iteration += 1;
            self.metrics.iterations_completed = self.iteration;
        }

        // A final checkpoint at the exact iteration budget, independent of
        // the periodic cadence, so `resume` always has a bundle to load
        // even when the run finishes between two checkpoint boundaries.
        Self::verify_checkpoint_invariants(partition)?;
        on_checkpoint(partition, &self.metrics)?;

        Ok(())
    }

    fn log_progress(&self) {
        info!(
            iteration = self.iteration,
            temperature = self.temperature,
            good = self.window.good,
            accepted_bad = self.window.accepted_bad,
            rejected_bad = self.window.rejected_bad,
            "annealing progress"
        );
    }

    fn sample_window(&mut self) {
        self.metrics.temperature_series.push(self.temperature);
        self.metrics.good_series.push(self.window.good);
        self.metrics.accepted_series.push(self.window.accepted_bad);
        self.metrics.rejected_series.push(self.window.rejected_bad);
    }

    fn record(&mut self, outcome: IterationOutcome) {
        match outcome {
            IterationOutcome::Good => self.window.good += 1,
            IterationOutcome::AcceptedBad => {
                self.window.accepted_bad += 1;
                self.accepted_bad_total += 1;
            }
            IterationOutcome::RejectedBad => {
                self.window.rejected_bad += 1;
                self.rejected_bad_total += 1;
            }
            IterationOutcome::NoCandidate => {}
        }

        // Gated on the lifetime totals, not the windowed counters (which
        // reset every log cadence and would make this unreachable once
        // log_interval < reheat_interval). Reheats partway toward T0
        // rather than resetting outright, matching the source's
        // `(3*T + T0) / 4`.
        let total_bad = self.accepted_bad_total + self.rejected_bad_total;
        if total_bad > 0 && total_bad % self.config.reheat_interval == 0 {
            debug!(iteration = self.iteration, "reheating");
            self.temperature = (3.0 * self.temperature + self.config.temperature) / 4.0;
        }
    }

    /// Evaluates one iteration: builds the fast and slow candidate
    /// sets, resolves the fast winner in parallel, applies Metropolis
    /// acceptance (spec section 4.4 main loop, step 4-6).
    fn step(
        &mut self,
        partition: &mut Partition,
        cache: &mut DistanceCache,
        focus_trip: Option<usize>,
    ) -> Result<IterationOutcome, SleighError> {
        let mut fast = match focus_trip {
            Some(idx) => fast_candidates_focused(partition, &mut self.rng, idx),
            None => fast_candidates(partition, &mut self.rng),
        };
        let mut slow = slow_candidates(partition, &mut self.rng);
        if fast.is_empty() && slow.is_empty() {
            return Ok(IterationOutcome::NoCandidate);
        }

        // Each worker evaluates its candidate's cost_delta against a local
        // read-through cache (spec section 5); the deltas themselves don't
        // depend on which cache computed the underlying distances, only the
        // hit/miss bookkeeping does, so merging the local caches back after
        // the fan-out recovers the full cache benefit without sharing it
        // mutably across threads.
        let cache_capacity = self.config.distance_cache_capacity;
        let results: Vec<(f64, DistanceCache)> = self.pool.install(|| {
            fast.par_iter_mut()
                .map(|n| {
                    let mut local_cache = DistanceCache::new(cache_capacity);
                    let d = n.cost_delta(partition, &mut local_cache);
                    (d, local_cache)
                })
                .collect()
        });

        let mut ranked: Vec<(usize, f64)> = Vec::with_capacity(results.len());
        for (idx, (delta, local_cache)) in results.into_iter().enumerate() {
            cache.merge(local_cache);
            ranked.push((idx, delta));
        }
        ranked.sort_by(|(ia, da), (ib, db)| {
            da.partial_cmp(db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| fast[*ia].kind().cmp(&fast[*ib].kind()))
        });

        let best_fast = ranked.first().copied();

        let best_slow: Option<(usize, f64)> = slow
            .iter_mut()
            .enumerate()
            .map(|(idx, n)| (idx, n.cost_delta(partition, cache)))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let (chosen_delta, chosen_is_slow, chosen_idx) = match (best_fast, best_slow) {
            (Some((_, fd)), Some((si, sd))) if fd >= 0.0 && sd < fd => (sd, true, si),
            (Some((fi, fd)), _) => (fd, false, fi),
            (None, Some((si, sd))) => (sd, true, si),
            (None, None) => return Ok(IterationOutcome::NoCandidate),
        };

        let accept = if chosen_delta < 0.0 {
            true
        } else {
            let p = (-chosen_delta / self.temperature.max(f64::EPSILON)).exp();
            self.rng.gen_bool(p.clamp(0.0, 1.0))
        };

        self.metrics.cost_delta_series.push(chosen_delta);

        if accept {
            let before = self.config.verify_cost_delta.then(|| partition.clone());

            if chosen_is_slow {
                slow[chosen_idx].apply(partition);
            } else {
                fast[chosen_idx].apply(partition);
            }

            if let Some(before) = before {
                let kind = if chosen_is_slow { slow[chosen_idx].kind() } else { fast[chosen_idx].kind() };
                if let Err((reported, recomputed)) = reconcile_cost_delta(chosen_delta, &before, partition, cache) {
                    return Err(SleighError::CostDeltaMismatch {
                        neighbor: format!("{kind:?}"),
                        reported,
                        recomputed,
                    });
                }
            }
        }

        if chosen_delta < 0.0 {
            Ok(IterationOutcome::Good)
        } else if accept {
            Ok(IterationOutcome::AcceptedBad)
        } else {
            Ok(IterationOutcome::RejectedBad)
        }
    }
}
