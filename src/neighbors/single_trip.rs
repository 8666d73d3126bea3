//! Single-trip neighbors (spec section 4.3.1): operate on one trip, so
//! they can never violate the capacity invariant.
//!
//! Grounded on `original_source/neighbors/single-trip-neighbors.py`'s
//! `SwapGiftsInTripNeighbor` (the random- and optimal-swap cost formula)
//! and `original_source/neighbors/two-trip-neighbors.py`'s insertion/
//! removal helpers, reused here via `crate::cost`.

use rand::Rng;

use crate::cost::{remove_at_index_cost, swap_adjacent_delta, tour_of_three};
use crate::geo::DistanceCache;
use crate::model::{Gift, Stop, Partition, NORTH_POLE, SLEIGH_WEIGHT};

use super::{best_insert_index_excluding, pick_trip_index, pick_two_distinct_indices};

/// Closed-form cost delta of swapping positions `i < j` within `trip`
/// (spec section 4.2 swap-adjacent-delta; `original_source/neighbors/
/// single-trip-neighbors.py`'s `SwapGiftsInTripNeighbor.cost_delta`).
fn swap_delta_in_trip(trip: &[Stop], i: usize, j: usize, cache: &mut DistanceCache) -> f64 {
    debug_assert!(i < j && j < trip.len());

    let weight_diff = trip[i].weight - trip[j].weight;
    let cum_weight_before_i: f64 = trip[i..].iter().map(|s| s.weight).sum::<f64>() + SLEIGH_WEIGHT;
    let cum_weight_before_j: f64 = trip[j..].iter().map(|s| s.weight).sum::<f64>() + SLEIGH_WEIGHT;
    let weight_i = trip[i].weight;
    let weight_j = trip[j].weight;

    let before_i = if i > 0 { trip[i - 1].location() } else { NORTH_POLE };
    let before_j = if j > 0 { trip[j - 1].location() } else { NORTH_POLE };
    let at_i = trip[i].location();
    let at_j = trip[j].location();
    let after_i = if i < trip.len() - 1 { trip[i + 1].location() } else { NORTH_POLE };
    let after_j = if j < trip.len() - 1 { trip[j + 1].location() } else { NORTH_POLE };

    if i + 1 == j {
        swap_adjacent_delta(before_i, at_i, at_j, after_j, cum_weight_before_i, weight_i, weight_j, cache)
    } else {
        let old_i = tour_of_three(before_i, at_i, after_i, cum_weight_before_i, weight_i, cache);
        let old_j = tour_of_three(before_j, at_j, after_j, cum_weight_before_j, weight_j, cache);
        let new_j = tour_of_three(before_i, at_j, after_i, cum_weight_before_i, weight_j, cache);
        let new_i = tour_of_three(
            before_j,
            at_i,
            after_j,
            cum_weight_before_j + weight_diff,
            weight_i,
            cache,
        );

        let mut between_distance = 0.0;
        for k in (i + 1)..j.saturating_sub(1) {
            between_distance += cache.distance(trip[k].location(), trip[k + 1].location());
        }
        new_j + new_i - old_j - old_i + between_distance * weight_diff
    }
}

/// Swap two uniformly-random stops within a randomly chosen trip of
/// length >= 2.
pub struct RandomSwap {
    trip_idx: usize,
    i: usize,
    j: usize,
    delta: Option<f64>,
}

impl RandomSwap {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let trip_idx = pick_trip_index(partition, rng, |t| t.len() >= 2)?;
        let (i, j) = pick_two_distinct_indices(rng, partition.trips[trip_idx].len());
        Some(Self { trip_idx, i, j, delta: None })
    }

    /// Anchors selection on `trip_idx` instead of drawing it at random
    /// (spec section 4.4 "bad-trip focus" phase). Returns `None` if
    /// `trip_idx` doesn't satisfy this neighbor's precondition.
    pub fn select_at<R: Rng + ?Sized>(partition: &Partition, rng: &mut R, trip_idx: usize) -> Option<Self> {
        if partition.trips[trip_idx].len() < 2 {
            return None;
        }
        let (i, j) = pick_two_distinct_indices(rng, partition.trips[trip_idx].len());
        Some(Self { trip_idx, i, j, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }
        let trip = &partition.trips[self.trip_idx].stops;
        let delta = swap_delta_in_trip(trip, self.i, self.j, cache);
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        partition.trips[self.trip_idx].stops.swap(self.i, self.j);
    }
}

/// For a chosen stop, find the best partner within its trip to swap
/// with (spec section 4.3.1 "optimal swap for a chosen stop").
pub struct OptimalSwap {
    trip_idx: usize,
    i: usize,
    best_j: Option<usize>,
    delta: Option<f64>,
}

impl OptimalSwap {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let trip_idx = pick_trip_index(partition, rng, |t| t.len() >= 2)?;
        let i = rng.gen_range(0..partition.trips[trip_idx].len());
        Some(Self { trip_idx, i, best_j: None, delta: None })
    }

    /// See [`RandomSwap::select_at`].
    pub fn select_at<R: Rng + ?Sized>(partition: &Partition, rng: &mut R, trip_idx: usize) -> Option<Self> {
        if partition.trips[trip_idx].len() < 2 {
            return None;
        }
        let i = rng.gen_range(0..partition.trips[trip_idx].len());
        Some(Self { trip_idx, i, best_j: None, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }
        let trip = &partition.trips[self.trip_idx].stops;
        let mut best: Option<(usize, f64)> = None;
        for j in 0..trip.len() {
            if j == self.i {
                continue;
            }
            let (lo, hi) = (self.i.min(j), self.i.max(j));
            let delta = swap_delta_in_trip(trip, lo, hi, cache);
            if best.map_or(true, |(_, b)| delta < b) {
                best = Some((j, delta));
            }
        }
        let delta = match best {
            Some((j, delta)) => {
                self.best_j = Some(j);
                delta
            }
            None => 0.0,
        };
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        if let Some(j) = self.best_j {
            partition.trips[self.trip_idx].stops.swap(self.i, j);
        }
    }
}

/// Remove a chosen stop and re-insert it at the best position elsewhere
/// in the same trip (spec section 4.3.1 "optimal move-within-trip").
pub struct OptimalMoveWithinTrip {
    trip_idx: usize,
    i: usize,
    best_insert: Option<usize>,
    delta: Option<f64>,
}

impl OptimalMoveWithinTrip {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let trip_idx = pick_trip_index(partition, rng, |t| t.len() >= 4)?;
        let i = rng.gen_range(0..partition.trips[trip_idx].len());
        Some(Self { trip_idx, i, best_insert: None, delta: None })
    }

    /// See [`RandomSwap::select_at`].
    pub fn select_at<R: Rng + ?Sized>(partition: &Partition, rng: &mut R, trip_idx: usize) -> Option<Self> {
        if partition.trips[trip_idx].len() < 4 {
            return None;
        }
        let i = rng.gen_range(0..partition.trips[trip_idx].len());
        Some(Self { trip_idx, i, best_insert: None, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }
        let trip = &partition.trips[self.trip_idx].stops;
        if trip.len() < 4 {
            self.delta = Some(0.0);
            return 0.0;
        }

        let gift: Gift = trip[self.i].as_gift();
        let remove_cost = remove_at_index_cost(trip, self.i, cache);

        let mut residual: Vec<Stop> = trip.to_vec();
        residual.remove(self.i);

        // The removal gap in `residual` sits at residual index `self.i`
        // (everything from the old `self.i + 1` shifted down by one):
        // re-inserting there reconstitutes the original arrangement, the
        // only true no-op in this scan. Unlike `SwapAcrossTrips`, which
        // excludes around the removal site on the *pre-removal* trip,
        // here the removal has already happened, so only one residual
        // index -- not a pair -- needs excluding.
        let exclude = [self.i];
        let best = best_insert_index_excluding(&residual, gift, cache, &exclude);

        let delta = match best {
            Some((idx, insert_cost)) => {
                self.best_insert = Some(idx);
                remove_cost + insert_cost
            }
            None => 0.0,
        };
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        if let Some(insert_idx) = self.best_insert {
            let trip = &mut partition.trips[self.trip_idx].stops;
            let stop = trip.remove(self.i);
            trip.insert(insert_idx, stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GiftId, Trip, TripId};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn gift(id: GiftId, lat: f64, lon: f64, weight: f64) -> Gift {
        Gift { id, lat, lon, weight }
    }

    fn trip_with(id: TripId, gifts: &[(GiftId, f64, f64, f64)]) -> Trip {
        let mut trip = Trip::new(id);
        for &(gid, lat, lon, w) in gifts {
            trip.stops.push(Stop::from_gift(gift(gid, lat, lon, w), id));
        }
        trip
    }

    #[test]
    fn optimal_swap_for_position_zero_prefers_heavier_cargo_earlier() {
        // spec section 8, end-to-end scenario 3: co-linear longitudes,
        // weights 10/20/30 -- the optimal swap at position 0 should
        // choose position 2.
        let partition = Partition::new(vec![trip_with(
            1,
            &[(1, 0.0, 0.0, 10.0), (2, 0.0, 10.0, 20.0), (3, 0.0, 20.0, 30.0)],
        )]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = OptimalSwap {
            trip_idx: 0,
            i: 0,
            best_j: None,
            delta: None,
        };
        let delta = neighbor.cost_delta(&partition, &mut cache);
        assert_eq!(neighbor.best_j, Some(2));
        assert!(delta < 0.0);

        let mut after = partition.clone();
        neighbor.apply(&mut after);
        let before_cost = crate::cost::trip_cost(&partition.trips[0].stops, &mut cache);
        let after_cost = crate::cost::trip_cost(&after.trips[0].stops, &mut cache);
        assert_relative_eq!(after_cost - before_cost, delta, epsilon = 1e-6);
    }

    #[test]
    fn two_stop_symmetric_swap_has_zero_delta() {
        // spec section 8, scenario 2
        let partition = Partition::new(vec![trip_with(1, &[(1, 0.0, 0.0, 5.0), (2, 0.0, 90.0, 5.0)])]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = RandomSwap {
            trip_idx: 0,
            i: 0,
            j: 1,
            delta: None,
        };
        let delta = neighbor.cost_delta(&partition, &mut cache);
        assert_relative_eq!(delta, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn optimal_move_within_trip_matches_remove_plus_insert() {
        let partition = Partition::new(vec![trip_with(
            1,
            &[
                (1, 10.0, 10.0, 5.0),
                (2, 20.0, 20.0, 7.0),
                (3, 30.0, 30.0, 3.0),
                (4, 5.0, 40.0, 9.0),
            ],
        )]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = OptimalMoveWithinTrip::select(&partition, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        let delta = neighbor.cost_delta(&partition, &mut cache);

        let mut after = partition.clone();
        neighbor.apply(&mut after);
        let before_cost = crate::cost::trip_cost(&partition.trips[0].stops, &mut cache);
        let after_cost = crate::cost::trip_cost(&after.trips[0].stops, &mut cache);
        assert_relative_eq!(after_cost - before_cost, delta, epsilon = 1e-6);
    }

    #[test]
    fn cost_delta_is_idempotent() {
        let partition = Partition::new(vec![trip_with(
            1,
            &[(1, 10.0, 10.0, 5.0), (2, 20.0, 20.0, 7.0), (3, 30.0, 30.0, 3.0)],
        )]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = RandomSwap::select(&partition, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let d1 = neighbor.cost_delta(&partition, &mut cache);
        let d2 = neighbor.cost_delta(&partition, &mut cache);
        assert_eq!(d1, d2);
    }
}
