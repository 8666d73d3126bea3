//! Two-trip neighbors (spec section 4.3.2): move or swap gifts across a
//! source and destination trip, preserving the capacity invariant.
//!
//! Grounded on `original_source/neighbors/two-trip-neighbors.py`'s
//! `SwapGiftsAcrossTripsNeighbor` (`_find_best_insertion_index`,
//! `_cost_to_remove_gift`, `_get_valid_swappee`) for the exact
//! insertion/removal/capacity-feasibility arithmetic.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::cost::remove_at_index_cost;
use crate::geo::DistanceCache;
use crate::model::{Gift, Partition, Stop, Trip, WEIGHT_LIMIT};

use super::{best_insert_index, best_insert_index_excluding, exclude_around, pick_trip_index};

/// Geographic candidate filter (spec section 4.3.2, Move-gift-to-optimal-
/// trip): widen the longitude tolerance around `gift`'s longitude until
/// at least one capacity-feasible destination trip is found.
pub(crate) fn candidate_trips_by_longitude(partition: &Partition, exclude: usize, gift: Gift) -> Vec<usize> {
    const TOLERANCE_STEPS_DEG: [f64; 6] = [5.0, 15.0, 30.0, 60.0, 120.0, 360.0];

    for &tolerance in &TOLERANCE_STEPS_DEG {
        let candidates: Vec<usize> = partition
            .trips
            .iter()
            .enumerate()
            .filter(|(idx, trip)| {
                *idx != exclude
                    && trip.total_weight() + gift.weight < WEIGHT_LIMIT
                    && trip_longitude_range_overlaps(trip, gift.lon, tolerance)
            })
            .map(|(idx, _)| idx)
            .collect();
        if !candidates.is_empty() {
            return candidates;
        }
    }

    partition
        .trips
        .iter()
        .enumerate()
        .filter(|(idx, trip)| *idx != exclude && trip.total_weight() + gift.weight < WEIGHT_LIMIT)
        .map(|(idx, _)| idx)
        .collect()
}

fn trip_longitude_range_overlaps(trip: &Trip, lon: f64, tolerance: f64) -> bool {
    let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
    for stop in &trip.stops {
        min_lon = min_lon.min(stop.lon);
        max_lon = max_lon.max(stop.lon);
    }
    lon >= min_lon - tolerance && lon <= max_lon + tolerance
}

fn pick_valid_destination<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
    exclude: usize,
    gift_weight: f64,
) -> Option<usize> {
    let is_valid = |idx: usize| idx != exclude && partition.trips[idx].total_weight() + gift_weight < WEIGHT_LIMIT;
    for _ in 0..super::MAX_SELECTION_ATTEMPTS {
        let idx = rng.gen_range(0..partition.trips.len());
        if is_valid(idx) {
            return Some(idx);
        }
    }
    (0..partition.trips.len()).find(|&idx| is_valid(idx))
}

/// Move a randomly chosen stop to a uniformly-random capacity-feasible
/// destination trip (spec section 4.3.2 "move-gift-to-another-trip").
pub struct MoveToAnotherTrip {
    src_idx: usize,
    stop_idx: usize,
    dest_idx: Option<usize>,
    insert_idx: Option<usize>,
    delta: Option<f64>,
}

impl MoveToAnotherTrip {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let src_idx = pick_trip_index(partition, rng, |t| t.len() >= 2)?;
        let stop_idx = rng.gen_range(0..partition.trips[src_idx].len());
        let gift_weight = partition.trips[src_idx].stops[stop_idx].weight;
        let dest_idx = pick_valid_destination(partition, rng, src_idx, gift_weight);
        Some(Self { src_idx, stop_idx, dest_idx, insert_idx: None, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }
        let Some(dest_idx) = self.dest_idx else {
            self.delta = Some(0.0);
            return 0.0;
        };

        let src_trip = &partition.trips[self.src_idx].stops;
        let remove_cost = remove_at_index_cost(src_trip, self.stop_idx, cache);
        let gift = src_trip[self.stop_idx].as_gift();

        let dest_trip = &partition.trips[dest_idx].stops;
        let delta = match best_insert_index(dest_trip, gift, cache) {
            Some((insert_idx, insert_cost)) => {
                self.insert_idx = Some(insert_idx);
                remove_cost + insert_cost
            }
            None => 0.0,
        };
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        let (Some(dest_idx), Some(insert_idx)) = (self.dest_idx, self.insert_idx) else {
            return;
        };
        let mut stop = partition.trips[self.src_idx].stops.remove(self.stop_idx);
        stop.trip_id = partition.trips[dest_idx].id;
        partition.trips[dest_idx].stops.insert(insert_idx, stop);
    }
}

/// Move a randomly chosen stop to the geographically closest
/// capacity-feasible destination trip (spec section 4.3.2
/// "move-gift-to-optimal-trip").
pub struct MoveToOptimalTrip {
    src_idx: usize,
    stop_idx: usize,
    dest_idx: Option<usize>,
    insert_idx: Option<usize>,
    delta: Option<f64>,
}

impl MoveToOptimalTrip {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let src_idx = pick_trip_index(partition, rng, |t| t.len() >= 2)?;
        let stop_idx = rng.gen_range(0..partition.trips[src_idx].len());
        Some(Self { src_idx, stop_idx, dest_idx: None, insert_idx: None, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }

        let src_trip = &partition.trips[self.src_idx].stops;
        let gift = src_trip[self.stop_idx].as_gift();
        let remove_cost = remove_at_index_cost(src_trip, self.stop_idx, cache);

        let candidates = candidate_trips_by_longitude(partition, self.src_idx, gift);
        let mut best: Option<(usize, usize, f64)> = None;
        for dest_idx in candidates {
            let dest_trip = &partition.trips[dest_idx].stops;
            if let Some((insert_idx, cost)) = best_insert_index(dest_trip, gift, cache) {
                if best.as_ref().map_or(true, |&(_, _, b)| cost < b) {
                    best = Some((dest_idx, insert_idx, cost));
                }
            }
        }

        let delta = match best {
            Some((dest_idx, insert_idx, cost)) => {
                self.dest_idx = Some(dest_idx);
                self.insert_idx = Some(insert_idx);
                remove_cost + cost
            }
            None => 0.0,
        };
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        let (Some(dest_idx), Some(insert_idx)) = (self.dest_idx, self.insert_idx) else {
            return;
        };
        let mut stop = partition.trips[self.src_idx].stops.remove(self.stop_idx);
        stop.trip_id = partition.trips[dest_idx].id;
        partition.trips[dest_idx].stops.insert(insert_idx, stop);
    }
}

fn valid_swap_partner<R: Rng + ?Sized>(
    partition: &Partition,
    rng: &mut R,
    second_idx: usize,
    first_weight: f64,
    first_total: f64,
) -> Option<usize> {
    let second_trip = &partition.trips[second_idx];
    let second_total = second_trip.total_weight();
    let mut indices: Vec<usize> = (0..second_trip.len()).collect();
    indices.shuffle(rng);
    indices.into_iter().find(|&j| {
        let w = second_trip.stops[j].weight;
        first_total - first_weight + w < WEIGHT_LIMIT && second_total - w + first_weight < WEIGHT_LIMIT
    })
}

/// Exchange one stop each between two distinct trips of length >= 3,
/// chosen so the exchange keeps both within capacity (spec section
/// 4.3.2 "swap-gifts-across-trips").
pub struct SwapAcrossTrips {
    first_idx: usize,
    first_stop_idx: usize,
    second_idx: usize,
    second_stop_idx: usize,
    first_insert_idx: Option<usize>,
    second_insert_idx: Option<usize>,
    delta: Option<f64>,
}

impl SwapAcrossTrips {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let first_idx = pick_trip_index(partition, rng, |t| t.len() >= 3)?;
        let first_stop_idx = rng.gen_range(0..partition.trips[first_idx].len());
        let first_weight = partition.trips[first_idx].stops[first_stop_idx].weight;
        let first_total = partition.trips[first_idx].total_weight();

        let mut order: Vec<usize> = (0..partition.trips.len())
            .filter(|&idx| idx != first_idx && partition.trips[idx].len() >= 3)
            .collect();
        order.shuffle(rng);

        for second_idx in order {
            if let Some(second_stop_idx) = valid_swap_partner(partition, rng, second_idx, first_weight, first_total) {
                return Some(Self {
                    first_idx,
                    first_stop_idx,
                    second_idx,
                    second_stop_idx,
                    first_insert_idx: None,
                    second_insert_idx: None,
                    delta: None,
                });
            }
        }
        None
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }

        let first_trip = &partition.trips[self.first_idx].stops;
        let second_trip = &partition.trips[self.second_idx].stops;
        let first_gift = first_trip[self.first_stop_idx].as_gift();
        let second_gift = second_trip[self.second_stop_idx].as_gift();

        let exclude_first = exclude_around(self.first_stop_idx);
        let (first_insert_idx, cost_to_insert_first) =
            match best_insert_index_excluding(first_trip, second_gift, cache, &exclude_first) {
                Some(x) => x,
                None => {
                    self.delta = Some(0.0);
                    return 0.0;
                }
            };
        let exclude_second = exclude_around(self.second_stop_idx);
        let (second_insert_idx, cost_to_insert_second) =
            match best_insert_index_excluding(second_trip, first_gift, cache, &exclude_second) {
                Some(x) => x,
                None => {
                    self.delta = Some(0.0);
                    return 0.0;
                }
            };

        let mut temp_first: Vec<Stop> = first_trip.to_vec();
        temp_first.insert(first_insert_idx, Stop::from_gift(second_gift, partition.trips[self.first_idx].id));
        let mut temp_second: Vec<Stop> = second_trip.to_vec();
        temp_second.insert(second_insert_idx, Stop::from_gift(first_gift, partition.trips[self.second_idx].id));

        let remove_idx_first = if self.first_stop_idx < first_insert_idx {
            self.first_stop_idx
        } else {
            self.first_stop_idx + 1
        };
        let remove_idx_second = if self.second_stop_idx < second_insert_idx {
            self.second_stop_idx
        } else {
            self.second_stop_idx + 1
        };

        let cost_to_remove_first = remove_at_index_cost(&temp_first, remove_idx_first, cache);
        let cost_to_remove_second = remove_at_index_cost(&temp_second, remove_idx_second, cache);

        self.first_insert_idx = Some(first_insert_idx);
        self.second_insert_idx = Some(second_insert_idx);

        let delta = cost_to_insert_first + cost_to_insert_second + cost_to_remove_first + cost_to_remove_second;
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        let (Some(first_insert_idx), Some(second_insert_idx)) = (self.first_insert_idx, self.second_insert_idx)
        else {
            return;
        };

        let first_trip_id = partition.trips[self.first_idx].id;
        let second_trip_id = partition.trips[self.second_idx].id;

        let mut first_gift_row = partition.trips[self.first_idx].stops[self.first_stop_idx];
        first_gift_row.trip_id = second_trip_id;
        let mut second_gift_row = partition.trips[self.second_idx].stops[self.second_stop_idx];
        second_gift_row.trip_id = first_trip_id;

        partition.trips[self.first_idx].stops.insert(first_insert_idx, second_gift_row);
        let remove_idx_first = if self.first_stop_idx < first_insert_idx {
            self.first_stop_idx
        } else {
            self.first_stop_idx + 1
        };
        partition.trips[self.first_idx].stops.remove(remove_idx_first);

        partition.trips[self.second_idx].stops.insert(second_insert_idx, first_gift_row);
        let remove_idx_second = if self.second_stop_idx < second_insert_idx {
            self.second_stop_idx
        } else {
            self.second_stop_idx + 1
        };
        partition.trips[self.second_idx].stops.remove(remove_idx_second);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GiftId, TripId};
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
    fn move_to_another_trip_rejects_when_no_destination_fits() {
        // spec section 8, scenario 4 variant: destination trip is full.
        let partition = Partition::new(vec![
            trip_with(1, &[(1, 0.0, 0.0, 900.0)]),
            trip_with(2, &[(2, 0.0, 10.0, 200.0), (3, 0.0, 11.0, 5.0)]),
        ]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = MoveToAnotherTrip {
            src_idx: 1,
            stop_idx: 0,
            dest_idx: Some(0),
            insert_idx: None,
            delta: None,
        };
        let delta = neighbor.cost_delta(&partition, &mut cache);
        assert_eq!(delta, 0.0);
        assert!(neighbor.insert_idx.is_none());
    }

    #[test]
    fn move_to_another_trip_matches_recomputation_when_feasible() {
        let partition = Partition::new(vec![
            trip_with(1, &[(1, 0.0, 0.0, 100.0)]),
            trip_with(2, &[(2, 0.0, 10.0, 50.0), (3, 0.0, 11.0, 5.0)]),
        ]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = MoveToAnotherTrip {
            src_idx: 1,
            stop_idx: 0,
            dest_idx: Some(0),
            insert_idx: None,
            delta: None,
        };
        let delta = neighbor.cost_delta(&partition, &mut cache);

        let mut after = partition.clone();
        neighbor.apply(&mut after);
        let before_cost: f64 = partition
            .trips
            .iter()
            .map(|t| crate::cost::trip_cost(&t.stops, &mut cache))
            .sum();
        let after_cost: f64 = after
            .trips
            .iter()
            .map(|t| crate::cost::trip_cost(&t.stops, &mut cache))
            .sum();
        assert_relative_eq!(after_cost - before_cost, delta, epsilon = 1e-6);
        assert!(after.trips[1].stops.iter().all(|s| s.trip_id == after.trips[1].id));
    }

    #[test]
    fn swap_across_trips_is_idempotent() {
        let partition = Partition::new(vec![
            trip_with(1, &[(1, 0.0, 0.0, 10.0), (2, 5.0, 5.0, 20.0), (3, 10.0, 10.0, 5.0)]),
            trip_with(4, &[(4, -5.0, -5.0, 10.0), (5, -10.0, -10.0, 15.0), (6, -15.0, -15.0, 8.0)]),
        ]);
        let mut cache = DistanceCache::new(256);
        let mut neighbor = SwapAcrossTrips::select(&partition, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let d1 = neighbor.cost_delta(&partition, &mut cache);
        let d2 = neighbor.cost_delta(&partition, &mut cache);
        assert_eq!(d1, d2);
    }
}
