//! Merge neighbor (spec section 4.3.4): a "slow" candidate that
//! dissolves an under-utilized trip into its neighbors.
//!
//! Grounded on `original_source/neighbors/merge-trip-neighbors.py`'s
//! `MergeTripNeighbor`: pick a trip whose weight or length falls below
//! a threshold derived from the partition's own statistics, then place
//! each of its stops into the best-fitting nearby trip, one at a time.
//! Spec section 4.3.4 additionally folds trip *length* into the
//! threshold alongside weight; the retrieved original only looks at
//! weight, so the length leg of the threshold is this crate's concrete
//! realization of the richer spec wording (recorded in the grounding
//! ledger).

use rand::Rng;

use crate::geo::DistanceCache;
use crate::model::Partition;

use super::two_trip::candidate_trips_by_longitude;
use super::{best_insert_index, pick_trip_index};

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Dissolve an under-utilized trip (weight or stop count below the
/// lesser of a fixed floor, the partition's median, and its mean) into
/// its geographically nearest neighbors (spec section 4.3.4).
pub struct MergeIntoAdjacent {
    trip_idx: Option<usize>,
    working: Option<Partition>,
    delta: Option<f64>,
}

const WEIGHT_FLOOR: f64 = 500.0;
const LENGTH_FLOOR: f64 = 5.0;

impl MergeIntoAdjacent {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        if partition.trips.len() < 2 {
            return None;
        }
        let weights: Vec<f64> = partition.trips.iter().map(|t| t.total_weight()).collect();
        let lengths: Vec<f64> = partition.trips.iter().map(|t| t.len() as f64).collect();
        let weight_threshold = WEIGHT_FLOOR.min(median(&weights)).min(mean(&weights));
        let length_threshold = LENGTH_FLOOR.min(median(&lengths)).min(mean(&lengths));

        let trip_idx = pick_trip_index(partition, rng, |t| {
            !t.is_empty() && (t.total_weight() <= weight_threshold || t.len() as f64 <= length_threshold)
        })?;
        Some(Self { trip_idx: Some(trip_idx), working: None, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }
        let Some(trip_idx) = self.trip_idx else {
            self.delta = Some(0.0);
            return 0.0;
        };

        let mut working = partition.clone();
        let mut stops = working.trips[trip_idx].stops.clone();
        stops.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap());

        let mut total_delta = 0.0;
        for stop in stops {
            let gift = stop.as_gift();
            let candidates = candidate_trips_by_longitude(&working, trip_idx, gift);
            let mut best: Option<(usize, usize, f64)> = None;
            for dest_idx in candidates {
                let dest_trip = &working.trips[dest_idx].stops;
                if let Some((insert_idx, cost)) = best_insert_index(dest_trip, gift, cache) {
                    if best.as_ref().map_or(true, |&(_, _, b)| cost < b) {
                        best = Some((dest_idx, insert_idx, cost));
                    }
                }
            }
            let Some((dest_idx, insert_idx, cost)) = best else {
                self.delta = Some(0.0);
                return 0.0;
            };
            let mut placed = stop;
            placed.trip_id = working.trips[dest_idx].id;
            working.trips[dest_idx].stops.insert(insert_idx, placed);
            total_delta += cost;
        }

        let original_cost = crate::cost::trip_cost(&partition.trips[trip_idx].stops, cache);
        total_delta -= original_cost;

        working.drop_trip(trip_idx);
        self.working = Some(working);
        self.delta = Some(total_delta);
        total_delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        if let Some(working) = &self.working {
            *partition = working.clone();
        }
    }
}
