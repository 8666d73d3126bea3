//! New-trip neighbors (spec section 4.3.3): split one trip into two,
//! growing the partition's trip count.
//!
//! Grounded on `original_source/neighbors/new-trip-neighbors.py`'s
//! `SplitTripNeighbor`, `SplitTripByHalfLongitudeNeighbor`, and
//! `SplitTripByHalfLatitudeNeighbor`.

use rand::Rng;

use crate::cost::trip_cost;
use crate::geo::DistanceCache;
use crate::model::{Partition, Stop, Trip};

use super::pick_trip_index;

/// Scan every split point of a randomly chosen trip and take the one
/// that minimizes the sum of the two resulting trip costs (spec section
/// 4.3.3 "split at best index").
pub struct SplitAtBestIndex {
    trip_idx: usize,
    best_split: Option<usize>,
    delta: Option<f64>,
}

impl SplitAtBestIndex {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let trip_idx = pick_trip_index(partition, rng, |t| t.len() >= 2)?;
        Some(Self { trip_idx, best_split: None, delta: None })
    }

    pub fn cost_delta(&mut self, partition: &Partition, cache: &mut DistanceCache) -> f64 {
        if let Some(d) = self.delta {
            return d;
        }
        let trip = &partition.trips[self.trip_idx].stops;
        let before = trip_cost(trip, cache);

        let mut best: Option<(usize, f64)> = None;
        for split in 1..trip.len() {
            let cost = trip_cost(&trip[..split], cache) + trip_cost(&trip[split..], cache);
            if best.map_or(true, |(_, b)| cost < b) {
                best = Some((split, cost));
            }
        }

        let delta = match best {
            Some((split, cost)) => {
                self.best_split = Some(split);
                cost - before
            }
            None => 0.0,
        };
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        let Some(split) = self.best_split else { return };
        let new_id = partition.allocate_trip_id();
        let tail: Vec<Stop> = partition.trips[self.trip_idx].stops.split_off(split);
        partition.trips[self.trip_idx].reassign_stops();

        let mut new_trip = Trip::new(new_id);
        new_trip.stops = tail;
        new_trip.reassign_stops();
        partition.append_trip(new_trip);
    }
}

fn sorted_indices_by<F: Fn(usize) -> f64>(n: usize, key: F) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| key(b).partial_cmp(&key(a)).unwrap_or(std::cmp::Ordering::Equal));
    indices
}

/// Split a trip of at least 4 stops along a longitude threshold drawn
/// from the middle third of its stops' longitudes, re-sequencing each
/// half by descending latitude (spec section 4.3.3 "optimal horizontal
/// split").
pub struct OptimalHorizontalSplit {
    trip_idx: usize,
    arrangement: Option<(Vec<Stop>, Vec<Stop>)>,
    delta: Option<f64>,
}

/// Candidate threshold values from the middle third of a sorted
/// coordinate list (spec section 4.3.3: "only consider split
/// [longitudes/latitudes] from the middle third of the trip's sorted
/// [longitudes/latitudes]").
fn middle_third_candidates(sorted: &[f64]) -> &[f64] {
    let n = sorted.len();
    let low = n / 3;
    let high = (2 * n / 3).max(low + 1).min(n);
    &sorted[low..high]
}

impl OptimalHorizontalSplit {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let trip_idx = pick_trip_index(partition, rng, |t| t.len() >= 4)?;
        Some(Self { trip_idx, arrangement: None, delta: None })
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
        let before = trip_cost(trip, cache);

        let mut lons: Vec<f64> = trip.iter().map(|s| s.lon).collect();
        lons.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut best: Option<(f64, Vec<Stop>, Vec<Stop>)> = None;
        for &threshold in middle_third_candidates(&lons) {
            let west: Vec<usize> = (0..trip.len()).filter(|&i| trip[i].lon < threshold).collect();
            let east: Vec<usize> = (0..trip.len()).filter(|&i| trip[i].lon >= threshold).collect();
            if west.is_empty() || east.is_empty() {
                continue;
            }

            let west_order = sorted_indices_by(west.len(), |k| trip[west[k]].lat);
            let east_order = sorted_indices_by(east.len(), |k| trip[east[k]].lat);
            let west_stops: Vec<Stop> = west_order.into_iter().map(|k| trip[west[k]]).collect();
            let east_stops: Vec<Stop> = east_order.into_iter().map(|k| trip[east[k]]).collect();

            let cost = trip_cost(&west_stops, cache) + trip_cost(&east_stops, cache);
            if best.as_ref().map_or(true, |(b, _, _)| cost < *b) {
                best = Some((cost, west_stops, east_stops));
            }
        }

        let Some((after, west_stops, east_stops)) = best else {
            self.delta = Some(0.0);
            return 0.0;
        };
        self.arrangement = Some((west_stops, east_stops));
        let delta = after - before;
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        let Some((first, second)) = &self.arrangement else { return };
        let new_id = partition.allocate_trip_id();
        partition.trips[self.trip_idx].stops = first.clone();
        partition.trips[self.trip_idx].reassign_stops();

        let mut new_trip = Trip::new(new_id);
        new_trip.stops = second.clone();
        new_trip.reassign_stops();
        partition.append_trip(new_trip);
    }
}

/// Split a trip of at least 4 stops along a latitude threshold, the
/// vertical counterpart of [`OptimalHorizontalSplit`], re-sequencing
/// each half by descending longitude (spec section 4.3.3 "optimal
/// vertical split").
pub struct OptimalVerticalSplit {
    trip_idx: usize,
    arrangement: Option<(Vec<Stop>, Vec<Stop>)>,
    delta: Option<f64>,
}

impl OptimalVerticalSplit {
    pub fn select<R: Rng + ?Sized>(partition: &Partition, rng: &mut R) -> Option<Self> {
        let trip_idx = pick_trip_index(partition, rng, |t| t.len() >= 4)?;
        Some(Self { trip_idx, arrangement: None, delta: None })
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
        let before = trip_cost(trip, cache);

        let mut lats: Vec<f64> = trip.iter().map(|s| s.lat).collect();
        lats.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut best: Option<(f64, Vec<Stop>, Vec<Stop>)> = None;
        for &threshold in middle_third_candidates(&lats) {
            let south: Vec<usize> = (0..trip.len()).filter(|&i| trip[i].lat < threshold).collect();
            let north: Vec<usize> = (0..trip.len()).filter(|&i| trip[i].lat >= threshold).collect();
            if south.is_empty() || north.is_empty() {
                continue;
            }

            let south_order = sorted_indices_by(south.len(), |k| trip[south[k]].lon);
            let north_order = sorted_indices_by(north.len(), |k| trip[north[k]].lon);
            let south_stops: Vec<Stop> = south_order.into_iter().map(|k| trip[south[k]]).collect();
            let north_stops: Vec<Stop> = north_order.into_iter().map(|k| trip[north[k]]).collect();

            let cost = trip_cost(&south_stops, cache) + trip_cost(&north_stops, cache);
            if best.as_ref().map_or(true, |(b, _, _)| cost < *b) {
                best = Some((cost, south_stops, north_stops));
            }
        }

        let Some((after, south_stops, north_stops)) = best else {
            self.delta = Some(0.0);
            return 0.0;
        };
        self.arrangement = Some((south_stops, north_stops));
        let delta = after - before;
        self.delta = Some(delta);
        delta
    }

    pub fn apply(&self, partition: &mut Partition) {
        let Some((first, second)) = &self.arrangement else { return };
        let new_id = partition.allocate_trip_id();
        partition.trips[self.trip_idx].stops = first.clone();
        partition.trips[self.trip_idx].reassign_stops();

        let mut new_trip = Trip::new(new_id);
        new_trip.stops = second.clone();
        new_trip.reassign_stops();
        partition.append_trip(new_trip);
    }
}
