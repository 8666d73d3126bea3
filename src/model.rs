//! Trip store: the data model neighbor operators read and mutate.
//!
//! Mirrors the column layout of `original_source/utils.py`
//! (`GIFT, TRIP, LAT, LON, WEIGHT`), but as named struct fields rather
//! than positional numpy columns.

use serde::{Deserialize, Serialize};

use crate::geo::Point;

pub type GiftId = u64;
pub type TripId = u32;

/// Global gift-weight capacity per trip (spec section 6).
pub const WEIGHT_LIMIT: f64 = 1000.0;
/// Constant tare weight carried on every segment of every trip.
pub const SLEIGH_WEIGHT: f64 = 10.0;
/// Fixed start/end point of every trip.
pub const NORTH_POLE: Point = Point { lat: 90.0, lon: 0.0 };

/// Immutable gift attributes, as loaded from the gift catalog CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gift {
    pub id: GiftId,
    pub lat: f64,
    pub lon: f64,
    pub weight: f64,
}

impl Gift {
    pub fn location(&self) -> Point {
        Point {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// Lookup table of immutable gift attributes, indexed by `GiftId`.
#[derive(Debug, Clone, Default)]
pub struct GiftCatalog {
    by_id: std::collections::HashMap<GiftId, Gift>,
}

impl GiftCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gift: Gift) {
        self.by_id.insert(gift.id, gift);
    }

    pub fn get(&self, id: GiftId) -> Option<Gift> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = GiftId> + '_ {
        self.by_id.keys().copied()
    }
}

/// A gift placed at a specific position within a specific trip.
///
/// Stops carry the gift's immutable attributes inline (rather than a
/// reference into `GiftCatalog`) so that neighbor operators can slice and
/// mutate trips without lifetime entanglement with the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub gift_id: GiftId,
    pub trip_id: TripId,
    pub lat: f64,
    pub lon: f64,
    pub weight: f64,
}

impl Stop {
    pub fn from_gift(gift: Gift, trip_id: TripId) -> Self {
        Self {
            gift_id: gift.id,
            trip_id,
            lat: gift.lat,
            lon: gift.lon,
            weight: gift.weight,
        }
    }

    pub fn location(&self) -> Point {
        Point {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// Recovers the immutable gift attributes carried by this stop.
    pub fn as_gift(&self) -> Gift {
        Gift {
            id: self.gift_id,
            lat: self.lat,
            lon: self.lon,
            weight: self.weight,
        }
    }
}

/// An ordered sequence of stops, all sharing one trip id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub stops: Vec<Stop>,
}

impl Trip {
    pub fn new(id: TripId) -> Self {
        Self {
            id,
            stops: Vec::new(),
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.stops.iter().map(|s| s.weight).sum()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Reassigns `trip_id` on every stop to `self.id`. Call after any
    /// mutation that may have carried stops in from another trip.
    pub fn reassign_stops(&mut self) {
        for stop in &mut self.stops {
            stop.trip_id = self.id;
        }
    }
}

/// An ordered collection of trips covering the full gift universe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Partition {
    pub trips: Vec<Trip>,
    next_trip_id: TripId,
}

impl Partition {
    pub fn new(trips: Vec<Trip>) -> Self {
        let next_trip_id = trips.iter().map(|t| t.id).max().map_or(1, |m| m + 1);
        Self { trips, next_trip_id }
    }

    /// Allocates a fresh trip id, as `new-trip-neighbors.py` does with
    /// `np.max(existing_trips) + 1`, but maintained incrementally rather
    /// than rescanned on every split.
    pub fn allocate_trip_id(&mut self) -> TripId {
        let id = self.next_trip_id;
        self.next_trip_id += 1;
        id
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn total_gifts(&self) -> usize {
        self.trips.iter().map(|t| t.len()).sum()
    }

    /// Removes the trip at `index`, compacting the trip list. Callers must
    /// ensure the trip is already empty or its stops have been redistributed.
    pub fn drop_trip(&mut self, index: usize) -> Trip {
        self.trips.remove(index)
    }

    pub fn append_trip(&mut self, trip: Trip) {
        self.trips.push(trip);
    }

    pub fn index_of_trip(&self, trip_id: TripId) -> Option<usize> {
        self.trips.iter().position(|t| t.id == trip_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift(id: GiftId, lat: f64, lon: f64, weight: f64) -> Gift {
        Gift { id, lat, lon, weight }
    }

    #[test]
    fn allocate_trip_id_continues_past_existing_max() {
        let trips = vec![Trip::new(3), Trip::new(7), Trip::new(5)];
        let mut partition = Partition::new(trips);
        assert_eq!(partition.allocate_trip_id(), 8);
        assert_eq!(partition.allocate_trip_id(), 9);
    }

    #[test]
    fn allocate_trip_id_starts_at_one_when_empty() {
        let mut partition = Partition::new(vec![]);
        assert_eq!(partition.allocate_trip_id(), 1);
    }

    #[test]
    fn trip_total_weight_sums_stop_weights() {
        let mut trip = Trip::new(1);
        trip.stops.push(Stop::from_gift(gift(1, 0.0, 0.0, 5.0), 1));
        trip.stops.push(Stop::from_gift(gift(2, 1.0, 1.0, 7.5), 1));
        assert_eq!(trip.total_weight(), 12.5);
    }

    #[test]
    fn gift_catalog_roundtrip() {
        let mut catalog = GiftCatalog::new();
        catalog.insert(gift(42, 10.0, 20.0, 3.0));
        let found = catalog.get(42).unwrap();
        assert_eq!(found.lat, 10.0);
        assert!(catalog.get(43).is_none());
    }
}
