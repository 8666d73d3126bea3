//! Partition invariant checks (spec section 4.5): coverage, capacity,
//! trip-id consistency, and (debug-only) cost-delta reconciliation.
//!
//! Grounded on `paiml-rosetta-ruchy/harness/runner/src/statistics.rs`'s
//! pattern of a self-contained checker returning a structured report,
//! reused here as both a library type and, via `main.rs`, a CLI
//! subcommand (spec section 4.5 supplement).

use std::collections::HashSet;

use crate::geo::DistanceCache;
use crate::model::{GiftCatalog, GiftId, Partition, TripId, WEIGHT_LIMIT};

/// One failed invariant, produced by [`Verifier::check_all`].
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    MissingGift(GiftId),
    UnknownGift(GiftId),
    DuplicateGift(GiftId),
    CapacityExceeded { trip_id: TripId, weight: f64 },
    EmptyTrip(TripId),
    TripIdMismatch { gift_id: GiftId, stop_trip_id: TripId, containing_trip_id: TripId },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::MissingGift(id) => write!(f, "gift {id} missing from partition"),
            Violation::UnknownGift(id) => write!(f, "gift {id} not present in catalog"),
            Violation::DuplicateGift(id) => write!(f, "gift {id} appears in more than one trip"),
            Violation::CapacityExceeded { trip_id, weight } => {
                write!(f, "trip {trip_id} weighs {weight:.3}, exceeding the {WEIGHT_LIMIT} limit")
            }
            Violation::EmptyTrip(trip_id) => write!(f, "trip {trip_id} is empty at rest"),
            Violation::TripIdMismatch { gift_id, stop_trip_id, containing_trip_id } => write!(
                f,
                "gift {gift_id} carries trip id {stop_trip_id} but sits in trip {containing_trip_id}"
            ),
        }
    }
}

/// Runs the four invariant checks from spec section 4.5 over a
/// partition. Each check is independently callable; [`check_all`]
/// composes them.
pub struct Verifier;

impl Verifier {
    /// Coverage: the gift-id set present across all trips equals the
    /// universe in `catalog`.
    pub fn check_coverage(partition: &Partition, catalog: &GiftCatalog) -> Vec<Violation> {
        let mut seen: HashSet<GiftId> = HashSet::new();
        let mut violations = Vec::new();

        for trip in &partition.trips {
            for stop in &trip.stops {
                if catalog.get(stop.gift_id).is_none() {
                    violations.push(Violation::UnknownGift(stop.gift_id));
                }
                if !seen.insert(stop.gift_id) {
                    violations.push(Violation::DuplicateGift(stop.gift_id));
                }
            }
        }

        for id in catalog.ids() {
            if !seen.contains(&id) {
                violations.push(Violation::MissingGift(id));
            }
        }
        violations
    }

    /// Capacity: every trip's summed weight is strictly below
    /// `WEIGHT_LIMIT`; a trip must also be non-empty at rest.
    pub fn check_capacity(partition: &Partition) -> Vec<Violation> {
        let mut violations = Vec::new();
        for trip in &partition.trips {
            if trip.is_empty() {
                violations.push(Violation::EmptyTrip(trip.id));
                continue;
            }
            let weight = trip.total_weight();
            if weight >= WEIGHT_LIMIT {
                violations.push(Violation::CapacityExceeded { trip_id: trip.id, weight });
            }
        }
        violations
    }

    /// Trip-id consistency: every stop's `trip_id` field equals the id
    /// of the trip containing it.
    pub fn check_trip_id_consistency(partition: &Partition) -> Vec<Violation> {
        let mut violations = Vec::new();
        for trip in &partition.trips {
            for stop in &trip.stops {
                if stop.trip_id != trip.id {
                    violations.push(Violation::TripIdMismatch {
                        gift_id: stop.gift_id,
                        stop_trip_id: stop.trip_id,
                        containing_trip_id: trip.id,
                    });
                }
            }
        }
        violations
    }

    /// Runs all three structural checks (coverage, capacity,
    /// consistency). Cost-delta reconciliation is a per-move check
    /// performed at the call site (see [`reconcile_cost_delta`]), not
    /// here, since it needs the before/after partitions rather than a
    /// single snapshot.
    pub fn check_all(partition: &Partition, catalog: &GiftCatalog) -> Vec<Violation> {
        let mut violations = Self::check_coverage(partition, catalog);
        violations.extend(Self::check_capacity(partition));
        violations.extend(Self::check_trip_id_consistency(partition));
        violations
    }
}

/// Cost-delta reconciliation (spec section 4.5, item 4): compares a
/// neighbor's reported delta against a full before/after recomputation,
/// within the 0.1 absolute tolerance spec section 8 specifies. Intended
/// for debug builds only (`cfg!(debug_assertions)` at the call site),
/// since it doubles the cost-model work per accepted move.
pub fn reconcile_cost_delta(
    reported: f64,
    before: &Partition,
    after: &Partition,
    cache: &mut DistanceCache,
) -> Result<(), (f64, f64)> {
    let cost_before: f64 = before.trips.iter().map(|t| crate::cost::trip_cost(&t.stops, cache)).sum();
    let cost_after: f64 = after.trips.iter().map(|t| crate::cost::trip_cost(&t.stops, cache)).sum();
    let recomputed = cost_after - cost_before;
    if (recomputed - reported).abs() <= 0.1 {
        Ok(())
    } else {
        Err((reported, recomputed))
    }
}
