//! Weighted trip cost and its incremental building blocks.
//!
//! Grounded on `original_source/utils.py` (`weighted_trip_length`),
//! `original_source/neighbor.py` (`get_cost_of_tour_of_three`), and the
//! `_get_cost_of_swapping_adjacent` / `_find_best_insertion_index` /
//! `_cost_to_remove_gift` helpers in `original_source/neighbors/*.py`.

use crate::geo::{DistanceCache, Point};
use crate::model::{Gift, Stop, NORTH_POLE, SLEIGH_WEIGHT};

/// Full weighted-trip-length: `P -> s1 -> ... -> sn -> P`, where each
/// segment is weighted by the cargo still aboard (gifts remaining plus
/// sleigh tare), the tare carried on every segment including the return.
pub fn trip_cost(stops: &[Stop], cache: &mut DistanceCache) -> f64 {
    if stops.is_empty() {
        return 0.0;
    }
    let mut cost = 0.0;
    let mut prev = NORTH_POLE;
    let mut remaining_weight: f64 = stops.iter().map(|s| s.weight).sum::<f64>() + SLEIGH_WEIGHT;
    for stop in stops {
        cost += cache.distance(prev, stop.location()) * remaining_weight;
        remaining_weight -= stop.weight;
        prev = stop.location();
    }
    cost += cache.distance(prev, NORTH_POLE) * remaining_weight;
    cost
}

/// Cost of the path `a -> b -> c`, where `cumulative_weight_at_a` is the
/// cargo aboard while traveling `a -> b` and `weight_at_b` is shed at `b`.
pub fn tour_of_three(
    a: Point,
    b: Point,
    c: Point,
    cumulative_weight_at_a: f64,
    weight_at_b: f64,
    cache: &mut DistanceCache,
) -> f64 {
    cache.distance(a, b) * cumulative_weight_at_a
        + cache.distance(b, c) * (cumulative_weight_at_a - weight_at_b)
}

/// Closed-form delta for exchanging the two middle stops of the 4-point
/// segment `a -> b -> c -> d` into `a -> c -> b -> d`.
pub fn swap_adjacent_delta(
    a: Point,
    b: Point,
    c: Point,
    d: Point,
    cumulative_weight_at_a: f64,
    weight_at_b: f64,
    weight_at_c: f64,
    cache: &mut DistanceCache,
) -> f64 {
    let old_cost = cache.distance(a, b) * cumulative_weight_at_a
        + cache.distance(b, c) * (cumulative_weight_at_a - weight_at_b)
        + cache.distance(c, d) * (cumulative_weight_at_a - weight_at_b - weight_at_c);
    let new_cost = cache.distance(a, c) * cumulative_weight_at_a
        + cache.distance(c, b) * (cumulative_weight_at_a - weight_at_c)
        + cache.distance(b, d) * (cumulative_weight_at_a - weight_at_c - weight_at_b);
    new_cost - old_cost
}

/// Sum of segment lengths from the origin through `stops[..upto]`
/// (i.e. `P -> s0 -> ... -> s_{upto-1}`).
fn prefix_distance(stops: &[Stop], upto: usize, cache: &mut DistanceCache) -> f64 {
    if upto == 0 {
        return 0.0;
    }
    let mut dist = cache.distance(NORTH_POLE, stops[0].location());
    for k in 0..upto.saturating_sub(1) {
        dist += cache.distance(stops[k].location(), stops[k + 1].location());
    }
    dist
}

/// Marginal cost of inserting `gift` *before* position `i` in `trip`.
///
/// Index `i == trip.len()` (append after the last stop) is never
/// considered by this formulation (spec section 4.2): insertion always
/// happens before an existing position.
pub fn insert_at_index_cost(
    trip: &[Stop],
    i: usize,
    gift: Gift,
    cache: &mut DistanceCache,
) -> f64 {
    if trip.is_empty() {
        debug_assert_eq!(i, 0);
        // No existing trip cost to subtract: the whole single-stop trip
        // cost is the marginal cost of creating it.
        let weight = gift.weight + SLEIGH_WEIGHT;
        return cache.distance(NORTH_POLE, gift.location()) * weight
            + cache.distance(gift.location(), NORTH_POLE) * SLEIGH_WEIGHT;
    }
    debug_assert!(i < trip.len());

    let distance = prefix_distance(trip, i, cache);
    let cost_to_carry_gift = distance * gift.weight;

    let previous_location = if i > 0 {
        trip[i - 1].location()
    } else {
        NORTH_POLE
    };
    let location_of_current = trip[i].location();
    let cum_weight: f64 =
        trip[i..].iter().map(|s| s.weight).sum::<f64>() + SLEIGH_WEIGHT + gift.weight;

    let cost_to_move_here = tour_of_three(
        previous_location,
        gift.location(),
        location_of_current,
        cum_weight,
        gift.weight,
        cache,
    );
    let cost_for_old_path =
        cache.distance(location_of_current, previous_location) * (cum_weight - gift.weight);

    cost_to_carry_gift + cost_to_move_here - cost_for_old_path
}

/// Marginal cost of removing the stop at position `i` from `trip`.
pub fn remove_at_index_cost(trip: &[Stop], i: usize, cache: &mut DistanceCache) -> f64 {
    debug_assert!(i < trip.len());
    let gift_to_remove = trip[i];

    let distance = prefix_distance(trip, i, cache);
    let cost_to_not_carry_gift = distance * -gift_to_remove.weight;

    let previous_location = if i > 0 {
        trip[i - 1].location()
    } else {
        NORTH_POLE
    };
    let next_location = if i < trip.len() - 1 {
        trip[i + 1].location()
    } else {
        NORTH_POLE
    };
    let location_of_current = gift_to_remove.location();
    let cum_weight: f64 = trip[i..].iter().map(|s| s.weight).sum::<f64>() + SLEIGH_WEIGHT;

    let cost_of_old_tour = tour_of_three(
        previous_location,
        location_of_current,
        next_location,
        cum_weight,
        gift_to_remove.weight,
        cache,
    );
    let cost_for_new_path =
        cache.distance(previous_location, next_location) * (cum_weight - gift_to_remove.weight);

    cost_to_not_carry_gift - cost_of_old_tour + cost_for_new_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stop(id: u64, lat: f64, lon: f64, weight: f64) -> Stop {
        Stop {
            gift_id: id,
            trip_id: 1,
            lat,
            lon,
            weight,
        }
    }

    #[test]
    fn single_stop_trip_matches_literal_scenario() {
        // spec section 8, end-to-end scenario 1
        let mut cache = DistanceCache::new(16);
        let stops = vec![stop(1, 0.0, 0.0, 5.0)];
        let cost = trip_cost(&stops, &mut cache);
        let d = crate::geo::haversine(NORTH_POLE, Point::new(0.0, 0.0));
        let expected = d * (5.0 + SLEIGH_WEIGHT) + d * SLEIGH_WEIGHT;
        assert_relative_eq!(cost, expected, epsilon = 1e-6);
    }

    #[test]
    fn two_stop_symmetric_swap_has_zero_delta() {
        // spec section 8, scenario 2: symmetric geometry around the pole
        let mut cache = DistanceCache::new(16);
        let a = stop(1, 0.0, 0.0, 5.0);
        let b = stop(2, 0.0, 90.0, 5.0);
        let before = trip_cost(&[a, b], &mut cache);
        let after = trip_cost(&[b, a], &mut cache);
        assert_relative_eq!(before, after, epsilon = 1e-6);
    }

    #[test]
    fn insert_cost_matches_full_recomputation() {
        let mut cache = DistanceCache::new(64);
        let trip = vec![
            stop(1, 10.0, 10.0, 5.0),
            stop(2, 20.0, 20.0, 7.0),
            stop(3, 30.0, 30.0, 3.0),
        ];
        let new_gift = Gift {
            id: 99,
            lat: 15.0,
            lon: 15.0,
            weight: 4.0,
        };
        for i in 0..trip.len() {
            let before = trip_cost(&trip, &mut cache);
            let delta = insert_at_index_cost(&trip, i, new_gift, &mut cache);

            let mut with_insert = trip.clone();
            with_insert.insert(i, Stop::from_gift(new_gift, 1));
            let after = trip_cost(&with_insert, &mut cache);

            assert_relative_eq!(after - before, delta, epsilon = 1e-6);
        }
    }

    #[test]
    fn remove_cost_matches_full_recomputation() {
        let mut cache = DistanceCache::new(64);
        let trip = vec![
            stop(1, 10.0, 10.0, 5.0),
            stop(2, 20.0, 20.0, 7.0),
            stop(3, 30.0, 30.0, 3.0),
            stop(4, 40.0, 40.0, 9.0),
        ];
        for i in 0..trip.len() {
            let before = trip_cost(&trip, &mut cache);
            let delta = remove_at_index_cost(&trip, i, &mut cache);

            let mut without = trip.clone();
            without.remove(i);
            let after = trip_cost(&without, &mut cache);

            assert_relative_eq!(after - before, delta, epsilon = 1e-6);
        }
    }

    #[test]
    fn insert_into_empty_trip_equals_single_stop_cost() {
        let mut cache = DistanceCache::new(16);
        let gift = Gift {
            id: 1,
            lat: 5.0,
            lon: 5.0,
            weight: 3.0,
        };
        let delta = insert_at_index_cost(&[], 0, gift, &mut cache);
        let expected = trip_cost(&[Stop::from_gift(gift, 1)], &mut cache);
        assert_relative_eq!(delta, expected, epsilon = 1e-6);
    }

    #[test]
    fn incremental_inserts_from_empty_sum_to_full_cost() {
        // spec section 8 law: trip cost equals sum of incremental insert
        // costs starting from an empty trip, for any stop ordering.
        let mut cache = DistanceCache::new(64);
        let gifts = [
            Gift { id: 1, lat: 5.0, lon: 5.0, weight: 3.0 },
            Gift { id: 2, lat: -5.0, lon: 10.0, weight: 6.0 },
            Gift { id: 3, lat: 12.0, lon: -20.0, weight: 2.0 },
        ];

        let mut trip: Vec<Stop> = Vec::new();
        let mut accumulated = 0.0;
        for gift in gifts {
            let idx = trip.len();
            accumulated += insert_at_index_cost(&trip, idx, gift, &mut cache);
            trip.push(Stop::from_gift(gift, 1));
        }
        let full = trip_cost(&trip, &mut cache);
        assert_relative_eq!(accumulated, full, epsilon = 1e-6);
    }
}
