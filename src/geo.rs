//! Haversine distance and a bounded, symmetric memoization cache over it.
//!
//! Grounded on `kiernantd-Pool-Project/main.rs`'s `haversine_meters` for the
//! formula shape, generalized to kilometers (spec section 6: Earth radius
//! 6371 km) and wrapped in a bounded LRU (spec section 4.1) rather than an
//! unbounded dictionary.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Earth radius used by the haversine formula, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default capacity of the distance cache (spec section 3: "~65k entries").
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

/// A latitude/longitude pair, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// A bit-pattern key usable in a `HashMap`/`LruCache`. Floats aren't
    /// `Eq`, so the cache keys on the raw bits of the coordinates instead of
    /// rounding (rounding would make two distinct points collide and answer
    /// with the wrong cached distance).
    fn key(&self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

/// Great-circle distance between `a` and `b`, in kilometers.
///
/// Symmetric: `haversine(a, b) == haversine(b, a)`, and `haversine(a, a) ==
/// 0.0` (up to floating point round-off, which is exactly zero here since
/// every term collapses to `sin(0)` / `cos` of identical angles).
pub fn haversine(a: Point, b: Point) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let (lat1, lon1, lat2, lon2) = (to_rad(a.lat), to_rad(a.lon), to_rad(b.lat), to_rad(b.lon));
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Canonicalized, order-independent cache key for a pair of points: the
/// smaller bit-pattern tuple sorts first, so `d(a, b)` and `d(b, a)` share
/// one slot.
type CacheKey = ((u64, u64), (u64, u64));

fn canonical_key(a: Point, b: Point) -> CacheKey {
    let (ka, kb) = (a.key(), b.key());
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

/// Bounded-capacity, symmetric memoization cache for [`haversine`].
///
/// Not thread-safe by itself (spec section 5): callers that fan out
/// `cost_delta` computation across a worker pool must either hold this
/// behind a lock or give each worker a local cache and merge results back
/// after the parallel phase. The controller uses the latter.
pub struct DistanceCache {
    entries: LruCache<CacheKey, f64>,
    hits: u64,
    misses: u64,
}

impl DistanceCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Distance between `a` and `b`, served from cache when available.
    pub fn distance(&mut self, a: Point, b: Point) -> f64 {
        let key = canonical_key(a, b);
        if let Some(&d) = self.entries.get(&key) {
            self.hits += 1;
            return d;
        }
        let d = haversine(a, b);
        self.entries.put(key, d);
        self.misses += 1;
        d
    }

    /// `(hits, misses, size)` diagnostics (spec section 4.1).
    pub fn stats(&self) -> (u64, u64, usize) {
        (self.hits, self.misses, self.entries.len())
    }

    /// Merges another cache's entries into this one, for workers that
    /// maintained a local read-through cache during a parallel phase.
    pub fn merge(&mut self, other: DistanceCache) {
        for (key, value) in other.entries {
            self.entries.put(key, value);
        }
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

impl Default for DistanceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 90.0);
        assert_eq!(haversine(a, b), haversine(b, a));
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = Point::new(12.5, -34.2);
        assert_eq!(haversine(a, a), 0.0);
    }

    #[test]
    fn north_pole_to_equator_is_quarter_circumference() {
        let north_pole = Point::new(90.0, 0.0);
        let equator = Point::new(0.0, 0.0);
        let expected = std::f64::consts::FRAC_PI_2 * EARTH_RADIUS_KM;
        assert!((haversine(north_pole, equator) - expected).abs() < 1e-6);
    }

    #[test]
    fn cache_hits_on_reversed_argument_order() {
        let mut cache = DistanceCache::new(16);
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, 4.0);
        let d1 = cache.distance(a, b);
        let (_, misses_after_first, _) = cache.stats();
        assert_eq!(misses_after_first, 1);

        let d2 = cache.distance(b, a);
        let (hits, misses, size) = cache.stats();
        assert_eq!(d1, d2);
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
        assert_eq!(size, 1);
    }

    #[test]
    fn cache_evicts_least_recently_used_beyond_capacity() {
        let mut cache = DistanceCache::new(1);
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 10.0);
        let c = Point::new(20.0, 20.0);

        cache.distance(a, b);
        cache.distance(a, c); // evicts (a, b)
        cache.distance(a, b); // miss again: was evicted

        let (_, misses, size) = cache.stats();
        assert_eq!(misses, 3);
        assert_eq!(size, 1);
    }
}
