//! Gift-catalog and partition CSV I/O (spec section 6).
//!
//! Grounded on `khx02-vrp`'s `src/main.rs` use of the `csv` crate for
//! structured reads/writes, and on `original_source/utils.py`'s
//! `pd.read_csv` join between a partition (`GiftId,TripId`) and a gift
//! catalog (`GiftId,Latitude,Longitude,Weight`).

use std::path::Path;

use serde::Deserialize;

use crate::error::SleighError;
use crate::model::{Gift, GiftCatalog, GiftId, Partition, Stop, Trip, TripId};

#[derive(Debug, Deserialize)]
struct GiftRecord {
    #[serde(rename = "GiftId")]
    gift_id: GiftId,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Weight")]
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct PartitionRecord {
    #[serde(rename = "GiftId")]
    gift_id: GiftId,
    #[serde(rename = "TripId")]
    trip_id: TripId,
}

/// Loads the gift catalog CSV (`GiftId,Latitude,Longitude,Weight`),
/// spec section 6.
pub fn load_gift_catalog(path: &Path) -> Result<GiftCatalog, SleighError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut catalog = GiftCatalog::new();
    for record in reader.deserialize() {
        let record: GiftRecord = record?;
        catalog.insert(Gift {
            id: record.gift_id,
            lat: record.latitude,
            lon: record.longitude,
            weight: record.weight,
        });
    }
    Ok(catalog)
}

/// Loads a partition CSV (`GiftId,TripId`) and joins it against
/// `catalog` to build the initial [`Partition`] (spec section 6).
///
/// Fails with [`SleighError::UnknownGift`] if a partition row
/// references a gift id absent from the catalog.
pub fn load_partition(path: &Path, catalog: &GiftCatalog) -> Result<Partition, SleighError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut trips_by_id: std::collections::BTreeMap<TripId, Trip> = std::collections::BTreeMap::new();

    for record in reader.deserialize() {
        let record: PartitionRecord = record?;
        let gift = catalog
            .get(record.gift_id)
            .ok_or(SleighError::UnknownGift(record.gift_id))?;
        trips_by_id
            .entry(record.trip_id)
            .or_insert_with(|| Trip::new(record.trip_id))
            .stops
            .push(Stop::from_gift(gift, record.trip_id));
    }

    Ok(Partition::new(trips_by_id.into_values().collect()))
}

/// Writes a partition to a solution CSV (`GiftId,TripId`), spec section
/// 6. Row order follows trip order then in-trip stop order.
pub fn write_solution(path: &Path, partition: &Partition) -> Result<(), SleighError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["GiftId", "TripId"])?;
    for trip in &partition.trips {
        for stop in &trip.stops {
            writer.write_record([stop.gift_id.to_string(), stop.trip_id.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Resolves `--from-file <pattern>` to a single path via glob matching
/// (spec section 6). Picks the first lexicographic match; errors if
/// none exist.
pub fn resolve_from_file_pattern(pattern: &str) -> Result<std::path::PathBuf, SleighError> {
    let mut matches: Vec<std::path::PathBuf> = glob::glob(pattern)
        .map_err(|e| SleighError::InvalidInitialPartition(format!("bad glob pattern {pattern}: {e}")))?
        .filter_map(Result::ok)
        .collect();
    matches.sort();
    matches
        .into_iter()
        .next()
        .ok_or_else(|| SleighError::InvalidInitialPartition(format!("no file matches pattern {pattern}")))
}
