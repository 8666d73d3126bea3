//! Checkpoint bundle writer/loader (spec section 6): a partition CSV
//! plus a binary metrics blob, written at the controller's checkpoint
//! cadence and readable back in for `resume`.
//!
//! Grounded on `paiml-rosetta-ruchy/harness/runner/src/reporting.rs`'s
//! pattern of assembling a named output bundle from run state, adapted
//! to the two-file naming scheme spec section 6 specifies exactly.

use std::path::{Path, PathBuf};

use crate::controller::MetricsBundle;
use crate::error::SleighError;
use crate::io::{load_partition, write_solution};
use crate::model::{GiftCatalog, Partition};

/// File paths for one checkpoint, following spec section 6's naming:
/// `<run-id>_<seed>_<iter>.csv` and `metrics_<run-id>_<seed>_<iter>.bin`.
pub struct CheckpointPaths {
    pub partition: PathBuf,
    pub metrics: PathBuf,
}

impl CheckpointPaths {
    pub fn new(dir: &Path, evaluation_id: &str, seed: u64, iteration: u64) -> Self {
        Self {
            partition: dir.join(format!("{evaluation_id}_{seed}_{iteration}.csv")),
            metrics: dir.join(format!("metrics_{evaluation_id}_{seed}_{iteration}.bin")),
        }
    }
}

/// Writes a checkpoint bundle: the partition as a CSV (reusing the
/// solution-file writer, since the schema is identical) and the
/// accumulated metrics as `bincode`.
pub fn write_checkpoint(paths: &CheckpointPaths, partition: &Partition, metrics: &MetricsBundle) -> Result<(), SleighError> {
    write_solution(&paths.partition, partition)
        .map_err(|e| SleighError::CheckpointWriteFailure(e.to_string()))?;

    let bytes = bincode::serialize(metrics).map_err(|e| SleighError::CheckpointWriteFailure(e.to_string()))?;
    std::fs::write(&paths.metrics, bytes).map_err(|e| SleighError::CheckpointWriteFailure(e.to_string()))?;
    Ok(())
}

/// Loads a previously written checkpoint's partition CSV back through
/// the gift-catalog join, for `sleigh-anneal resume` (spec section 4.6
/// supplement).
pub fn load_checkpoint_partition(partition_path: &Path, catalog: &GiftCatalog) -> Result<Partition, SleighError> {
    load_partition(partition_path, catalog)
}

/// Loads a previously written checkpoint's metrics bundle, for
/// resuming the time series rather than restarting it from empty.
pub fn load_checkpoint_metrics(metrics_path: &Path) -> Result<MetricsBundle, SleighError> {
    let bytes = std::fs::read(metrics_path)?;
    let metrics = bincode::deserialize(&bytes).map_err(SleighError::Bincode)?;
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gift, Stop, Trip};
    use tempfile::tempdir;

    fn sample_partition() -> Partition {
        let mut trip = Trip::new(1);
        trip.stops.push(Stop::from_gift(Gift { id: 1, lat: 0.0, lon: 0.0, weight: 5.0 }, 1));
        Partition::new(vec![trip])
    }

    fn sample_catalog() -> GiftCatalog {
        let mut catalog = GiftCatalog::new();
        catalog.insert(Gift { id: 1, lat: 0.0, lon: 0.0, weight: 5.0 });
        catalog
    }

    #[test]
    fn checkpoint_paths_follow_the_naming_scheme() {
        let dir = Path::new("/tmp/checkpoints");
        let paths = CheckpointPaths::new(dir, "run-42", 7, 1000);
        assert_eq!(paths.partition, dir.join("run-42_7_1000.csv"));
        assert_eq!(paths.metrics, dir.join("metrics_run-42_7_1000.bin"));
    }

    #[test]
    fn write_then_load_checkpoint_roundtrips() {
        let dir = tempdir().unwrap();
        let paths = CheckpointPaths::new(dir.path(), "run", 1, 100);
        let partition = sample_partition();
        let catalog = sample_catalog();
        let metrics = MetricsBundle {
            iterations_completed: 100,
            log_interval: 10,
            temperature_series: vec![1.0, 0.9],
            good_series: vec![3, 4],
            accepted_series: vec![1, 2],
            rejected_series: vec![0, 1],
            cost_delta_series: vec![-1.0, 2.0],
        };

        write_checkpoint(&paths, &partition, &metrics).unwrap();

        let reloaded_partition = load_checkpoint_partition(&paths.partition, &catalog).unwrap();
        assert_eq!(reloaded_partition.total_gifts(), 1);

        let reloaded_metrics = load_checkpoint_metrics(&paths.metrics).unwrap();
        assert_eq!(reloaded_metrics.iterations_completed, 100);
        assert_eq!(reloaded_metrics.cost_delta_series, vec![-1.0, 2.0]);
    }
}
