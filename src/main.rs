//! Sleigh routing CLI: drives the annealing engine, runs the verifier
//! standalone, or resumes a run from a checkpoint.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use sleigh_anneal::checkpoint::{
    load_checkpoint_metrics, load_checkpoint_partition, write_checkpoint, CheckpointPaths,
};
use sleigh_anneal::config::RunConfig;
use sleigh_anneal::controller::{Controller, MetricsBundle};
use sleigh_anneal::geo::DistanceCache;
use sleigh_anneal::io::{load_gift_catalog, load_partition, resolve_from_file_pattern, write_solution};
use sleigh_anneal::verifier::Verifier;

#[derive(Parser)]
#[command(
    name = "sleigh-anneal",
    version,
    about = "Neighborhood-search / simulated-annealing engine for capacitated sleigh routing"
)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The only registered optimization strategy this core implements
/// (spec section 6 supplement: `method` is a closed extension point,
/// not a reflection-based registry).
#[derive(Clone, ValueEnum)]
enum Method {
    Anneal,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the annealing engine against an initial partition
    Run {
        /// Optimization strategy (only `anneal` is currently registered)
        method: Method,

        /// Gift catalog CSV (GiftId,Latitude,Longitude,Weight)
        #[arg(long)]
        catalog: PathBuf,

        /// Glob pattern locating the initial partition CSV
        #[arg(long)]
        from_file: String,

        /// Directory solution and checkpoint files are written into
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Initial temperature T0
        #[arg(long, default_value_t = 1.0e6)]
        temperature: f64,

        /// Geometric cooling factor
        #[arg(long, default_value_t = 0.9)]
        alpha: f64,

        /// Deterministic RNG seed
        #[arg(long, default_value_t = 0)]
        random_seed: u64,

        /// Namespaces solution/checkpoint output files
        #[arg(long, default_value = "run")]
        evaluation_id: String,

        /// Total iteration budget
        #[arg(long, default_value_t = 10_000)]
        iterations: u64,

        /// Worker pool size for parallel fast-candidate evaluation
        #[arg(long, default_value_t = 2)]
        worker_pool_size: usize,

        /// Enables the cost-delta reconciliation check after every apply
        #[arg(long)]
        verify_cost_delta: bool,
    },
    /// Check a partition file's invariants without running the engine
    Verify {
        /// Gift catalog CSV (GiftId,Latitude,Longitude,Weight)
        #[arg(long)]
        catalog: PathBuf,

        /// Partition CSV to verify (GiftId,TripId)
        partition: PathBuf,
    },
    /// Resume an annealing run from a checkpoint bundle
    Resume {
        /// Gift catalog CSV (GiftId,Latitude,Longitude,Weight)
        #[arg(long)]
        catalog: PathBuf,

        /// Directory the checkpoint bundle was written into
        #[arg(long)]
        checkpoint_dir: PathBuf,

        /// Evaluation id the checkpoint was written under
        #[arg(long)]
        evaluation_id: String,

        /// Seed the checkpoint was written under
        #[arg(long)]
        random_seed: u64,

        /// Iteration the checkpoint was written at
        #[arg(long)]
        iteration: u64,

        /// Remaining iteration budget beyond the checkpointed iteration
        #[arg(long)]
        additional_iterations: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Run {
            method: Method::Anneal,
            catalog,
            from_file,
            output_dir,
            temperature,
            alpha,
            random_seed,
            evaluation_id,
            iterations,
            worker_pool_size,
            verify_cost_delta,
        } => run(
            catalog,
            from_file,
            output_dir,
            temperature,
            alpha,
            random_seed,
            evaluation_id,
            iterations,
            worker_pool_size,
            verify_cost_delta,
        ),
        Commands::Verify { catalog, partition } => verify(catalog, partition),
        Commands::Resume {
            catalog,
            checkpoint_dir,
            evaluation_id,
            random_seed,
            iteration,
            additional_iterations,
        } => resume(catalog, checkpoint_dir, evaluation_id, random_seed, iteration, additional_iterations),
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    catalog_path: PathBuf,
    from_file: String,
    output_dir: PathBuf,
    temperature: f64,
    alpha: f64,
    random_seed: u64,
    evaluation_id: String,
    iterations: u64,
    worker_pool_size: usize,
    verify_cost_delta: bool,
) -> Result<()> {
    let catalog = load_gift_catalog(&catalog_path)
        .with_context(|| format!("loading gift catalog from {}", catalog_path.display()))?;
    let partition_path = resolve_from_file_pattern(&from_file)
        .with_context(|| format!("resolving --from-file pattern {from_file}"))?;
    let mut partition = load_partition(&partition_path, &catalog)
        .with_context(|| format!("loading initial partition from {}", partition_path.display()))?;

    let violations = Verifier::check_all(&partition, &catalog);
    if !violations.is_empty() {
        for v in &violations {
            warn!(%v, "initial partition violates an invariant");
        }
        return Err(sleigh_anneal::error::SleighError::InvalidInitialPartition(format!(
            "{} violation(s) in {}",
            violations.len(),
            partition_path.display()
        ))
        .into());
    }

    let config = RunConfig {
        temperature,
        alpha,
        random_seed,
        evaluation_id: evaluation_id.clone(),
        iterations,
        worker_pool_size,
        verify_cost_delta,
        ..RunConfig::default()
    };

    info!(
        evaluation_id,
        iterations,
        temperature,
        alpha,
        started_at = %chrono::Utc::now().to_rfc3339(),
        "starting annealing run"
    );

    let mut controller = Controller::new(config);
    let mut cache = DistanceCache::default();

    let cancel = controller.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed))
        .context("installing SIGINT handler")?;

    std::fs::create_dir_all(&output_dir).with_context(|| format!("creating {}", output_dir.display()))?;

    let result = controller.run(&mut partition, &mut cache, |p, metrics| {
        let paths = CheckpointPaths::new(&output_dir, &evaluation_id, random_seed, metrics.iterations_completed);
        write_checkpoint(&paths, p, metrics)?;
        info!(path = %paths.partition.display(), "wrote checkpoint");
        Ok(())
    });

    let solution_path = output_dir.join(format!("{evaluation_id}_solution.csv"));
    write_solution(&solution_path, &partition)
        .with_context(|| format!("writing final solution to {}", solution_path.display()))?;
    info!(path = %solution_path.display(), iterations = controller.iteration(), "wrote final solution");

    match result {
        Ok(()) => Ok(()),
        Err(sleigh_anneal::error::SleighError::Cancelled) => {
            warn!("run cancelled by user, final solution written through the last completed iteration");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn verify(catalog_path: PathBuf, partition_path: PathBuf) -> Result<()> {
    let catalog = load_gift_catalog(&catalog_path)
        .with_context(|| format!("loading gift catalog from {}", catalog_path.display()))?;
    let partition = load_partition(&partition_path, &catalog)
        .with_context(|| format!("loading partition from {}", partition_path.display()))?;

    let violations = Verifier::check_all(&partition, &catalog);
    if violations.is_empty() {
        println!("OK: {} trips, {} gifts, no violations", partition.trip_count(), partition.total_gifts());
        Ok(())
    } else {
        for v in &violations {
            println!("VIOLATION: {v}");
        }
        Err(sleigh_anneal::error::SleighError::InvalidInitialPartition(format!("{} violation(s)", violations.len())).into())
    }
}

fn resume(
    catalog_path: PathBuf,
    checkpoint_dir: PathBuf,
    evaluation_id: String,
    random_seed: u64,
    iteration: u64,
    additional_iterations: u64,
) -> Result<()> {
    let catalog = load_gift_catalog(&catalog_path)
        .with_context(|| format!("loading gift catalog from {}", catalog_path.display()))?;
    let paths = CheckpointPaths::new(&checkpoint_dir, &evaluation_id, random_seed, iteration);

    let mut partition = load_checkpoint_partition(&paths.partition, &catalog)
        .with_context(|| format!("loading checkpoint partition from {}", paths.partition.display()))?;
    let previous_metrics: MetricsBundle = load_checkpoint_metrics(&paths.metrics)
        .with_context(|| format!("loading checkpoint metrics from {}", paths.metrics.display()))?;

    info!(
        evaluation_id,
        from_iteration = iteration,
        additional_iterations,
        resumed_at = %chrono::Utc::now().to_rfc3339(),
        "resuming annealing run from checkpoint"
    );

    let config = RunConfig {
        random_seed,
        evaluation_id: evaluation_id.clone(),
        iterations: additional_iterations,
        ..RunConfig::default()
    };
    let mut controller = Controller::new(config);
    let mut cache = DistanceCache::default();

    let cancel = controller.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed))
        .context("installing SIGINT handler")?;

    let result = controller.run(&mut partition, &mut cache, |p, metrics| {
        let new_iteration = iteration + metrics.iterations_completed;
        let paths = CheckpointPaths::new(&checkpoint_dir, &evaluation_id, random_seed, new_iteration);
        write_checkpoint(&paths, p, metrics)?;
        Ok(())
    });

    let solution_path = checkpoint_dir.join(format!("{evaluation_id}_solution.csv"));
    write_solution(&solution_path, &partition)
        .with_context(|| format!("writing resumed solution to {}", solution_path.display()))?;
    info!(
        path = %solution_path.display(),
        resumed_from = previous_metrics.iterations_completed,
        additional_iterations = controller.iteration(),
        "wrote resumed solution"
    );

    match result {
        Ok(()) => Ok(()),
        Err(sleigh_anneal::error::SleighError::Cancelled) => {
            warn!("resumed run cancelled by user, solution written through the last completed iteration");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
