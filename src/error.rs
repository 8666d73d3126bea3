//! Domain error kinds for the annealing engine (spec section 7).

use crate::model::{GiftId, TripId};

/// Errors surfaced by the trip store, controller, verifier, and I/O layers.
#[derive(Debug, thiserror::Error)]
pub enum SleighError {
    /// The loaded initial partition fails coverage or capacity before the
    /// search loop begins. Fatal — the caller must abort before annealing.
    #[error("invalid initial partition: {0}")]
    InvalidInitialPartition(String),

    /// A neighbor's reported `cost_delta` disagreed with a full
    /// recomputation beyond the verifier's tolerance. Fatal in debug builds.
    #[error(
        "cost-delta mismatch for {neighbor}: reported {reported:.3}, recomputed {recomputed:.3}"
    )]
    CostDeltaMismatch {
        neighbor: String,
        reported: f64,
        recomputed: f64,
    },

    /// A neighbor's chosen destination was no longer valid at apply time
    /// (e.g. capacity consumed by a concurrently evaluated candidate).
    /// Non-fatal: the iteration becomes a no-op.
    #[error("infeasible move at apply time for {0}")]
    InfeasibleMove(String),

    /// Writing a checkpoint bundle failed. Non-fatal: logged and the run
    /// continues.
    #[error("checkpoint write failed: {0}")]
    CheckpointWriteFailure(String),

    /// The user requested cancellation (SIGINT). Not an error condition by
    /// itself, but modeled here so the controller can unwind through the
    /// same `Result` plumbing as real failures.
    #[error("run cancelled by user")]
    Cancelled,

    #[error("gift {0} referenced by partition but absent from catalog")]
    UnknownGift(GiftId),

    #[error("trip {0} is empty at rest")]
    EmptyTrip(TripId),

    /// A checkpoint-time invariant check (spec section 4.4 step 2)
    /// failed. Fatal: the run aborts rather than persist or continue
    /// from a broken partition.
    #[error("invariant violation at checkpoint: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Bincode(#[from] Box<bincode::ErrorKind>),
}
