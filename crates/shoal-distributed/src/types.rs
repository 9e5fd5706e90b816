//! Core types for distributed school coordination.
//!
//! This module defines the data structures shared by the partitioner, the
//! process-group collectives and the simulation driver: worker identifiers,
//! collective operation tags, the per-step global aggregates and the error
//! taxonomy of a distributed run.

use serde::{Deserialize, Serialize};
use shoal_core::error::ShoalError;
use shoal_core::types::Step;
use thiserror::Error;

/// Rank of a worker inside the process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// The coordinator always holds rank 0.
    pub const COORDINATOR: WorkerId = WorkerId(0);

    /// Create a new worker identifier.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the underlying rank.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the rank as an index into per-worker tables.
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_coordinator(&self) -> bool {
        *self == Self::COORDINATOR
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Collective operations every worker of the group must enter together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectiveOp {
    /// Coordinator sends each worker its slice.
    Scatter,
    /// Workers send their slices back to the coordinator.
    Gather,
    /// Element-wise sum visible on every worker.
    AllReduceSum,
    /// Maximum visible on every worker.
    AllReduceMax,
    /// Pure synchronization point.
    Barrier,
}

impl std::fmt::Display for CollectiveOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectiveOp::Scatter => write!(f, "Scatter"),
            CollectiveOp::Gather => write!(f, "Gather"),
            CollectiveOp::AllReduceSum => write!(f, "AllReduceSum"),
            CollectiveOp::AllReduceMax => write!(f, "AllReduceMax"),
            CollectiveOp::Barrier => write!(f, "Barrier"),
        }
    }
}

/// Errors that can occur in distributed operations.
///
/// Everything except `Config` happens mid-run and is fatal for the whole
/// group: there is no partial-result recovery, the run restarts from scratch.
#[derive(Error, Debug, Clone)]
pub enum DistributedError {
    #[error("Worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("{rank} is outside a group of {size} workers")]
    RankOutOfRange { rank: WorkerId, size: usize },

    #[error("Timeout in collective {op} (sequence {sequence}), waiting on {}", list_workers(.pending))]
    CollectiveTimeout {
        op: CollectiveOp,
        sequence: u64,
        /// Members that never reached the synchronization point.
        pending: Vec<WorkerId>,
    },

    #[error("Peer disconnected during collective {0}")]
    PeerDisconnected(CollectiveOp),

    #[error("Slice for {rank} has {actual} agents, partition expects {expected}")]
    SliceLengthMismatch {
        rank: WorkerId,
        expected: usize,
        actual: usize,
    },

    #[error("Protocol error in {op}: {reason}")]
    Protocol { op: CollectiveOp, reason: String },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid driver transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Config(#[from] ShoalError),

    #[error("Worker task failed: {0}")]
    WorkerPanicked(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

fn list_workers(workers: &[WorkerId]) -> String {
    workers
        .iter()
        .map(WorkerId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl DistributedError {
    /// True for errors detected before any collective communication.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            DistributedError::Config(_) | DistributedError::InvalidWorkerCount(_)
        )
    }
}

impl From<bincode::Error> for DistributedError {
    fn from(e: bincode::Error) -> Self {
        DistributedError::Codec(e.to_string())
    }
}

/// Result type for distributed operations.
pub type DistributedResult<T> = Result<T, DistributedError>;

/// Running maximum of the per-agent delta metric.
///
/// Starts `Empty` instead of a sentinel so that "no samples yet" is never
/// confused with a real value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MaxDelta {
    #[default]
    Empty,
    Value(f64),
}

impl MaxDelta {
    /// Fold one sample in. NaN samples are ignored.
    pub fn observe(self, sample: f64) -> Self {
        if sample.is_nan() {
            return self;
        }
        match self {
            MaxDelta::Empty => MaxDelta::Value(sample),
            MaxDelta::Value(current) => MaxDelta::Value(current.max(sample)),
        }
    }

    /// Combine two partial maxima.
    pub fn merge(self, other: MaxDelta) -> Self {
        match other {
            MaxDelta::Empty => self,
            MaxDelta::Value(v) => self.observe(v),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MaxDelta::Empty => None,
            MaxDelta::Value(v) => Some(*v),
        }
    }

    /// The value, if it can safely divide a delta.
    ///
    /// `None` for an empty accumulator and for a zero maximum (nobody moved).
    pub fn divisor(&self) -> Option<f64> {
        self.value().filter(|v| *v > 0.0 && v.is_finite())
    }
}

impl FromIterator<f64> for MaxDelta {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        iter.into_iter().fold(MaxDelta::Empty, MaxDelta::observe)
    }
}

/// The two population-wide sums reduced at the start of every step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SumPair {
    /// Σ distance from origin.
    pub distance: f64,
    /// Σ distance × weight.
    pub weighted_distance: f64,
}

impl SumPair {
    pub fn new(distance: f64, weighted_distance: f64) -> Self {
        Self {
            distance,
            weighted_distance,
        }
    }

    /// Wire order used by the sum reduction.
    pub fn to_array(self) -> [f64; 2] {
        [self.distance, self.weighted_distance]
    }

    pub fn from_array(values: [f64; 2]) -> Self {
        Self::new(values[0], values[1])
    }

    /// Weighted mean distance from the origin.
    ///
    /// `None` when the distance sum is zero; the value is diagnostic only.
    pub fn barycentre(&self) -> Option<f64> {
        if self.distance == 0.0 {
            return None;
        }
        let value = self.weighted_distance / self.distance;
        value.is_finite().then_some(value)
    }
}

impl std::ops::Add for SumPair {
    type Output = SumPair;

    fn add(self, rhs: SumPair) -> SumPair {
        SumPair::new(
            self.distance + rhs.distance,
            self.weighted_distance + rhs.weighted_distance,
        )
    }
}

impl std::iter::Sum for SumPair {
    fn sum<I: Iterator<Item = SumPair>>(iter: I) -> Self {
        iter.fold(SumPair::default(), |acc, p| acc + p)
    }
}

/// What one step produced, identical on every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based step index.
    pub step: Step,
    /// Population-wide sums before the swim.
    pub global_pair: SumPair,
    /// Diagnostic barycentre; never fed back into the kernels.
    pub barycentre: Option<f64>,
    /// Population-wide maximum delta after the swim.
    pub max_delta: MaxDelta,
    /// False when the eat phase was skipped because nobody moved.
    pub eat_applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id() {
        let worker = WorkerId::new(3);
        assert_eq!(worker.as_u32(), 3);
        assert_eq!(worker.index(), 3);
        assert_eq!(format!("{}", worker), "worker-3");
        assert!(!worker.is_coordinator());
        assert!(WorkerId::new(0).is_coordinator());
    }

    #[test]
    fn test_collective_op_display() {
        assert_eq!(format!("{}", CollectiveOp::Scatter), "Scatter");
        assert_eq!(format!("{}", CollectiveOp::Gather), "Gather");
        assert_eq!(format!("{}", CollectiveOp::AllReduceSum), "AllReduceSum");
        assert_eq!(format!("{}", CollectiveOp::AllReduceMax), "AllReduceMax");
        assert_eq!(format!("{}", CollectiveOp::Barrier), "Barrier");
    }

    #[test]
    fn test_max_delta_starts_empty() {
        let max = MaxDelta::default();
        assert_eq!(max, MaxDelta::Empty);
        assert_eq!(max.value(), None);
        assert_eq!(max.divisor(), None);
    }

    #[test]
    fn test_max_delta_observe_and_merge() {
        let a: MaxDelta = [0.5, 0.2, f64::NAN, 0.7].into_iter().collect();
        assert_eq!(a, MaxDelta::Value(0.7));

        let b = MaxDelta::Empty.observe(0.9);
        assert_eq!(a.merge(b), MaxDelta::Value(0.9));
        assert_eq!(a.merge(MaxDelta::Empty), a);
        assert_eq!(MaxDelta::Empty.merge(a), a);
    }

    #[test]
    fn test_max_delta_zero_is_not_a_divisor() {
        let zero = MaxDelta::Value(0.0);
        assert_eq!(zero.value(), Some(0.0));
        assert_eq!(zero.divisor(), None);
        assert_eq!(MaxDelta::Value(0.25).divisor(), Some(0.25));
    }

    #[test]
    fn test_sum_pair_arithmetic() {
        let total: SumPair = vec![SumPair::new(1.0, 10.0), SumPair::new(3.0, 50.0)]
            .into_iter()
            .sum();
        assert_eq!(total, SumPair::new(4.0, 60.0));
        assert_eq!(total.to_array(), [4.0, 60.0]);
        assert_eq!(SumPair::from_array([4.0, 60.0]), total);
        assert_eq!(total.barycentre(), Some(15.0));
    }

    #[test]
    fn test_barycentre_guards_zero_denominator() {
        assert_eq!(SumPair::default().barycentre(), None);
        assert_eq!(SumPair::new(0.0, 5.0).barycentre(), None);
    }

    #[test]
    fn test_error_classification() {
        let cfg: DistributedError =
            shoal_core::error::ShoalError::invalid_config("workers", "x", "not a number").into();
        assert!(cfg.is_config());
        assert!(DistributedError::InvalidWorkerCount(0).is_config());
        let timeout = DistributedError::CollectiveTimeout {
            op: CollectiveOp::AllReduceMax,
            sequence: 7,
            pending: vec![WorkerId::new(2), WorkerId::new(3)],
        };
        assert!(!timeout.is_config());
        assert_eq!(
            timeout.to_string(),
            "Timeout in collective AllReduceMax (sequence 7), waiting on worker-2, worker-3"
        );
    }
}
