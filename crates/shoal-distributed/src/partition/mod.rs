//! Contiguous work partitioning.
//!
//! This module splits a population of `N` agents over `W` workers into
//! contiguous slices whose sizes differ by at most one. The first
//! `N mod W` workers take one extra agent each.
//!
//! The table is a pure function of `(W, N)`. Every worker derives it locally
//! from configuration it already holds, and the scatter/gather plan relies on
//! all of them agreeing on every slice boundary without exchanging it.

use crate::types::{DistributedError, DistributedResult, WorkerId};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Offsets and sizes of every worker's slice.
///
/// # Example
///
/// ```
/// use shoal_distributed::partition::PartitionTable;
/// use shoal_distributed::types::WorkerId;
///
/// let table = PartitionTable::new(3, 10).unwrap();
/// assert_eq!(table.sizes(), &[4, 3, 3]);
/// assert_eq!(table.offsets(), &[0, 4, 7]);
/// assert_eq!(table.range(WorkerId::new(1)), 4..7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionTable {
    /// Total number of agents being partitioned.
    total_size: usize,
    /// Slice length per worker, indexed by rank.
    sizes: Vec<usize>,
    /// Slice start per worker, indexed by rank.
    offsets: Vec<usize>,
}

/// Build the partition table for `worker_count` workers and `total_size` agents.
///
/// # Errors
///
/// Returns `DistributedError::InvalidWorkerCount` if `worker_count` is 0.
pub fn partition(worker_count: usize, total_size: usize) -> DistributedResult<PartitionTable> {
    PartitionTable::new(worker_count, total_size)
}

impl PartitionTable {
    /// Create the table. See [`partition`].
    pub fn new(worker_count: usize, total_size: usize) -> DistributedResult<Self> {
        if worker_count < 1 {
            return Err(DistributedError::InvalidWorkerCount(worker_count));
        }

        let base = total_size / worker_count;
        let remainder = total_size % worker_count;

        let mut sizes = Vec::with_capacity(worker_count);
        let mut offsets = Vec::with_capacity(worker_count);
        let mut offset = 0;
        for rank in 0..worker_count {
            let size = if rank < remainder { base + 1 } else { base };
            offsets.push(offset);
            sizes.push(size);
            offset += size;
        }

        Ok(Self {
            total_size,
            sizes,
            offsets,
        })
    }

    /// Number of workers the table was built for.
    pub fn worker_count(&self) -> usize {
        self.sizes.len()
    }

    /// Number of agents partitioned.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Largest slice any worker receives.
    pub fn max_size(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// Slice length of `rank`. Zero for ranks outside the table.
    pub fn size(&self, rank: WorkerId) -> usize {
        self.sizes.get(rank.index()).copied().unwrap_or(0)
    }

    /// Slice start of `rank`. `total_size` for ranks outside the table.
    pub fn offset(&self, rank: WorkerId) -> usize {
        self.offsets
            .get(rank.index())
            .copied()
            .unwrap_or(self.total_size)
    }

    /// Population index range owned by `rank`.
    pub fn range(&self, rank: WorkerId) -> Range<usize> {
        let offset = self.offset(rank);
        offset..offset + self.size(rank)
    }

    /// Slice descriptor for `rank`.
    pub fn slice(&self, rank: WorkerId) -> DistributedResult<Slice> {
        if rank.index() >= self.worker_count() {
            return Err(DistributedError::RankOutOfRange {
                rank,
                size: self.worker_count(),
            });
        }
        Ok(Slice {
            rank,
            offset: self.offsets[rank.index()],
            size: self.sizes[rank.index()],
        })
    }

    /// All slice descriptors in rank order.
    pub fn slices(&self) -> impl Iterator<Item = Slice> + '_ {
        self.offsets
            .iter()
            .zip(&self.sizes)
            .enumerate()
            .map(|(rank, (&offset, &size))| Slice {
                rank: WorkerId::new(rank as u32),
                offset,
                size,
            })
    }

    /// Worker owning population index `index`.
    pub fn owner_of(&self, index: usize) -> Option<WorkerId> {
        if index >= self.total_size {
            return None;
        }
        // Sizes never grow with rank, so empty slices only trail at `total_size`.
        let rank = self.offsets.partition_point(|&offset| offset <= index) - 1;
        Some(WorkerId::new(rank as u32))
    }
}

/// One worker's own slice of the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slice {
    pub rank: WorkerId,
    pub offset: usize,
    pub size: usize,
}

impl Slice {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
