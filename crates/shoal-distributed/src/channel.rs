//! Distribution channel: scatter the population out, gather it back.
//!
//! Both transfers are irregular: worker `i` receives exactly
//! `table.size(i)` agents starting at `table.offset(i)`. The partition table
//! is the whole transfer plan, so no slice metadata travels with the data.
//! Agent values are never touched, records are only relocated.

use crate::group::Communicator;
use crate::partition::PartitionTable;
use crate::schema::WireSchema;
use crate::types::*;
use shoal_core::types::Agent;
use std::sync::Arc;
use tracing::debug;

/// Moves agent slices between the coordinator and the workers.
#[derive(Debug, Clone)]
pub struct DistributionChannel {
    schema: Arc<WireSchema>,
    table: Arc<PartitionTable>,
}

impl DistributionChannel {
    pub fn new(schema: Arc<WireSchema>, table: Arc<PartitionTable>) -> Self {
        Self { schema, table }
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    fn check_group<C: Communicator + ?Sized>(&self, comm: &C, op: CollectiveOp) -> DistributedResult<()> {
        if comm.size() != self.table.worker_count() {
            return Err(DistributedError::Protocol {
                op,
                reason: format!(
                    "group has {} workers, partition table has {}",
                    comm.size(),
                    self.table.worker_count()
                ),
            });
        }
        Ok(())
    }

    fn check_slice(&self, rank: WorkerId, actual: usize) -> DistributedResult<()> {
        let expected = self.table.size(rank);
        if actual != expected {
            return Err(DistributedError::SliceLengthMismatch {
                rank,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Hand every worker its slice.
    ///
    /// Only the coordinator passes the population; everybody else passes
    /// `None`. Returns the caller's own slice in population order. Empty
    /// slices are valid.
    ///
    /// # Errors
    ///
    /// - `DistributedError::Protocol` if the coordinator has no population,
    ///   or one whose length disagrees with the partition table
    /// - `DistributedError::SliceLengthMismatch` if the received slice does
    ///   not have the partition size
    /// - any collective failure of the underlying communicator
    pub async fn scatter<C: Communicator + ?Sized>(
        &self,
        comm: &mut C,
        population: Option<&[Agent]>,
    ) -> DistributedResult<Vec<Agent>> {
        let op = CollectiveOp::Scatter;
        self.check_group(comm, op)?;
        let rank = comm.rank();

        let frames = match population {
            Some(agents) => {
                if agents.len() != self.table.total_size() {
                    return Err(DistributedError::Protocol {
                        op,
                        reason: format!(
                            "population has {} agents, partition table covers {}",
                            agents.len(),
                            self.table.total_size()
                        ),
                    });
                }
                let frames = self
                    .table
                    .slices()
                    .map(|slice| self.schema.encode_slice(&agents[slice.range()]))
                    .collect::<DistributedResult<Vec<_>>>()?;
                Some(frames)
            }
            None if rank.is_coordinator() => {
                return Err(DistributedError::Protocol {
                    op,
                    reason: "coordinator has no population to scatter".to_string(),
                })
            }
            None => None,
        };

        let frame = comm.scatter(WorkerId::COORDINATOR, frames).await?;
        let local = self.schema.decode_slice(&frame)?;
        self.check_slice(rank, local.len())?;

        debug!(%rank, agents = local.len(), "Received slice");
        Ok(local)
    }

    /// Send every slice back to the coordinator.
    ///
    /// Returns the merged population on the coordinator, where agent `k` of
    /// worker `i` lands at index `offset(i) + k`, and `None` elsewhere.
    pub async fn gather<C: Communicator + ?Sized>(
        &self,
        comm: &mut C,
        local: &[Agent],
    ) -> DistributedResult<Option<Vec<Agent>>> {
        self.check_group(comm, CollectiveOp::Gather)?;
        let rank = comm.rank();
        self.check_slice(rank, local.len())?;

        let frame = self.schema.encode_slice(local)?;
        let Some(frames) = comm.gather(WorkerId::COORDINATOR, frame).await? else {
            return Ok(None);
        };

        let mut population = Vec::with_capacity(self.table.total_size());
        for (slice, frame) in self.table.slices().zip(frames) {
            let agents = self.schema.decode_slice(&frame)?;
            self.check_slice(slice.rank, agents.len())?;
            debug_assert_eq!(population.len(), slice.offset);
            population.extend(agents);
        }

        debug!(agents = population.len(), "Gathered population");
        Ok(Some(population))
    }
}
