//! The two whole-population reductions of every step.
//!
//! Each worker contributes one value per reduction, so the cost of a step's
//! synchronization is `O(workers)` no matter how large the school is.

use crate::group::Communicator;
use crate::schema::WireSchema;
use crate::types::*;
use std::sync::Arc;

/// Global sums and maxima, identical on every worker.
#[derive(Debug, Clone)]
pub struct GlobalAggregator {
    schema: Arc<WireSchema>,
}

impl GlobalAggregator {
    pub fn new(schema: Arc<WireSchema>) -> Self {
        Self { schema }
    }

    /// Element-wise sum of every worker's `(Σ distance, Σ distance × weight)`.
    pub async fn all_reduce_sum_pair<C: Communicator + ?Sized>(
        &self,
        comm: &mut C,
        local: SumPair,
    ) -> DistributedResult<SumPair> {
        let values = local.to_array().to_vec();
        if values.len() != self.schema.sum_width() {
            return Err(DistributedError::Protocol {
                op: CollectiveOp::AllReduceSum,
                reason: format!(
                    "sum vector has {} components, schema declares {}",
                    values.len(),
                    self.schema.sum_width()
                ),
            });
        }

        let global = comm.all_reduce_sum(values).await?;
        match global.as_slice() {
            &[distance, weighted_distance] => Ok(SumPair::new(distance, weighted_distance)),
            other => Err(DistributedError::Protocol {
                op: CollectiveOp::AllReduceSum,
                reason: format!("reduction returned {} components", other.len()),
            }),
        }
    }

    /// Largest delta metric across every worker.
    pub async fn all_reduce_max<C: Communicator + ?Sized>(
        &self,
        comm: &mut C,
        local: MaxDelta,
    ) -> DistributedResult<MaxDelta> {
        comm.all_reduce_max(local).await
    }
}
