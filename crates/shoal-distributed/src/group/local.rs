//! In-process process group.
//!
//! Each member is a [`LocalComm`] that can be moved onto its own task or
//! thread. Members exchange data through shared per-rank slots guarded by a
//! [`CollectiveBarrier`]. Every collective runs in two synchronization
//! points:
//!
//! 1. members deposit their contribution and wait for the group;
//! 2. members read what they need and wait again, so no slot is overwritten
//!    by the next collective before every member has read it.
//!
//! Reductions fold the slots in rank order, so every member computes a
//! bitwise-identical result.

use super::barrier::CollectiveBarrier;
use super::{Communicator, Frame};
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Contribution a member leaves in its slot.
#[derive(Debug, Clone)]
enum Payload {
    Frame(Frame),
    Sums(Vec<f64>),
    Max(MaxDelta),
}

struct Shared {
    size: usize,
    barrier: CollectiveBarrier,
    slots: Mutex<Vec<Option<Payload>>>,
}

/// Bootstraps an in-process group with stable ranks `0..size`.
pub struct LocalGroup {
    members: Vec<LocalComm>,
}

impl LocalGroup {
    /// Create a group of `size` members.
    ///
    /// `timeout` bounds how long any member waits for its peers inside a
    /// collective; `None` waits forever.
    pub fn new(size: usize, timeout: Option<Duration>) -> DistributedResult<Self> {
        if size < 1 {
            return Err(DistributedError::InvalidWorkerCount(size));
        }

        let shared = Arc::new(Shared {
            size,
            barrier: CollectiveBarrier::with_timeout(size, timeout),
            slots: Mutex::new(vec![None; size]),
        });

        let members = (0..size as u32)
            .map(|rank| LocalComm {
                rank: WorkerId::new(rank),
                shared: shared.clone(),
                sequence: 0,
            })
            .collect();

        debug!(size, ?timeout, "Bootstrapped local process group");
        Ok(Self { members })
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Hand out the members, ordered by rank.
    pub fn into_members(self) -> Vec<LocalComm> {
        self.members
    }
}

/// One member of a [`LocalGroup`].
///
/// Dropping a member before the group has finished its collectives fails
/// every peer still waiting with `PeerDisconnected`.
pub struct LocalComm {
    rank: WorkerId,
    shared: Arc<Shared>,
    /// Next synchronization point; advances identically on every member.
    sequence: u64,
}

impl LocalComm {
    fn check_root(&self, op: CollectiveOp, root: WorkerId) -> DistributedResult<()> {
        if root.index() >= self.shared.size {
            return Err(DistributedError::Protocol {
                op,
                reason: format!("root {} is outside a group of {}", root, self.shared.size),
            });
        }
        Ok(())
    }

    async fn sync(&mut self, op: CollectiveOp) -> DistributedResult<()> {
        let sequence = self.sequence;
        self.sequence += 1;
        trace!(rank = %self.rank, %op, sequence, "Entering synchronization point");
        self.shared
            .barrier
            .arrive_and_wait(self.rank, op, sequence)
            .await
    }

    async fn deposit(&self, payload: Payload) {
        let mut slots = self.shared.slots.lock().await;
        slots[self.rank.index()] = Some(payload);
    }

    async fn read_all(&self, op: CollectiveOp) -> DistributedResult<Vec<Payload>> {
        let slots = self.shared.slots.lock().await;
        slots
            .iter()
            .enumerate()
            .map(|(rank, slot)| {
                slot.clone().ok_or_else(|| DistributedError::Protocol {
                    op,
                    reason: format!("worker-{} left no contribution", rank),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Communicator for LocalComm {
    fn rank(&self) -> WorkerId {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    async fn scatter(
        &mut self,
        root: WorkerId,
        frames: Option<Vec<Frame>>,
    ) -> DistributedResult<Frame> {
        let op = CollectiveOp::Scatter;
        self.check_root(op, root)?;

        if self.rank == root {
            let frames = frames.ok_or_else(|| DistributedError::Protocol {
                op,
                reason: "root supplied no frames".to_string(),
            })?;
            if frames.len() != self.shared.size {
                return Err(DistributedError::Protocol {
                    op,
                    reason: format!(
                        "root supplied {} frames for {} workers",
                        frames.len(),
                        self.shared.size
                    ),
                });
            }
            let mut slots = self.shared.slots.lock().await;
            for (slot, frame) in slots.iter_mut().zip(frames) {
                *slot = Some(Payload::Frame(frame));
            }
        }

        self.sync(op).await?;
        let mine = {
            let mut slots = self.shared.slots.lock().await;
            slots[self.rank.index()].take()
        };
        self.sync(op).await?;

        match mine {
            Some(Payload::Frame(frame)) => Ok(frame),
            other => Err(DistributedError::Protocol {
                op,
                reason: format!("{} expected a frame, found {:?}", self.rank, other),
            }),
        }
    }

    async fn gather(
        &mut self,
        root: WorkerId,
        frame: Frame,
    ) -> DistributedResult<Option<Vec<Frame>>> {
        let op = CollectiveOp::Gather;
        self.check_root(op, root)?;

        self.deposit(Payload::Frame(frame)).await;
        self.sync(op).await?;

        let collected = if self.rank == root {
            let payloads = self.read_all(op).await?;
            let frames = payloads
                .into_iter()
                .map(|payload| match payload {
                    Payload::Frame(frame) => Ok(frame),
                    other => Err(DistributedError::Protocol {
                        op,
                        reason: format!("expected a frame, found {:?}", other),
                    }),
                })
                .collect::<DistributedResult<Vec<_>>>()?;
            Some(frames)
        } else {
            None
        };

        self.sync(op).await?;
        Ok(collected)
    }

    async fn all_reduce_sum(&mut self, values: Vec<f64>) -> DistributedResult<Vec<f64>> {
        let op = CollectiveOp::AllReduceSum;
        let width = values.len();

        self.deposit(Payload::Sums(values)).await;
        self.sync(op).await?;

        let payloads = self.read_all(op).await?;
        let mut total = vec![0.0; width];
        for payload in payloads {
            match payload {
                Payload::Sums(part) if part.len() == width => {
                    for (acc, v) in total.iter_mut().zip(part) {
                        *acc += v;
                    }
                }
                other => {
                    return Err(DistributedError::Protocol {
                        op,
                        reason: format!("expected {} sums, found {:?}", width, other),
                    })
                }
            }
        }

        self.sync(op).await?;
        Ok(total)
    }

    async fn all_reduce_max(&mut self, value: MaxDelta) -> DistributedResult<MaxDelta> {
        let op = CollectiveOp::AllReduceMax;

        self.deposit(Payload::Max(value)).await;
        self.sync(op).await?;

        let payloads = self.read_all(op).await?;
        let mut max = MaxDelta::Empty;
        for payload in payloads {
            match payload {
                Payload::Max(part) => max = max.merge(part),
                other => {
                    return Err(DistributedError::Protocol {
                        op,
                        reason: format!("expected a maximum, found {:?}", other),
                    })
                }
            }
        }

        self.sync(op).await?;
        Ok(max)
    }

    async fn barrier(&mut self) -> DistributedResult<()> {
        self.sync(CollectiveOp::Barrier).await
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        self.shared.barrier.close();
    }
}
