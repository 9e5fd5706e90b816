//! Collective barrier for lock-step synchronization.
//!
//! Every collective call is split into numbered synchronization points. A
//! worker records its arrival at a point and then waits until the whole
//! group has arrived. No worker can therefore be at step `k + 1` while
//! another is still inside step `k`'s collective.

use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::warn;

/// Barrier ensuring all workers reach a synchronization point before any proceeds.
///
/// Points are identified by a sequence number that every worker advances
/// identically, so the barrier needs no knowledge of which collective is
/// running. The collective tag is only used for error reporting.
pub struct CollectiveBarrier {
    /// Number of workers expected at every point.
    worker_count: usize,
    /// Workers that have arrived, per sequence number.
    arrivals: Mutex<HashMap<u64, HashSet<WorkerId>>>,
    /// Notification channel for waiters.
    notify: Notify,
    /// Set once a member has left the group.
    closed: AtomicBool,
    /// How long a worker may wait for its peers; `None` blocks forever.
    timeout: Option<Duration>,
}

impl CollectiveBarrier {
    /// Create a barrier that waits indefinitely.
    pub fn new(worker_count: usize) -> Self {
        Self::with_timeout(worker_count, None)
    }

    /// Create a barrier that fails a stalled wait after `timeout`.
    pub fn with_timeout(worker_count: usize, timeout: Option<Duration>) -> Self {
        Self {
            worker_count,
            arrivals: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            timeout,
        }
    }

    /// Number of workers expected at every point.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Record that `worker` reached point `sequence`.
    pub async fn arrive(&self, worker: WorkerId, sequence: u64) {
        let mut arrivals = self.arrivals.lock().await;
        arrivals.entry(sequence).or_default().insert(worker);
        drop(arrivals);

        // Notify all waiters that progress was made
        self.notify.notify_waiters();
    }

    /// Get the number of workers that have reached a point.
    pub async fn arrived_count(&self, sequence: u64) -> usize {
        let arrivals = self.arrivals.lock().await;
        arrivals.get(&sequence).map_or(0, |set| set.len())
    }

    /// Get all workers that have NOT reached a point yet.
    pub async fn pending_workers(&self, sequence: u64) -> Vec<WorkerId> {
        let arrivals = self.arrivals.lock().await;
        let arrived = arrivals.get(&sequence);
        (0..self.worker_count as u32)
            .map(WorkerId::new)
            .filter(|w| !arrived.is_some_and(|set| set.contains(w)))
            .collect()
    }

    /// Wait for every worker to reach point `sequence`.
    ///
    /// # Errors
    ///
    /// - `DistributedError::CollectiveTimeout` if the timeout elapses first
    /// - `DistributedError::PeerDisconnected` if a member left the group
    ///   before arriving
    pub async fn wait_all(&self, op: CollectiveOp, sequence: u64) -> DistributedResult<()> {
        let wait = async {
            loop {
                // Register interest before checking so a concurrent arrival
                // between the check and the await is not lost.
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.arrived_count(sequence).await >= self.worker_count {
                    return Ok(());
                }
                if self.closed.load(Ordering::SeqCst) {
                    return Err(DistributedError::PeerDisconnected(op));
                }

                notified.await;
            }
        };

        let Some(timeout) = self.timeout else {
            return wait.await;
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                let pending = self.pending_workers(sequence).await;
                warn!(%op, sequence, ?pending, "Collective timed out");
                Err(DistributedError::CollectiveTimeout {
                    op,
                    sequence,
                    pending,
                })
            }
        }
    }

    /// Arrive at `sequence` and wait for the rest of the group.
    ///
    /// Records older than `sequence` are discarded on success: every worker
    /// has already left them behind.
    pub async fn arrive_and_wait(
        &self,
        worker: WorkerId,
        op: CollectiveOp,
        sequence: u64,
    ) -> DistributedResult<()> {
        self.arrive(worker, sequence).await;
        self.wait_all(op, sequence).await?;

        let mut arrivals = self.arrivals.lock().await;
        arrivals.retain(|&seq, _| seq >= sequence);
        Ok(())
    }

    /// Mark the group as broken and wake every waiter.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_barrier_creation() {
        let barrier = CollectiveBarrier::new(3);
        assert_eq!(barrier.worker_count(), 3);
        assert!(!barrier.is_closed());
    }

    #[tokio::test]
    async fn test_arrival_tracking() {
        let barrier = CollectiveBarrier::new(2);

        barrier.arrive(WorkerId::new(0), 1).await;
        assert_eq!(barrier.arrived_count(1).await, 1);
        assert_eq!(barrier.pending_workers(1).await, vec![WorkerId::new(1)]);

        barrier.arrive(WorkerId::new(1), 1).await;
        assert_eq!(barrier.arrived_count(1).await, 2);
        assert!(barrier.pending_workers(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_wait_all_completes() {
        let barrier = Arc::new(CollectiveBarrier::with_timeout(
            2,
            Some(Duration::from_secs(5)),
        ));
        let barrier_ref = barrier.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            barrier_ref.arrive(WorkerId::new(0), 1).await;
            barrier_ref.arrive(WorkerId::new(1), 1).await;
        });

        barrier.wait_all(CollectiveOp::Barrier, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_all_times_out() {
        let barrier = CollectiveBarrier::with_timeout(2, Some(Duration::from_millis(20)));
        barrier.arrive(WorkerId::new(0), 4).await;

        let err = barrier
            .wait_all(CollectiveOp::AllReduceSum, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DistributedError::CollectiveTimeout {
                op: CollectiveOp::AllReduceSum,
                sequence: 4,
                ref pending,
            } if pending == &vec![WorkerId::new(1)]
        ));
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let barrier = Arc::new(CollectiveBarrier::new(2));
        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier
                    .arrive_and_wait(WorkerId::new(0), CollectiveOp::Gather, 0)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        barrier.close();

        let result = waiter.await.unwrap();
        assert!(matches!(
            result,
            Err(DistributedError::PeerDisconnected(CollectiveOp::Gather))
        ));
    }

    #[tokio::test]
    async fn test_completed_point_survives_close() {
        let barrier = CollectiveBarrier::new(1);
        barrier.arrive(WorkerId::new(0), 0).await;
        barrier.close();
        barrier.wait_all(CollectiveOp::Barrier, 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_old_points_are_pruned() {
        let barrier = CollectiveBarrier::new(1);
        for seq in 0..5 {
            barrier
                .arrive_and_wait(WorkerId::new(0), CollectiveOp::Barrier, seq)
                .await
                .unwrap();
        }
        assert_eq!(barrier.arrived_count(3).await, 0);
        assert_eq!(barrier.arrived_count(4).await, 1);
    }
}
