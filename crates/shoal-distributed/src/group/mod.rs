//! Process-group collectives.
//!
//! A process group is a fixed set of workers with stable ranks
//! `0..size`, rank 0 being the coordinator. Workers only talk to each other
//! through the collective operations of [`Communicator`]; every member must
//! enter the same collectives in the same order.
//!
//! # Example
//!
//! ```rust,ignore
//! use shoal_distributed::group::{Communicator, LocalGroup};
//!
//! let group = LocalGroup::new(3, None)?;
//! for mut comm in group.into_members() {
//!     tokio::spawn(async move {
//!         let total = comm.all_reduce_sum(vec![1.0, 2.0]).await?;
//!         assert_eq!(total, vec![3.0, 6.0]);
//!         Ok::<_, DistributedError>(())
//!     });
//! }
//! ```

mod barrier;
mod local;

pub use barrier::CollectiveBarrier;
pub use local::{LocalComm, LocalGroup};

use crate::types::{DistributedResult, MaxDelta, WorkerId};
use async_trait::async_trait;

/// Encoded bytes exchanged between workers.
pub type Frame = Vec<u8>;

/// Collective operations of a process group.
///
/// All operations are blocking collectives: a call returns only once every
/// member of the group has entered the same call. A member that never
/// arrives stalls the group; a member that leaves fails it.
#[async_trait]
pub trait Communicator: Send {
    /// This member's rank.
    fn rank(&self) -> WorkerId;

    /// Number of members in the group.
    fn size(&self) -> usize;

    /// Distribute one frame per rank from `root`.
    ///
    /// Only `root` supplies `frames` (indexed by rank); every member,
    /// including `root`, receives its own frame.
    async fn scatter(&mut self, root: WorkerId, frames: Option<Vec<Frame>>)
        -> DistributedResult<Frame>;

    /// Collect every member's frame on `root`, in rank order.
    ///
    /// Returns `Some` on `root` and `None` everywhere else.
    async fn gather(&mut self, root: WorkerId, frame: Frame)
        -> DistributedResult<Option<Vec<Frame>>>;

    /// Element-wise sum of every member's vector, visible on every member.
    async fn all_reduce_sum(&mut self, values: Vec<f64>) -> DistributedResult<Vec<f64>>;

    /// Maximum of every member's accumulator, visible on every member.
    async fn all_reduce_max(&mut self, value: MaxDelta) -> DistributedResult<MaxDelta>;

    /// Pure synchronization point.
    async fn barrier(&mut self) -> DistributedResult<()>;
}
