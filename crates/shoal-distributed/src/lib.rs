//! # Shoal Distributed
//!
//! Runs a school of agents split across a group of cooperating workers.
//! Each worker owns one contiguous slice of the population and updates it
//! on its own thread pool; the workers stay in lock-step through two global
//! reductions per step, whatever the population size.
//!
//! ```text
//! Coordinator seeds ──scatter──> LocalStore per worker
//!                                   │  local pair ──all-reduce sum──┐
//!                                   │  swim       ──all-reduce max──┤ every step
//!                                   │  eat  <───────────────────────┘
//! Coordinator output <──gather──────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use shoal_distributed::{Coordinator, LocalCluster, RunConfig};
//!
//! # async fn demo() -> Result<(), shoal_distributed::DistributedError> {
//! let config = RunConfig::new(10_000).with_workers(4).with_steps(50).with_seed(1);
//! let population = Coordinator::seeded(&config)?.into_population();
//!
//! let outcome = LocalCluster::new(config)?.run(population).await?;
//! println!("final barycentre: {:?}", outcome.last_report().and_then(|r| r.barycentre));
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod channel;
pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod group;
pub mod partition;
pub mod role;
pub mod schema;
pub mod store;
pub mod types;

pub use aggregator::GlobalAggregator;
pub use channel::DistributionChannel;
pub use cluster::LocalCluster;
pub use config::RunConfig;
pub use coordinator::Coordinator;
pub use driver::{Driver, DriverState, RunOutcome};
pub use group::{CollectiveBarrier, Communicator, Frame, LocalComm, LocalGroup};
pub use partition::{partition, PartitionTable, Slice};
pub use role::Role;
pub use schema::WireSchema;
pub use store::{LocalStore, CHUNK_SIZE};
pub use types::*;
