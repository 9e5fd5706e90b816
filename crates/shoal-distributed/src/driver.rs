//! Simulation driver.
//!
//! Runs one rank through a whole simulation:
//!
//! ```text
//! Uninitialized --scatter--> Scattered --step--> Stepping --gather--> Gathered --finish--> Done
//!                                |                 ^    |
//!                                |                 +----+ step
//!                                +----------gather----------^
//! ```
//!
//! Every step performs exactly two collectives, whatever the population
//! size or worker count:
//!
//! 1. each rank sums `(distance, distance × weight)` over its slice;
//! 2. **all-reduce sum**: every rank gets the population-wide pair and
//!    derives the diagnostic barycentre;
//! 3. each rank swims its slice, tracking its largest delta;
//! 4. **all-reduce max**: every rank gets the population-wide maximum;
//! 5. each rank feeds its slice with that maximum, unless nobody moved.
//!
//! Any collective failure aborts the run on every rank.

use crate::aggregator::GlobalAggregator;
use crate::channel::DistributionChannel;
use crate::config::RunConfig;
use crate::group::Communicator;
use crate::partition::PartitionTable;
use crate::role::Role;
use crate::schema::WireSchema;
use crate::store::LocalStore;
use crate::types::*;
use shoal_core::kernels::LocalKernels;
use shoal_core::types::{Agent, Domain, Step};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    Uninitialized,
    Scattered,
    Stepping,
    Gathered,
    Done,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Uninitialized => write!(f, "Uninitialized"),
            DriverState::Scattered => write!(f, "Scattered"),
            DriverState::Stepping => write!(f, "Stepping"),
            DriverState::Gathered => write!(f, "Gathered"),
            DriverState::Done => write!(f, "Done"),
        }
    }
}

/// What a rank is left with after [`Driver::finish`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub rank: WorkerId,
    pub state: DriverState,
    /// One report per completed step, identical on every rank.
    pub reports: Vec<StepReport>,
    /// The merged school; only the coordinator has one.
    pub population: Option<Vec<Agent>>,
}

impl RunOutcome {
    pub fn steps(&self) -> usize {
        self.reports.len()
    }

    pub fn last_report(&self) -> Option<&StepReport> {
        self.reports.last()
    }
}

/// Drives one rank of the process group.
pub struct Driver<C: Communicator> {
    comm: C,
    role: Role,
    state: DriverState,
    channel: DistributionChannel,
    aggregator: GlobalAggregator,
    store: LocalStore,
    kernels: Arc<dyn LocalKernels>,
    domain: Domain,
    seed: u64,
    steps: u64,
    step: Step,
    reports: Vec<StepReport>,
    progress: Option<mpsc::UnboundedSender<StepReport>>,
}

impl<C: Communicator> Driver<C> {
    /// Build the driver for `comm`'s rank.
    ///
    /// The schema and partition table are shared by every rank of the group;
    /// the local store is sized from the table, never from the data.
    ///
    /// # Errors
    ///
    /// - `DistributedError::Protocol` if the group and the table disagree on
    ///   the worker count
    /// - configuration errors from `config`
    pub fn new(
        comm: C,
        role: Role,
        schema: Arc<WireSchema>,
        table: Arc<PartitionTable>,
        config: &RunConfig,
    ) -> DistributedResult<Self> {
        if comm.size() != table.worker_count() {
            return Err(DistributedError::Protocol {
                op: CollectiveOp::Scatter,
                reason: format!(
                    "group has {} workers, partition table has {}",
                    comm.size(),
                    table.worker_count()
                ),
            });
        }

        let rank = comm.rank();
        let store = LocalStore::new(rank, table.size(rank), config.threads_per_worker)?;
        let kernels: Arc<dyn LocalKernels> = Arc::new(config.kernels()?);

        Ok(Self {
            comm,
            role,
            state: DriverState::Uninitialized,
            channel: DistributionChannel::new(schema.clone(), table),
            aggregator: GlobalAggregator::new(schema),
            store,
            kernels,
            domain: config.domain()?,
            seed: config.seed,
            steps: config.simulation_steps,
            step: 0,
            reports: Vec::new(),
            progress: None,
        })
    }

    /// Replace the default school kernels.
    pub fn with_kernels(mut self, kernels: Arc<dyn LocalKernels>) -> Self {
        self.kernels = kernels;
        self
    }

    /// Stream every step report to `sender` as it is produced.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<StepReport>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn rank(&self) -> WorkerId {
        self.comm.rank()
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Steps completed so far.
    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    fn transition(&mut self, allowed: &[DriverState], to: DriverState) -> DistributedResult<()> {
        if !allowed.contains(&self.state) {
            return Err(DistributedError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(rank = %self.rank(), from = %self.state, to = %to, "Driver transition");
        self.state = to;
        Ok(())
    }

    /// Distribute the coordinator's population.
    #[instrument(skip(self), fields(rank = %self.comm.rank()))]
    pub async fn scatter(&mut self) -> DistributedResult<()> {
        self.transition(&[DriverState::Uninitialized], DriverState::Scattered)?;

        let source = match &mut self.role {
            Role::Coordinator(coordinator) => Some(std::mem::take(coordinator).into_population()),
            Role::Worker => None,
        };
        let local = self.channel.scatter(&mut self.comm, source.as_deref()).await?;
        self.store.load(local)?;

        info!(
            "{} holds {} agents on {} threads",
            self.role,
            self.store.len(),
            self.store.threads()
        );
        Ok(())
    }

    /// Run one swim/eat step.
    pub async fn step(&mut self) -> DistributedResult<StepReport> {
        self.transition(
            &[DriverState::Scattered, DriverState::Stepping],
            DriverState::Stepping,
        )?;
        let step = self.step;

        let local_pair = self.store.local_pair();
        let global_pair = self
            .aggregator
            .all_reduce_sum_pair(&mut self.comm, local_pair)
            .await?;
        let barycentre = global_pair.barycentre();

        let local_max = self
            .store
            .swim_all(self.kernels.as_ref(), &self.domain, self.seed, step);
        let max_delta = self
            .aggregator
            .all_reduce_max(&mut self.comm, local_max)
            .await?;

        let eat_applied = match max_delta.divisor() {
            Some(max) => {
                self.store.eat_all(self.kernels.as_ref(), max);
                true
            }
            None => {
                debug!(step, ?max_delta, "Nobody moved, skipping eat");
                false
            }
        };

        let report = StepReport {
            step,
            global_pair,
            barycentre,
            max_delta,
            eat_applied,
        };
        debug!(
            step,
            distance = global_pair.distance,
            weighted_distance = global_pair.weighted_distance,
            ?barycentre,
            ?max_delta,
            "Step complete"
        );

        if let Some(progress) = &self.progress {
            if progress.send(report.clone()).is_err() {
                debug!("Progress receiver dropped");
                self.progress = None;
            }
        }
        self.reports.push(report.clone());
        self.step += 1;
        Ok(report)
    }

    /// Merge every slice back into the coordinator.
    #[instrument(skip(self), fields(rank = %self.comm.rank()))]
    pub async fn gather(&mut self) -> DistributedResult<()> {
        self.transition(
            &[DriverState::Scattered, DriverState::Stepping],
            DriverState::Gathered,
        )?;

        let local = self.store.take();
        let merged = self.channel.gather(&mut self.comm, &local).await?;

        match (&mut self.role, merged) {
            (Role::Coordinator(coordinator), Some(population)) => {
                info!("Gathered {} agents", population.len());
                coordinator.replace_population(population);
            }
            (Role::Worker, None) => {}
            (role, merged) => {
                warn!(%role, merged = merged.is_some(), "Gather result does not match role");
                return Err(DistributedError::Protocol {
                    op: CollectiveOp::Gather,
                    reason: format!("{} received an unexpected gather result", role),
                });
            }
        }
        Ok(())
    }

    /// Close the run and hand back the results.
    pub fn finish(mut self) -> DistributedResult<RunOutcome> {
        self.transition(&[DriverState::Gathered], DriverState::Done)?;
        Ok(RunOutcome {
            rank: self.comm.rank(),
            state: self.state,
            reports: std::mem::take(&mut self.reports),
            population: std::mem::replace(&mut self.role, Role::Worker)
                .into_coordinator()
                .map(|c| c.into_population()),
        })
    }

    /// Scatter, run every configured step, gather and finish.
    pub async fn run(mut self) -> DistributedResult<RunOutcome> {
        let rank = self.rank();
        info!(%rank, role = %self.role, steps = self.steps, "Starting run");

        self.scatter().await?;
        for _ in 0..self.steps {
            self.step().await?;
        }
        self.gather().await?;

        let outcome = self.finish()?;
        info!(%rank, steps = outcome.steps(), "Run complete");
        Ok(outcome)
    }
}
