//! In-process cluster.
//!
//! Stands up a whole process group inside one tokio runtime: one task per
//! rank, each running its own [`Driver`] over a [`LocalComm`]. Useful for
//! the CLI and for tests; a networked deployment would swap the
//! communicator and keep everything else.

use crate::config::RunConfig;
use crate::driver::{Driver, RunOutcome};
use crate::group::{Communicator, LocalComm, LocalGroup};
use crate::partition::PartitionTable;
use crate::role::Role;
use crate::schema::WireSchema;
use crate::types::*;
use futures::future::join_all;
use shoal_core::kernels::LocalKernels;
use shoal_core::types::Agent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Runs a configured simulation on an in-process group.
pub struct LocalCluster {
    config: RunConfig,
    kernels: Option<Arc<dyn LocalKernels>>,
}

impl LocalCluster {
    /// Validate `config` and prepare a cluster.
    ///
    /// # Errors
    ///
    /// Every configuration error, before any task is spawned.
    pub fn new(config: RunConfig) -> DistributedResult<Self> {
        config.validate()?;
        if config.workers == 1 {
            warn!("Single worker run degenerates to a local-only loop");
        }
        Ok(Self {
            config,
            kernels: None,
        })
    }

    /// Use custom kernels on every rank.
    pub fn with_kernels(mut self, kernels: Arc<dyn LocalKernels>) -> Self {
        self.kernels = Some(kernels);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Partition table this cluster will use.
    pub fn partition_table(&self) -> DistributedResult<PartitionTable> {
        PartitionTable::new(self.config.workers, self.config.population_size)
    }

    /// Run `population` to completion and return the coordinator's outcome.
    pub async fn run(&self, population: Vec<Agent>) -> DistributedResult<RunOutcome> {
        self.run_with_progress(population, None).await
    }

    /// Like [`run`](Self::run), streaming the coordinator's step reports.
    pub async fn run_with_progress(
        &self,
        population: Vec<Agent>,
        progress: Option<mpsc::UnboundedSender<StepReport>>,
    ) -> DistributedResult<RunOutcome> {
        if population.len() != self.config.population_size {
            return Err(shoal_core::error::ShoalError::invalid_config(
                "population_size",
                self.config.population_size.to_string(),
                format!("population has {} agents", population.len()),
            )
            .into());
        }

        let schema = Arc::new(WireSchema::new()?);
        debug!(
            record_size = schema.record_size(),
            fields = ?schema.fields().iter().map(|f| f.name).collect::<Vec<_>>(),
            "Wire schema ready"
        );
        let table = Arc::new(self.partition_table()?);
        let group = LocalGroup::new(self.config.workers, self.config.collective_timeout())?;
        info!(
            workers = self.config.workers,
            agents = population.len(),
            sizes = ?table.sizes(),
            "Starting local cluster"
        );

        let mut population = Some(population);
        let mut progress = progress;
        let mut handles = Vec::with_capacity(self.config.workers);
        for comm in group.into_members() {
            let driver = self.driver(comm, &mut population, &mut progress, &schema, &table)?;
            handles.push(tokio::spawn(driver.run()));
        }

        let mut coordinator = None;
        let mut first_error = None;
        for (rank, joined) in join_all(handles).await.into_iter().enumerate() {
            let result = joined.map_err(|e| DistributedError::WorkerPanicked(e.to_string()));
            match result.and_then(|r| r) {
                Ok(outcome) if outcome.rank.is_coordinator() => coordinator = Some(outcome),
                Ok(_) => {}
                Err(e) => {
                    error!(rank, "Worker failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        coordinator.ok_or_else(|| {
            DistributedError::WorkerPanicked("coordinator produced no outcome".to_string())
        })
    }

    fn driver(
        &self,
        comm: LocalComm,
        population: &mut Option<Vec<Agent>>,
        progress: &mut Option<mpsc::UnboundedSender<StepReport>>,
        schema: &Arc<WireSchema>,
        table: &Arc<PartitionTable>,
    ) -> DistributedResult<Driver<LocalComm>> {
        let rank = comm.rank();
        let source = if rank.is_coordinator() {
            population.take()
        } else {
            None
        };
        let role = Role::select(rank, source)?;

        let mut driver = Driver::new(comm, role, schema.clone(), table.clone(), &self.config)?;
        if let Some(kernels) = &self.kernels {
            driver = driver.with_kernels(kernels.clone());
        }
        if rank.is_coordinator() {
            if let Some(sender) = progress.take() {
                driver = driver.with_progress(sender);
            }
        }
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;

    #[tokio::test]
    async fn test_population_must_match_config() {
        let cluster = LocalCluster::new(RunConfig::new(5).with_workers(2)).unwrap();
        let err = cluster.run(Vec::new()).await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_up_front() {
        assert!(LocalCluster::new(RunConfig::new(0)).is_err());
        assert!(LocalCluster::new(RunConfig::new(3).with_workers(0)).is_err());
        assert!(LocalCluster::new(RunConfig::new(3).with_initial_weights(1.0, 2.0)).is_err());
        assert!(LocalCluster::new(RunConfig::new(3).with_swim_step(f64::MAX)).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_weights_seeded_at_floor_stay_within_limits() {
        let config = RunConfig::new(50)
            .with_workers(2)
            .with_steps(3)
            .with_threads_per_worker(1)
            .with_initial_weights(10.0, 12.0)
            .with_seed(17);
        let limits = config.weight_limits().unwrap();
        let population = Coordinator::seeded(&config).unwrap().into_population();
        let cluster = LocalCluster::new(config).unwrap();

        let population = cluster.run(population).await.unwrap().population.unwrap();
        for agent in &population {
            assert!(agent.weight() >= limits.floor);
            assert!(agent.weight() <= limits.ceiling(agent.initial_weight()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_small_run() {
        let config = RunConfig::new(10)
            .with_workers(3)
            .with_steps(4)
            .with_threads_per_worker(1)
            .with_seed(5);
        let population = Coordinator::seeded(&config).unwrap().into_population();
        let cluster = LocalCluster::new(config).unwrap();

        let outcome = cluster.run(population).await.unwrap();
        assert!(outcome.rank.is_coordinator());
        assert_eq!(outcome.steps(), 4);
        assert_eq!(outcome.population.map(|p| p.len()), Some(10));
    }
}
