//! Run configuration.

use crate::types::{DistributedError, DistributedResult};
use serde::{Deserialize, Serialize};
use shoal_core::error::ShoalError;
use shoal_core::kernels::SchoolKernels;
use shoal_core::population::{
    PopulationSeeder, DEFAULT_INITIAL_WEIGHT_MAX, DEFAULT_INITIAL_WEIGHT_MIN,
};
use shoal_core::types::{
    Domain, WeightLimits, DEFAULT_MAX_WEIGHT_SCALE, DEFAULT_SWIM_STEP, DEFAULT_WEIGHT_FLOOR,
};
use std::time::Duration;

pub const DEFAULT_SIMULATION_STEPS: u64 = 100;
pub const DEFAULT_LAKE_SIZE: f64 = 200.0;
pub const DEFAULT_WORKERS: usize = 4;

/// Everything a run needs, shared verbatim by every worker.
///
/// Every field is validated by [`RunConfig::validate`] before the process
/// group is created, so a bad configuration never leaves a half-started run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of agents in the school.
    pub population_size: usize,
    /// Number of swim/eat steps.
    pub simulation_steps: u64,
    /// Lake width; the domain is centred on the origin.
    pub lake_width: f64,
    /// Lake height; the domain is centred on the origin.
    pub lake_height: f64,
    /// Number of workers in the process group.
    pub workers: usize,
    /// Threads per worker (0 = one per core).
    pub threads_per_worker: usize,
    /// Seed for the population and every swim.
    pub seed: u64,
    /// Half-width of the uniform swim perturbation.
    pub swim_step: f64,
    pub weight_floor: f64,
    pub max_weight_scale: f64,
    pub initial_weight_min: f64,
    pub initial_weight_max: f64,
    /// Collective timeout in milliseconds; `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collective_timeout_ms: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population_size: 0,
            simulation_steps: DEFAULT_SIMULATION_STEPS,
            lake_width: DEFAULT_LAKE_SIZE,
            lake_height: DEFAULT_LAKE_SIZE,
            workers: DEFAULT_WORKERS,
            threads_per_worker: 0,
            seed: 0,
            swim_step: DEFAULT_SWIM_STEP,
            weight_floor: DEFAULT_WEIGHT_FLOOR,
            max_weight_scale: DEFAULT_MAX_WEIGHT_SCALE,
            initial_weight_min: DEFAULT_INITIAL_WEIGHT_MIN,
            initial_weight_max: DEFAULT_INITIAL_WEIGHT_MAX,
            collective_timeout_ms: None,
        }
    }
}

impl RunConfig {
    /// Default configuration for a school of `population_size` agents.
    pub fn new(population_size: usize) -> Self {
        Self {
            population_size,
            ..Default::default()
        }
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.simulation_steps = steps;
        self
    }

    pub fn with_lake(mut self, width: f64, height: f64) -> Self {
        self.lake_width = width;
        self.lake_height = height;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_threads_per_worker(mut self, threads: usize) -> Self {
        self.threads_per_worker = threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_swim_step(mut self, swim_step: f64) -> Self {
        self.swim_step = swim_step;
        self
    }

    pub fn with_weight_limits(mut self, floor: f64, max_scale: f64) -> Self {
        self.weight_floor = floor;
        self.max_weight_scale = max_scale;
        self
    }

    pub fn with_initial_weights(mut self, min: f64, max: f64) -> Self {
        self.initial_weight_min = min;
        self.initial_weight_max = max;
        self
    }

    pub fn with_collective_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.collective_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Reject any configuration that cannot run.
    ///
    /// # Errors
    ///
    /// - `DistributedError::InvalidWorkerCount` if `workers` is 0
    /// - `DistributedError::Config` for every other invalid field
    pub fn validate(&self) -> DistributedResult<()> {
        if self.population_size == 0 {
            return Err(ShoalError::invalid_config(
                "population_size",
                "0",
                "must be a positive integer",
            )
            .into());
        }
        if self.simulation_steps == 0 {
            return Err(ShoalError::invalid_config(
                "simulation_steps",
                "0",
                "must be a positive integer",
            )
            .into());
        }
        if self.workers < 1 {
            return Err(DistributedError::InvalidWorkerCount(self.workers));
        }
        if self.collective_timeout_ms == Some(0) {
            return Err(ShoalError::invalid_config(
                "collective_timeout_ms",
                "0",
                "must be positive, or absent to wait forever",
            )
            .into());
        }

        self.domain()?;
        self.kernels()?;
        self.seeder()?;
        Ok(())
    }

    /// The lake, centred on the origin.
    pub fn domain(&self) -> DistributedResult<Domain> {
        Ok(Domain::centred(self.lake_width, self.lake_height)?)
    }

    pub fn weight_limits(&self) -> DistributedResult<WeightLimits> {
        Ok(WeightLimits::new(self.weight_floor, self.max_weight_scale)?)
    }

    /// Kernels whose swim step fits the lake.
    pub fn kernels(&self) -> DistributedResult<SchoolKernels> {
        Ok(SchoolKernels::for_domain(
            self.swim_step,
            self.weight_limits()?,
            &self.domain()?,
        )?)
    }

    /// Seeder whose initial weights respect the weight limits.
    pub fn seeder(&self) -> DistributedResult<PopulationSeeder> {
        Ok(PopulationSeeder::new(
            self.domain()?,
            &self.weight_limits()?,
            self.initial_weight_min,
            self.initial_weight_max,
        )?)
    }

    pub fn collective_timeout(&self) -> Option<Duration> {
        self.collective_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new(500);
        assert_eq!(config.population_size, 500);
        assert_eq!(config.simulation_steps, 100);
        assert_eq!(config.workers, 4);
        assert_eq!(config.collective_timeout(), None);
        config.validate().unwrap();

        let domain = config.domain().unwrap();
        assert_eq!(domain.min_x, -100.0);
        assert_eq!(domain.max_y, 100.0);
    }

    #[test]
    fn test_builders() {
        let config = RunConfig::new(10)
            .with_steps(3)
            .with_workers(2)
            .with_threads_per_worker(1)
            .with_seed(42)
            .with_lake(20.0, 10.0)
            .with_collective_timeout(Some(Duration::from_millis(250)));

        assert_eq!(config.simulation_steps, 3);
        assert_eq!(config.workers, 2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.collective_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.domain().unwrap().max_x, 10.0);
    }

    #[test]
    fn test_non_positive_counts_rejected() {
        assert!(RunConfig::new(0).validate().unwrap_err().is_config());
        assert!(RunConfig::new(5).with_steps(0).validate().unwrap_err().is_config());
        assert!(matches!(
            RunConfig::new(5).with_workers(0).validate(),
            Err(DistributedError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn test_invalid_geometry_and_weights_rejected() {
        assert!(RunConfig::new(5).with_lake(0.0, 10.0).validate().is_err());
        assert!(RunConfig::new(5).with_swim_step(f64::NAN).validate().is_err());
        assert!(RunConfig::new(5).with_initial_weights(50.0, 5.0).validate().is_err());
        assert!(RunConfig::new(5)
            .with_collective_timeout(Some(Duration::ZERO))
            .validate()
            .is_err());
    }

    #[test]
    fn test_initial_weights_below_floor_rejected() {
        let config = RunConfig::new(50)
            .with_workers(2)
            .with_steps(3)
            .with_initial_weights(1.0, 2.0);
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("initial_weight_min"), "{}", err);

        // Matching the floor is allowed.
        RunConfig::new(50)
            .with_weight_limits(1.0, 2.0)
            .with_initial_weights(1.0, 2.0)
            .validate()
            .unwrap();
        assert!(RunConfig::new(50).with_weight_limits(10.0, 0.5).validate().is_err());
    }

    #[test]
    fn test_oversized_swim_step_rejected() {
        let err = RunConfig::new(5).with_swim_step(f64::MAX).validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("swim_step"), "{}", err);

        assert!(RunConfig::new(5).with_lake(2.0, 2.0).with_swim_step(1.5).validate().is_err());
        assert!(RunConfig::new(5).with_swim_step(-0.1).validate().is_err());
        RunConfig::new(5).with_lake(2.0, 2.0).with_swim_step(1.0).validate().unwrap();
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"population_size": 64, "workers": 2}"#).unwrap();
        assert_eq!(config.population_size, 64);
        assert_eq!(config.workers, 2);
        assert_eq!(config.simulation_steps, DEFAULT_SIMULATION_STEPS);
        assert_eq!(config.swim_step, DEFAULT_SWIM_STEP);
    }
}
