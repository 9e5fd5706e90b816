//! Population seeding.
//!
//! A school is created once, on the coordinator, before the first scatter.
//! Positions are uniform over the domain and initial weights uniform over a
//! configured range.

use crate::error::{Result, ShoalError};
use crate::types::{Agent, Domain, Position, WeightLimits};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest initial weight drawn by default.
pub const DEFAULT_INITIAL_WEIGHT_MIN: f64 = 10.0;

/// Largest initial weight drawn by default.
pub const DEFAULT_INITIAL_WEIGHT_MAX: f64 = 20_000.0;

/// Samples fresh agents inside a domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationSeeder {
    domain: Domain,
    initial_weight_min: f64,
    initial_weight_max: f64,
}

impl PopulationSeeder {
    /// Create a seeder whose every initial weight satisfies `limits`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidValue` for a non-positive or inverted range
    /// - `ConfigError::OutOfRange` if `initial_weight_min` sits below the
    ///   weight floor
    pub fn new(
        domain: Domain,
        limits: &WeightLimits,
        initial_weight_min: f64,
        initial_weight_max: f64,
    ) -> Result<Self> {
        if !initial_weight_min.is_finite() || initial_weight_min <= 0.0 {
            return Err(ShoalError::invalid_config(
                "initial_weight_min",
                initial_weight_min.to_string(),
                "must be a positive number",
            ));
        }
        if !initial_weight_max.is_finite() || initial_weight_max < initial_weight_min {
            return Err(ShoalError::invalid_config(
                "initial_weight_max",
                initial_weight_max.to_string(),
                format!("must be at least initial_weight_min ({})", initial_weight_min),
            ));
        }
        if !limits.admits(initial_weight_min) {
            return Err(ShoalError::out_of_range(
                "initial_weight_min",
                initial_weight_min,
                limits.floor,
                initial_weight_max,
            ));
        }
        Ok(Self {
            domain,
            initial_weight_min,
            initial_weight_max,
        })
    }

    /// Seeder with the default weight range, admitted by the default limits.
    pub fn with_default_weights(domain: Domain) -> Self {
        Self {
            domain,
            initial_weight_min: DEFAULT_INITIAL_WEIGHT_MIN,
            initial_weight_max: DEFAULT_INITIAL_WEIGHT_MAX,
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Draw a single agent.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Agent {
        let position = Position::new(
            rng.gen_range(self.domain.min_x..=self.domain.max_x),
            rng.gen_range(self.domain.min_y..=self.domain.max_y),
        );
        let weight = rng.gen_range(self.initial_weight_min..=self.initial_weight_max);
        Agent::new(position, weight)
    }

    /// Draw `count` independent agents.
    pub fn seed<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Agent> {
        (0..count).map(|_| self.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_seed_inside_domain_and_weight_range() {
        let domain = Domain::centred(200.0, 200.0).unwrap();
        let seeder = PopulationSeeder::with_default_weights(domain);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let agents = seeder.seed(1_000, &mut rng);

        assert_eq!(agents.len(), 1_000);
        for agent in &agents {
            assert!(domain.contains(&agent.position()));
            assert!(agent.initial_weight() >= DEFAULT_INITIAL_WEIGHT_MIN);
            assert!(agent.initial_weight() <= DEFAULT_INITIAL_WEIGHT_MAX);
            assert_eq!(agent.weight(), agent.initial_weight());
            assert_eq!(agent.delta(), 0.0);
            assert_eq!(
                agent.distance_from_origin(),
                agent.position().distance_from_origin()
            );
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let seeder = PopulationSeeder::with_default_weights(Domain::centred(10.0, 10.0).unwrap());
        let a = seeder.seed(32, &mut ChaCha8Rng::seed_from_u64(99));
        let b = seeder.seed(32, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_empty() {
        let seeder = PopulationSeeder::with_default_weights(Domain::centred(1.0, 1.0).unwrap());
        assert!(seeder.seed(0, &mut ChaCha8Rng::seed_from_u64(0)).is_empty());
    }

    #[test]
    fn test_rejects_inverted_weight_range() {
        let domain = Domain::centred(1.0, 1.0).unwrap();
        let limits = WeightLimits::default();
        assert!(PopulationSeeder::new(domain, &limits, 50.0, 10.0).is_err());
        assert!(PopulationSeeder::new(domain, &limits, 0.0, 10.0).is_err());
        assert!(PopulationSeeder::new(domain, &limits, 10.0, 10.0).is_ok());
    }

    #[test]
    fn test_rejects_range_below_floor() {
        let domain = Domain::centred(1.0, 1.0).unwrap();
        let limits = WeightLimits::default();

        let err = PopulationSeeder::new(domain, &limits, 1.0, 2.0).unwrap_err();
        assert!(matches!(
            err,
            ShoalError::Config(crate::error::ConfigError::OutOfRange { ref field, .. })
                if field == "initial_weight_min"
        ));

        let seeder = PopulationSeeder::new(domain, &limits, 10.0, 15.0).unwrap();
        for agent in seeder.seed(200, &mut ChaCha8Rng::seed_from_u64(4)) {
            assert!(agent.weight() >= limits.floor);
            assert!(agent.weight() <= limits.ceiling(agent.initial_weight()));
        }
    }
}
