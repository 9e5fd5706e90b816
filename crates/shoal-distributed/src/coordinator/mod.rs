//! The coordinator role.
//!
//! Rank 0 owns the whole school twice: before the first scatter, when it
//! seeds the population, and after the final gather, when it writes it out.
//! In between it is an ordinary worker holding its own slice.

use crate::config::RunConfig;
use crate::types::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shoal_core::error::ShoalError;
use shoal_core::types::Agent;
use std::io::Write;
use tracing::info;

/// Seed, scatter source, gather sink and output writer.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    population: Vec<Agent>,
}

impl Coordinator {
    /// Coordinator owning an already seeded population.
    pub fn new(population: Vec<Agent>) -> Self {
        Self { population }
    }

    /// Seed `config.population_size` agents from `config.seed`.
    pub fn seeded(config: &RunConfig) -> DistributedResult<Self> {
        let seeder = config.seeder()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let population = seeder.seed(config.population_size, &mut rng);

        info!(
            agents = population.len(),
            seed = config.seed,
            "Seeded population"
        );
        Ok(Self::new(population))
    }

    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    pub fn into_population(self) -> Vec<Agent> {
        self.population
    }

    /// Install the population merged by the final gather.
    pub(crate) fn replace_population(&mut self, population: Vec<Agent>) {
        self.population = population;
    }

    /// Write one `x,y` line per agent, in population order.
    pub fn write_positions<W: Write>(&self, mut writer: W) -> DistributedResult<()> {
        for agent in &self.population {
            let p = agent.position();
            writeln!(writer, "{:.6},{:.6}", p.x, p.y).map_err(ShoalError::from)?;
        }
        writer.flush().map_err(ShoalError::from)?;
        Ok(())
    }

    /// Write the full agent records as a JSON array.
    pub fn write_json<W: Write>(&self, mut writer: W) -> DistributedResult<()> {
        serde_json::to_writer_pretty(&mut writer, &self.population).map_err(ShoalError::from)?;
        writeln!(writer).map_err(ShoalError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::types::Position;

    #[test]
    fn test_seeded_population_is_reproducible() {
        let config = RunConfig::new(25).with_seed(7).with_lake(10.0, 10.0);
        let a = Coordinator::seeded(&config).unwrap();
        let b = Coordinator::seeded(&config).unwrap();
        assert_eq!(a.len(), 25);
        assert_eq!(a.population(), b.population());

        let domain = config.domain().unwrap();
        assert!(a.population().iter().all(|f| domain.contains(&f.position())));
    }

    #[test]
    fn test_write_positions() {
        let coordinator = Coordinator::new(vec![
            Agent::new(Position::new(1.0, -2.5), 10.0),
            Agent::new(Position::new(0.125, 3.0), 10.0),
        ]);
        let mut out = Vec::new();
        coordinator.write_positions(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1.000000,-2.500000\n0.125000,3.000000\n"
        );
    }

    #[test]
    fn test_write_json() {
        let coordinator = Coordinator::new(vec![Agent::new(Position::new(1.0, 0.0), 12.0)]);
        let mut out = Vec::new();
        coordinator.write_json(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert_eq!(value[0]["weight"], 12.0);
    }

    #[test]
    fn test_empty_output() {
        let mut out = Vec::new();
        Coordinator::default().write_positions(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
