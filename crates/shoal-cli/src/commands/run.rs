//! Seed a school and run it on an in-process cluster.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use shoal_core::types::Agent;
use shoal_distributed::{Coordinator, LocalCluster, RunConfig, RunOutcome};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::{Config, OutputFormat};

/// Command-line overrides for a run.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub population: usize,
    pub steps: Option<u64>,
    pub workers: Option<usize>,
    pub threads: Option<usize>,
    pub seed: Option<u64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub timeout_ms: Option<u64>,
    pub output: Option<PathBuf>,
    pub initial_output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
}

impl RunArgs {
    /// Layer the overrides on top of the file configuration.
    pub fn apply(&self, file: &Config) -> RunConfig {
        let mut config = file.run.clone();
        config.population_size = self.population;
        if let Some(steps) = self.steps {
            config.simulation_steps = steps;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(threads) = self.threads {
            config.threads_per_worker = threads;
        }
        if let Some(width) = self.width {
            config.lake_width = width;
        }
        if let Some(height) = self.height {
            config.lake_height = height;
        }
        config.seed = self.seed.unwrap_or_else(clock_seed);
        config.collective_timeout_ms = self
            .timeout_ms
            .or(config.collective_timeout_ms)
            .or(Some(file.output.default_timeout_ms));
        config
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

pub fn run(args: RunArgs, file: Config, verbose: bool) -> Result<()> {
    let config = args.apply(&file);
    let format = args.format.unwrap_or(file.output.format);
    config.validate().context("Invalid configuration")?;

    if config.workers == 1 {
        warn!("Running with a single worker: no collectives cross a worker boundary");
    }

    println!(
        "{} Seeding {} agents (seed {})...",
        "→".blue(),
        config.population_size.to_string().cyan(),
        config.seed
    );
    let coordinator = Coordinator::seeded(&config)?;
    if let Some(path) = &args.initial_output {
        write_population(coordinator.population(), path, format)?;
        println!("  {} Wrote initial positions to {}", "✓".green(), path.display());
    }

    println!(
        "{} Running {} steps on {} workers...",
        "→".blue(),
        config.simulation_steps.to_string().cyan(),
        config.workers.to_string().cyan()
    );

    let pb = ProgressBar::new(config.simulation_steps);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} steps {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let cluster = LocalCluster::new(config.clone())?;
        let (tx, mut rx) = mpsc::unbounded_channel::<shoal_distributed::StepReport>();

        let progress = {
            let pb = pb.clone();
            tokio::spawn(async move {
                while let Some(report) = rx.recv().await {
                    if let Some(b) = report.barycentre {
                        pb.set_message(format!("barycentre {:.4}", b));
                    }
                    if verbose && !report.eat_applied {
                        pb.println(format!("  step {}: nobody moved, eat skipped", report.step));
                    }
                    pb.inc(1);
                }
            })
        };

        let outcome = cluster.run_with_progress(coordinator.into_population(), Some(tx)).await;
        // The sender is gone once the run ends, so this drains and stops.
        let _ = tokio::time::timeout(Duration::from_secs(5), progress).await;
        Ok::<_, anyhow::Error>(outcome?)
    })?;
    pb.finish_and_clear();

    print_summary(&outcome);

    if let Some(path) = &args.output {
        let population = outcome.population.as_deref().unwrap_or_default();
        write_population(population, path, format)?;
        println!("  {} Wrote final positions to {}", "✓".green(), path.display());
    }
    Ok(())
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    println!("{} Simulation complete!", "✓".green().bold());
    println!("  Steps: {}", outcome.steps().to_string().cyan());

    if let Some(report) = outcome.last_report() {
        match report.barycentre {
            Some(b) => println!("  Barycentre: {}", format!("{:.6}", b).green()),
            None => println!("  Barycentre: {}", "undefined".yellow()),
        }
        match report.max_delta.value() {
            Some(max) => println!("  Max delta: {}", format!("{:.6}", max).green()),
            None => println!("  Max delta: {}", "none".yellow()),
        }
    }

    if let Some(population) = &outcome.population {
        if !population.is_empty() {
            let total: f64 = population.iter().map(Agent::weight).sum();
            println!(
                "  Mean weight: {}",
                format!("{:.3}", total / population.len() as f64).green()
            );
        }
    }
}

fn write_population(agents: &[Agent], path: &Path, format: OutputFormat) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    let coordinator = Coordinator::new(agents.to_vec());
    let written = match format {
        OutputFormat::Csv => coordinator.write_positions(writer),
        OutputFormat::Json => coordinator.write_json(writer),
    };
    written.with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::types::Position;

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = Config::default();
        file.run.workers = 8;
        file.run.simulation_steps = 5;
        file.run.collective_timeout_ms = Some(100);

        let args = RunArgs {
            population: 64,
            workers: Some(2),
            seed: Some(3),
            ..Default::default()
        };
        let config = args.apply(&file);

        assert_eq!(config.population_size, 64);
        assert_eq!(config.workers, 2);
        assert_eq!(config.simulation_steps, 5);
        assert_eq!(config.seed, 3);
        assert_eq!(config.collective_timeout_ms, Some(100));
    }

    #[test]
    fn test_timeout_falls_back_to_default() {
        let args = RunArgs {
            population: 1,
            ..Default::default()
        };
        let config = args.apply(&Config::default());
        assert_eq!(config.collective_timeout_ms, Some(30_000));
    }

    #[test]
    fn test_zero_population_rejected() {
        let args = RunArgs {
            population: 0,
            seed: Some(1),
            ..Default::default()
        };
        assert!(run(args, Config::default(), false).is_err());
    }

    #[test]
    fn test_write_population_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let agents = vec![
            Agent::new(Position::new(0.5, -0.5), 10.0),
            Agent::new(Position::new(2.0, 1.0), 10.0),
        ];

        write_population(&agents, &path, OutputFormat::Csv).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(content.lines().next(), Some("0.500000,-0.500000"));
    }

    #[test]
    fn test_end_to_end_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let initial = dir.path().join("initial.csv");
        let output = dir.path().join("final.csv");
        let args = RunArgs {
            population: 30,
            steps: Some(3),
            workers: Some(3),
            threads: Some(1),
            seed: Some(8),
            output: Some(output.clone()),
            initial_output: Some(initial.clone()),
            format: Some(OutputFormat::Csv),
            ..Default::default()
        };

        run(args, Config::default(), false).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 30);
        assert_eq!(std::fs::read_to_string(&initial).unwrap().lines().count(), 30);
    }
}
