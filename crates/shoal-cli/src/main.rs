//! Shoal CLI - run a distributed fish school simulation.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::OutputFormat;

#[derive(Parser)]
#[command(name = "shoal")]
#[command(author, version, about = "Shoal - distributed fish school search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: shoal.toml in the current or a parent directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default shoal.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Seed a school and run the simulation
    Run {
        /// Number of agents
        population: usize,

        /// Number of simulation steps
        #[arg(short, long)]
        steps: Option<u64>,

        /// Number of workers in the process group
        #[arg(short, long)]
        workers: Option<usize>,

        /// Threads per worker (0 = one per core)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Random seed (default: derived from the clock)
        #[arg(long)]
        seed: Option<u64>,

        /// Lake width
        #[arg(long)]
        width: Option<f64>,

        /// Lake height
        #[arg(long)]
        height: Option<f64>,

        /// Collective timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Write the final positions here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the seeded positions here before the run
        #[arg(long)]
        initial_output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Show how a population is split across workers
    Partition {
        /// Number of agents
        population: usize,

        /// Number of workers
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path, force } => commands::init::run(path, force),
        Commands::Run {
            population,
            steps,
            workers,
            threads,
            seed,
            width,
            height,
            timeout_ms,
            output,
            initial_output,
            format,
        } => {
            let file = commands::load_config(cli.config.as_deref())?;
            let args = commands::run::RunArgs {
                population,
                steps,
                workers,
                threads,
                seed,
                width,
                height,
                timeout_ms,
                output,
                initial_output,
                format,
            };
            commands::run::run(args, file, cli.verbose)
        }
        Commands::Partition {
            population,
            workers,
        } => {
            let file = commands::load_config(cli.config.as_deref())?;
            commands::partition::run(population, workers.unwrap_or(file.run.workers))
        }
    }
}
