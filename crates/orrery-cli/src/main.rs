//! Orrery CLI: simulation, benchmarking, and snapshot inspection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "orrery")]
#[command(version, about = "Orrery: stage-ordered physics module pipeline")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "orrery_pipeline=debug").
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from a config file.
    Simulate {
        /// Path to simulation config (TOML).
        #[arg(short, long, default_value = "simulation.toml")]
        config: PathBuf,

        /// Override the frame count from the config.
        #[arg(short, long)]
        frames: Option<u32>,

        /// Restore module states from this snapshot before running.
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Drive frames through the async executor on a tokio runtime.
        #[arg(long = "async")]
        use_async: bool,
    },

    /// Run benchmark suite.
    Benchmark {
        /// Which scenario to run (sequential, parallel, async_heavy, multi_device, all).
        #[arg(short, long, default_value = "all")]
        scenario: String,

        /// Override each scenario's frame count.
        #[arg(short, long)]
        frames: Option<u32>,

        /// Output CSV file path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the execution plan for a simulation config.
    Plan {
        /// Path to simulation config (TOML).
        #[arg(short, long, default_value = "simulation.toml")]
        config: PathBuf,
    },

    /// List the modules available to simulation configs.
    Modules,

    /// Inspect a pipeline snapshot file.
    Inspect {
        /// Path to snapshot file (JSON).
        path: PathBuf,
    },

    /// Validate a simulation config (.toml) or snapshot (.json).
    Validate {
        /// Path to config or snapshot.
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Simulate {
            config,
            frames,
            resume,
            use_async,
        } => commands::simulate(&config, frames, resume.as_deref(), use_async),
        Commands::Benchmark {
            scenario,
            frames,
            output,
        } => commands::benchmark(&scenario, frames, output.as_deref()),
        Commands::Plan { config } => commands::plan(&config),
        Commands::Modules => commands::modules(),
        Commands::Inspect { path } => commands::inspect(&path),
        Commands::Validate { path } => commands::validate(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
