//! peggd CLI
//!
//! Replays scenario files against a local multi-collateral solvency engine.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use peggd::cli::{Command, CommandOutput, OutputFormat, SCENARIO_PATH_ENV};

/// peggd - multi-collateral solvency engine for a pegged asset
#[derive(Parser)]
#[command(name = "peggd")]
#[command(version = peggd::VERSION)]
#[command(about = "Replay scenarios against the peggd solvency engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file and print the report
    Simulate {
        /// Scenario file
        #[arg(env = SCENARIO_PATH_ENV)]
        path: PathBuf,

        /// Ignore PEGGD_* parameter overrides
        #[arg(long)]
        no_env: bool,
    },

    /// Show effective protocol parameters
    Params {
        /// Read parameters from a scenario file
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },

    /// Write a sample scenario
    InitScenario {
        /// Destination file
        #[arg(default_value = "scenario.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run_command(&cli) {
        Ok(output) if output.success => {}
        Ok(_) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run_command(cli: &Cli) -> anyhow::Result<CommandOutput> {
    let format: OutputFormat = cli.format.parse()?;

    let command = match &cli.command {
        Commands::Simulate { path, no_env } => Command::Simulate {
            path: path.clone(),
            format,
            env_overrides: !no_env,
        },
        Commands::Params { scenario } => Command::Params {
            scenario: scenario.clone(),
        },
        Commands::InitScenario { path, force } => Command::InitScenario {
            path: path.clone(),
            force: *force,
        },
    };

    let output = command
        .execute()
        .with_context(|| format!("{:?} failed", command))?;

    println!("{}", output.message);
    for warning in &output.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(output)
}
