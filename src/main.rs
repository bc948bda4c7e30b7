//! CLI entry point. The subcommand selects the role: `orchestrate` runs
//! the central server (HTTP API + dispatch gRPC + background sweeps),
//! `agent` runs a worker pool against a remote orchestrator. Every
//! configuration value is a flag with an environment-variable fallback
//! (a `.env` file is honored when present); variables without a default
//! are required and fail startup when absent.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

use abacus::config::{AgentArgs, OrchestratorArgs};

#[derive(Parser)]
#[command(name = "abacus", about = "Distributed arithmetic expression calculator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator: HTTP API, task dispatch, and expiry sweeps
    Orchestrate(OrchestratorArgs),
    /// Run an agent worker pool that consumes the dispatch stream
    Agent(AgentArgs),
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Orchestrate(args) => {
            let config = args.into_config();
            let _guard = cli::init_logging(&config.log)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::run_orchestrator(config))
        }
        Commands::Agent(args) => {
            let config = args.into_config();
            let _guard = cli::init_logging(&config.log)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(abacus::agent::pool::run(config))
        }
    }
}
