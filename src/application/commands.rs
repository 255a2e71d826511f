//! CLI commands

use clap::{Parser, Subcommand};
use std::path::Path;

use super::services::SimulationService;
use crate::shared::config::ConfigLoader;
use crate::shared::errors::AppError;
use crate::shared::types::EngineConfig;

#[derive(Parser, Debug)]
#[command(version, about = "NexusOS AMM exchange and LP farming engine")]
pub struct Cli {
    /// Path to config file (optional, defaults to built-in configuration)
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a randomized exchange and farming session
    Simulate {
        /// Number of trading rounds
        #[arg(long, default_value = "12")]
        rounds: u32,

        /// Emit the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bootstrap a session and print its state report
    Report {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Executes parsed CLI commands
pub struct CommandExecutor;

impl CommandExecutor {
    pub async fn execute(cli: Cli) -> Result<(), AppError> {
        let config = match &cli.config {
            Some(path) => ConfigLoader::load_from(Path::new(path))?,
            None => EngineConfig::default(),
        };

        let service = SimulationService::new(&config)?;

        match cli.command {
            Commands::Simulate { rounds, json } => service.run_simulation(rounds, json).await,
            Commands::Report { json } => service.print_report(json).await,
        }
    }
}
