//! NetMHCIIpan CLI
//!
//! Command-line interface for submitting and tracking prediction jobs on the
//! orchestrator.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser};
use commands::{Commands, handle_command, restore_from_matches};
use config::Config;

#[derive(Parser)]
#[command(name = "netmhc")]
#[command(about = "NetMHCIIpan prediction job CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "NETMHC_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let mut cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    restore_from_matches(&mut cli.command, &matches);

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}
