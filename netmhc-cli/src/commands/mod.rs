//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod info;
mod job;

pub use job::JobCommands;

use anyhow::Result;
use clap::{ArgMatches, Subcommand};

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Show server information and available tools
    Info,
}

/// Carries over what the parsed command loses from the raw matches
pub fn restore_from_matches(command: &mut Commands, matches: &ArgMatches) {
    if let Commands::Job { command } = command {
        if let Some(job) = matches.subcommand_matches("job") {
            job::restore_arg_order(command, job);
        }
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Info => info::show_info(config).await,
    }
}
