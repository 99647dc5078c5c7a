//! Job command handlers
//!
//! Handles all job-related CLI commands: submitting scripts, checking status,
//! fetching results and logs, cancelling and listing.

use anyhow::{Context, Result};
use clap::{ArgMatches, Subcommand};
use colored::*;
use netmhc_client::OrchestratorClient;
use netmhc_core::domain::job::{ArgValue, JobArgs, JobSnapshot, JobStatus};
use netmhc_core::dto::job::SubmitJob;
use std::path::PathBuf;

use crate::config::Config;
use crate::id_resolver::resolve_job_id;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a script for background execution
    Submit {
        /// Script path; relative paths are resolved in the server's scripts directory
        script: PathBuf,

        /// Named argument passed as `--key value` (repeatable)
        #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        args: Vec<(String, String)>,

        /// Switch passed as a bare `--key` (repeatable)
        #[arg(long = "flag", value_name = "KEY")]
        flags: Vec<String>,

        /// Job name for tracking
        #[arg(long)]
        name: Option<String>,

        #[arg(skip)]
        positions: ArgPositions,
    },
    /// Show job status
    Status {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Print the result of a completed job
    Result {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Show job log
    Log {
        /// Job ID or unambiguous prefix
        id: String,

        /// Number of trailing lines, 0 for the whole log
        #[arg(short, long, default_value_t = 50)]
        tail: usize,
    },
    /// Cancel a pending or running job
    Cancel {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// List jobs
    List {
        /// Only jobs in this status
        #[arg(short, long)]
        status: Option<JobStatus>,
    },
    /// Write a completed job's result to a file on the server host
    Export {
        /// Job ID or unambiguous prefix
        id: String,

        /// Destination file
        output_file: PathBuf,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        JobCommands::Submit {
            script,
            args,
            flags,
            name,
            positions,
        } => submit_job(&client, script, build_args(args, flags, &positions), name).await,
        JobCommands::Status { id } => show_status(&client, &id).await,
        JobCommands::Result { id } => show_result(&client, &id).await,
        JobCommands::Log { id, tail } => show_log(&client, &id, tail).await,
        JobCommands::Cancel { id } => cancel_job(&client, &id).await,
        JobCommands::List { status } => list_jobs(&client, status).await,
        JobCommands::Export { id, output_file } => {
            export_result(&client, &id, output_file).await
        }
    }
}

/// Submit a script
async fn submit_job(
    client: &OrchestratorClient,
    script_path: PathBuf,
    args: JobArgs,
    job_name: Option<String>,
) -> Result<()> {
    let response = client
        .submit_job(&SubmitJob {
            script_path,
            args,
            job_name,
        })
        .await
        .context("Failed to submit job")?;

    println!("{}", "✓ Job submitted".green().bold());
    println!("  ID:     {}", response.job_id.to_string().cyan());
    println!("  Status: {}", colorize_status(response.status));
    println!("  {}", response.message.dimmed());

    Ok(())
}

/// Get and display a single job
async fn show_status(client: &OrchestratorClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    let job = client.get_job_status(job_id).await?;

    print_job_details(&job);

    Ok(())
}

async fn show_result(client: &OrchestratorClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;

    match client.get_job_result(job_id).await {
        Ok(result) => {
            println!("{}", result.result);
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            let job = client.get_job_status(job_id).await?;
            println!(
                "{}",
                format!("Job {} is still {}; try again later.", job_id, job.status).yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Get and display job log lines
async fn show_log(client: &OrchestratorClient, id: &str, tail: usize) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    let log = client.get_job_log(job_id, tail).await?;

    if log.lines.is_empty() {
        println!("{}", "No log output for this job yet.".yellow());
        return Ok(());
    }

    let shown = log.lines.len();
    let header = if shown < log.total_lines {
        format!(
            "Log for job {} (last {} of {} lines):",
            job_id, shown, log.total_lines
        )
    } else {
        format!("Log for job {} ({} lines):", job_id, log.total_lines)
    };

    println!("{}", header.bold());
    println!("{}", "─".repeat(80).dimmed());
    for line in &log.lines {
        println!("{}", line);
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

async fn cancel_job(client: &OrchestratorClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    let response = client.cancel_job(job_id).await?;

    println!(
        "{} {}",
        "✓".green(),
        format!("Job {}: {}", job_id, response.message)
    );

    Ok(())
}

/// List jobs
async fn list_jobs(client: &OrchestratorClient, status: Option<JobStatus>) -> Result<()> {
    let list = client.list_jobs(status).await?;

    if list.jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", list.total).bold());
        println!();
        for job in &list.jobs {
            print_job_summary(job);
        }
    }

    Ok(())
}

async fn export_result(client: &OrchestratorClient, id: &str, output_file: PathBuf) -> Result<()> {
    let job_id = resolve_job_id(client, id).await?;
    let response = client.export_job_result(job_id, output_file).await?;

    println!(
        "{} Wrote {} bytes to {}",
        "✓".green(),
        response.bytes_written,
        response.output_file.display()
    );

    Ok(())
}

// =============================================================================
// Argument Parsing
// =============================================================================

/// Parses a `KEY=VALUE` pair; the value may itself contain '='
fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Command-line positions of the `--arg` and `--flag` values of a submit
///
/// clap collects the two options into separate lists; the positions restore
/// how they were interleaved.
#[derive(Debug, Clone, Default)]
pub struct ArgPositions {
    args: Vec<usize>,
    flags: Vec<usize>,
}

impl ArgPositions {
    pub fn from_matches(submit: &ArgMatches) -> Self {
        let indices = |id: &str| {
            submit
                .indices_of(id)
                .map(|indices| indices.collect())
                .unwrap_or_default()
        };

        Self {
            args: indices("args"),
            flags: indices("flags"),
        }
    }
}

/// Fills in the positions of a parsed `job submit` from its matches
pub fn restore_arg_order(command: &mut JobCommands, matches: &ArgMatches) {
    if let JobCommands::Submit { positions, .. } = command {
        if let Some(submit) = matches.subcommand_matches("submit") {
            *positions = ArgPositions::from_matches(submit);
        }
    }
}

/// Builds the job arguments in command-line order
///
/// Without positions, pairs come before switches.
fn build_args(
    pairs: Vec<(String, String)>,
    flags: Vec<String>,
    positions: &ArgPositions,
) -> JobArgs {
    let mut ordered = Vec::with_capacity(pairs.len() + flags.len());

    for (i, (key, value)) in pairs.into_iter().enumerate() {
        let at = positions.args.get(i).copied().unwrap_or(i);
        ordered.push((at, key, ArgValue::Text(value)));
    }

    let offset = ordered.len();
    for (i, flag) in flags.into_iter().enumerate() {
        let at = positions.flags.get(i).copied().unwrap_or(offset + i);
        ordered.push((at, flag, ArgValue::Flag(true)));
    }

    ordered.sort_by_key(|(at, _, _)| *at);
    ordered.into_iter().map(|(_, key, value)| (key, value)).collect()
}

// =============================================================================
// Output
// =============================================================================

/// Print a one-entry job summary
fn print_job_summary(job: &JobSnapshot) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        job.name.bold(),
        job.job_id.to_string().dimmed()
    );
    println!("    Status:    {}", colorize_status(job.status));
    println!(
        "    Submitted: {}",
        job.submitted_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed job information
fn print_job_details(job: &JobSnapshot) {
    println!("{}", "Job Details:".bold());
    println!("  ID:        {}", job.job_id.to_string().cyan());
    println!("  Name:      {}", job.name);
    println!("  Status:    {}", colorize_status(job.status));
    println!(
        "  Submitted: {}",
        job.submitted_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = job.started_at {
        println!("  Started:   {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(ended) = job.ended_at {
        println!("  Ended:     {}", ended.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_at {
            let duration = ended.signed_duration_since(started);
            println!("  Duration:  {}s", duration.num_seconds());
        }
    }

    if let Some(code) = job.exit_code {
        println!("  Exit Code: {}", code);
    }

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        JobStatus::Pending => label.yellow(),
        JobStatus::Running => label.cyan(),
        JobStatus::Completed => label.green(),
        JobStatus::Failed => label.red(),
        JobStatus::Cancelled => label.dimmed(),
    }
}
