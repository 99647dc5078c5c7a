//! Server info command

use anyhow::Result;
use colored::*;

use crate::config::Config;

/// Print what the orchestrator advertises about itself
pub async fn show_info(config: &Config) -> Result<()> {
    let info = config.client().server_info().await?;

    println!("{} {}", info.name.bold(), info.version.dimmed());
    println!("  {}", info.description);
    println!();
    println!(
        "  Scripts:        {}",
        info.scripts_directory.display().to_string().dimmed()
    );
    println!(
        "  Jobs:           {}",
        info.jobs_directory.display().to_string().dimmed()
    );
    println!("  Parallel jobs:  {}", info.max_parallel_jobs);

    print_group("Synchronous tools", &info.tools.synchronous);
    print_group("Submit tools", &info.tools.submit_api);
    print_group("Job management", &info.tools.job_management);
    print_group("Utilities", &info.tools.utilities);

    Ok(())
}

fn print_group(title: &str, tools: &[String]) {
    println!("\n{}", format!("{}:", title).bold());
    for tool in tools {
        println!("  {} {}", "▸".cyan(), tool);
    }
}
