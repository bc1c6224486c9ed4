//! job-harvest daemon
//!
//! Collects job postings from public job boards, filters and deduplicates
//! them, and keeps the corpus under a size ceiling.
//!
//! # Usage
//!
//! ```bash
//! harvest-daemon start [--foreground] [--run-now] [--db-path PATH]
//! harvest-daemon stop
//! harvest-daemon status
//! harvest-daemon run --keyword "Data Scientist" --location Berlin [-s arbeitnow]
//! harvest-daemon postings list [--source S] [--search TEXT] [--page N]
//! harvest-daemon runs [-n 50]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/job-harvest/config.toml)
//! 3. Environment variables (HARVEST_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use harvest_daemon::{
    handle_admin, handle_dedup, handle_postings, handle_run, handle_runs, handle_sources,
    init_logging, load_settings, show_status, start_daemon, stop_daemon, Cli, Commands,
};
use harvest_types::SearchQuery;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = || {
        load_settings(
            cli.config.as_deref(),
            cli.db_path.as_deref(),
            cli.log_level.as_deref(),
        )
    };

    match cli.command {
        Commands::Start {
            foreground,
            run_now,
        } => {
            start_daemon(settings()?, foreground, run_now).await?;
        }
        Commands::Stop => {
            stop_daemon()?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Run {
            ref keyword,
            ref location,
            ref sources,
        } => {
            let settings = settings()?;
            init_logging(&settings)?;
            let mut query = SearchQuery::new(keyword.as_str(), location.as_str());
            if !sources.is_empty() {
                query = query.with_sources(sources.iter().cloned());
            }
            handle_run(&settings, query).await?;
        }
        Commands::Postings { ref command } => {
            handle_postings(&settings()?, command.clone())?;
        }
        Commands::Runs { limit } => {
            handle_runs(&settings()?, limit)?;
        }
        Commands::Dedup { ref command } => {
            let settings = settings()?;
            init_logging(&settings)?;
            handle_dedup(&settings, command.clone())?;
        }
        Commands::Sources => {
            handle_sources(&settings()?)?;
        }
        Commands::Admin { ref command } => {
            let settings = settings()?;
            init_logging(&settings)?;
            handle_admin(&settings, command.clone())?;
        }
    }

    Ok(())
}
