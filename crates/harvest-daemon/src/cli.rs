//! CLI argument parsing for the harvest daemon.
//!
//! CLI flags override every other config source.

use clap::{Parser, Subcommand};

/// job-harvest daemon
///
/// Collects job postings from public job boards into a local store.
#[derive(Parser, Debug)]
#[command(name = "harvest-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/job-harvest/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemon and its ingestion schedule
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,

        /// Run one pass over the schedule's queries immediately
        #[arg(long)]
        run_now: bool,
    },

    /// Stop the running daemon
    Stop,

    /// Show daemon status
    Status,

    /// Run ingestion once and print the summary as JSON
    Run {
        #[arg(short, long)]
        keyword: String,

        #[arg(short = 'L', long)]
        location: String,

        /// Source to include (repeatable; default: configured sources)
        #[arg(short, long = "source")]
        sources: Vec<String>,
    },

    /// Browse stored postings
    Postings {
        #[command(subcommand)]
        command: PostingCommands,
    },

    /// Show recent ingestion run records, newest first
    Runs {
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Duplicate detection and manual merges
    Dedup {
        #[command(subcommand)]
        command: DedupCommands,
    },

    /// List known sources and whether they can run
    Sources,

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PostingCommands {
    /// List postings, newest first
    List {
        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        job_type: Option<String>,

        #[arg(long)]
        remote_type: Option<String>,

        #[arg(long)]
        experience_level: Option<String>,

        /// Only postings published within the last N days
        #[arg(long)]
        since_days: Option<i64>,

        /// Substring match over title, company and location
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        include_inactive: bool,

        #[arg(long)]
        include_duplicates: bool,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "50")]
        page_size: u32,
    },

    /// Show one posting as JSON (counts as a view)
    Show {
        id: u64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DedupCommands {
    /// Run one deduplication pass over live postings
    Run,

    /// Merge a duplicate into the posting that is kept
    Merge {
        #[arg(long)]
        keep: u64,

        #[arg(long)]
        remove: u64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show corpus and database statistics
    Stats,

    /// Trigger RocksDB compaction
    Compact {
        /// Compact only specific column family
        #[arg(long)]
        cf: Option<String>,
    },
}
