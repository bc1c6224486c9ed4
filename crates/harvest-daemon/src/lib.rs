//! job-harvest daemon library exports.
//!
//! - `cli`: command-line argument parsing with clap
//! - `commands`: command implementations

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands, DedupCommands, PostingCommands};
pub use commands::{
    build_orchestrator, handle_admin, handle_dedup, handle_postings, handle_run, handle_runs,
    handle_sources, init_logging, load_settings, open_storage, run_once, show_status,
    start_daemon, stop_daemon,
};
