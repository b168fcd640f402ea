// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskqueue`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskqueue",
    version,
    about = "Run a graph of shell commands with dependencies, exclusion and ordering.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task graph file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Taskqueue.toml")]
    pub config: String,

    /// Override `[scheduler].max_concurrent` (0 = unbounded).
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKQUEUE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate, print the graph, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
