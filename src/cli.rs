// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::Workload;

/// Command-line arguments for `smpdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "smpdag",
    version,
    about = "Replay a task DAG across pinned per-core workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `$SMPDAG_CONFIG`, else `Smpdag.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// How many times to reset and replay the graph. Overrides
    /// `[config].cycles`.
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,

    /// Which work to feed to the workers. Overrides `[config].workload`.
    #[arg(long, value_enum, value_name = "KIND")]
    pub workload: Option<Workload>,

    /// Number of workers, one per core. Overrides `[config].cores`.
    #[arg(long, value_name = "N")]
    pub cores: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SMPDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the graph, but don't start any workers.
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
