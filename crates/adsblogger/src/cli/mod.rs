//! Command-line interface for adsblogger.
//!
//! This module provides the CLI structure for the `adsblog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, FlightsCommand, RecordsCommand, RunCommand, StatusCommand};

use crate::logging::Verbosity;

/// adsblog - Log every flight your ADS-B receiver sees
///
/// Polls the tar1090 / readsb `aircraft.json` feed, groups sightings into
/// flights, keeps the all-time extremes of each metric, and stores both in
/// a `SQLite` database.
#[derive(Debug, Parser)]
#[command(name = "adsblog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the logger in the foreground until interrupted
    Run(RunCommand),

    /// Show database status
    Status(StatusCommand),

    /// Show the current records
    Records(RecordsCommand),

    /// List stored flights
    Flights(FlightsCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
