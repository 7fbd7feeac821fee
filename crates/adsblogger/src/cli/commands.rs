//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::flight::Clock;

/// Run command arguments.
#[derive(Debug, Default, Args)]
pub struct RunCommand {
    /// Feed URL or path, overriding the configuration
    #[arg(short, long, value_name = "URL")]
    pub feed: Option<String>,

    /// Database file, overriding the configuration
    #[arg(short, long, value_name = "FILE")]
    pub database: Option<PathBuf>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Records command arguments.
#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Flights command arguments.
#[derive(Debug, Args)]
pub struct FlightsCommand {
    /// Show flights that started at or after this unix time
    #[arg(short, long, value_name = "SECONDS")]
    pub since: Option<Clock>,

    /// Maximum number of flights
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_default() {
        let cmd = RunCommand::default();
        assert!(cmd.feed.is_none());
        assert!(cmd.database.is_none());
    }

    #[test]
    fn test_flights_command_debug() {
        let cmd = FlightsCommand {
            since: Some(1_700_000_000),
            limit: 5,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("since"));
        assert!(debug_str.contains("1700000000"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
