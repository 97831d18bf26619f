//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use marketmate::Tier;
use std::path::PathBuf;

/// MarketMate - admission control for language-model calls
#[derive(Parser, Debug)]
#[command(name = "marketmate")]
#[command(about = "Inspect and exercise MarketMate admission control", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Read configuration from this file instead of the layered defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the ceiling of every tier and dimension
    Catalog {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Validate configuration and report the first problem found
    CheckConfig,

    /// Replay a burst of calls against the catalog without running a model
    Simulate {
        /// Principal to make the calls as
        #[arg(long, default_value = "simulated-user")]
        principal: String,

        /// Tier the principal belongs to (free, tier_1, tier_2, tier_3)
        #[arg(long, default_value = "free")]
        tier: Tier,

        /// Number of calls to attempt
        #[arg(long, default_value = "10")]
        requests: u64,

        /// Tokens each call consumes
        #[arg(long, default_value = "1000")]
        tokens: u64,

        /// Seconds between calls
        #[arg(long, default_value = "0")]
        interval: u32,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
