//! MarketMate CLI binary.
//!
//! This binary provides command-line access to the admission-control engine:
//! - Print the configured tier catalog
//! - Validate configuration before deploying it
//! - Simulate bursts of calls against the catalog

use clap::Parser;
use marketmate::{LogFormat, Principal, QuotaConfig, SimulationOptions, init_tracing};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, check_config, run_simulation, show_catalog};

    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let log_format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(cli.verbose, log_format)?;

    let config = match &cli.config {
        Some(path) => QuotaConfig::from_file(path)?,
        None => QuotaConfig::load()?,
    };

    // Execute the requested command
    match cli.command {
        Commands::Catalog { format } => {
            show_catalog(&config, format)?;
        }

        Commands::CheckConfig => {
            check_config(&config)?;
        }

        Commands::Simulate {
            principal,
            tier,
            requests,
            tokens,
            interval,
            format,
        } => {
            let options = SimulationOptions {
                principal: Principal::new(principal),
                tier,
                requests,
                tokens,
                interval_secs: interval,
            };
            run_simulation(&config, options, format).await?;
        }
    }

    Ok(())
}
