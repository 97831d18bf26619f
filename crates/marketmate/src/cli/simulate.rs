//! Simulation command handler.

use super::commands::OutputFormat;
use marketmate::{
    CallOutcome, JsonError, MarketmateResult, QuotaConfig, SimulationOptions, simulate,
};

/// Run a simulation and print its report.
pub async fn run_simulation(
    config: &QuotaConfig,
    options: SimulationOptions,
    format: OutputFormat,
) -> MarketmateResult<()> {
    let report = simulate(config, &options).await?;

    match format {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(&report)
                .map_err(|e| JsonError::new(e.to_string()))?;
            println!("{}", rendered);
        }
        OutputFormat::Human => {
            println!(
                "Simulating {} calls of {} tokens as '{}' ({})",
                options.requests, options.tokens, report.principal, report.tier
            );
            println!("{:-<64}", "");
            for call in &report.calls {
                match &call.outcome {
                    CallOutcome::Admitted { overrun } if overrun.is_empty() => {
                        println!("#{:<4} t+{:<6}s admitted", call.index, call.elapsed_secs);
                    }
                    CallOutcome::Admitted { overrun } => {
                        let dims: Vec<String> = overrun.iter().map(|d| d.to_string()).collect();
                        println!(
                            "#{:<4} t+{:<6}s admitted, over {}",
                            call.index,
                            call.elapsed_secs,
                            dims.join(", ")
                        );
                    }
                    CallOutcome::Denied {
                        retry_after_secs,
                        message,
                        ..
                    } => {
                        println!(
                            "#{:<4} t+{:<6}s denied: {} (retry after {}s)",
                            call.index, call.elapsed_secs, message, retry_after_secs
                        );
                    }
                }
            }
            println!("{:-<64}", "");
            println!("Admitted: {}/{}", report.admitted(), report.calls.len());
            for (dimension, count) in report.denied_by() {
                println!("Denied by {}: {}", dimension, count);
            }
            for (dimension, usage) in &report.usage {
                println!(
                    "{}: {}/{} used, resets at {}",
                    dimension,
                    usage.count,
                    usage.ceiling,
                    usage.resets_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}
