//! Catalog command handler.

use super::commands::OutputFormat;
use marketmate::{JsonError, LimitDimension, MarketmateResult, QuotaConfig, Tier};
use serde_json::{Map, Value, json};
use strum::IntoEnumIterator;

/// Print every (tier, dimension) ceiling and the window lengths.
pub fn show_catalog(config: &QuotaConfig, format: OutputFormat) -> MarketmateResult<()> {
    let catalog = config.catalog()?;

    match format {
        OutputFormat::Json => {
            let mut tiers = Map::new();
            for tier in Tier::iter() {
                let ceilings: Map<String, Value> = LimitDimension::iter()
                    .map(|d| (d.key().to_string(), json!(catalog.ceiling(tier, d))))
                    .collect();
                tiers.insert(tier.key().to_string(), Value::Object(ceilings));
            }
            let body = json!({
                "windows": {
                    "minute_secs": catalog.windows().minute().num_seconds(),
                    "day_secs": catalog.windows().day().num_seconds(),
                },
                "tiers": tiers,
            });
            let rendered =
                serde_json::to_string_pretty(&body).map_err(|e| JsonError::new(e.to_string()))?;
            println!("{}", rendered);
        }
        OutputFormat::Human => {
            println!(
                "Windows: minute = {}s, day = {}s",
                catalog.windows().minute().num_seconds(),
                catalog.windows().day().num_seconds()
            );
            print!("{:<8}", "Tier");
            for dimension in LimitDimension::iter() {
                print!("{:>14}", dimension.to_string());
            }
            println!();
            println!("{:-<64}", "");
            for tier in Tier::iter() {
                print!("{:<8}", tier.to_string());
                for dimension in LimitDimension::iter() {
                    print!("{:>14}", catalog.ceiling(tier, dimension));
                }
                println!();
            }
        }
    }

    Ok(())
}
