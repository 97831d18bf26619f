//! Configuration check handler.

use marketmate::{MarketmateResult, QuotaConfig};

/// Validate `config` and report the outcome.
pub fn check_config(config: &QuotaConfig) -> MarketmateResult<()> {
    config.catalog()?;
    println!(
        "Configuration OK: {} tiers, unresolved principals -> {}",
        config.tiers.len(),
        String::from(config.resolution.unresolved)
    );
    Ok(())
}
