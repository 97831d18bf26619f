//! Subscription tiers.
//!
//! The tier set is closed: every tier must carry a ceiling for every
//! [`LimitDimension`](crate::LimitDimension), which the catalog checks once at
//! startup.

use serde::{Deserialize, Serialize};

/// MarketMate subscription tiers.
///
/// Display names (`Free`, `Tier-1`, ...) are what users see; configuration keys
/// (`free`, `tier_1`, ...) are what `marketmate.toml` uses. Both parse, but
/// `[tiers]` section names must be the configuration key.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::EnumCount,
)]
#[strum(ascii_case_insensitive)]
pub enum Tier {
    /// Free tier, the default for new users
    #[serde(rename = "free")]
    #[strum(to_string = "Free", serialize = "free")]
    Free,
    /// Tier 1
    #[serde(rename = "tier_1")]
    #[strum(to_string = "Tier-1", serialize = "tier_1")]
    Tier1,
    /// Tier 2
    #[serde(rename = "tier_2")]
    #[strum(to_string = "Tier-2", serialize = "tier_2")]
    Tier2,
    /// Tier 3
    #[serde(rename = "tier_3")]
    #[strum(to_string = "Tier-3", serialize = "tier_3")]
    Tier3,
}

impl Tier {
    /// Key used for this tier under `[tiers]` in configuration files.
    pub fn key(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Tier1 => "tier_1",
            Tier::Tier2 => "tier_2",
            Tier::Tier3 => "tier_3",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}
