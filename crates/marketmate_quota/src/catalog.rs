//! Static ceilings per (tier, dimension).

use crate::{LimitDimension, QuotaConfig, Tier, WindowKind};
use chrono::TimeDelta;
use marketmate_error::{ConfigError, MarketmateResult};
use std::collections::HashMap;
use strum::{EnumCount, IntoEnumIterator};
use tracing::debug;

const TIERS: usize = 4;
const DIMENSIONS: usize = 4;

/// Window lengths for each [`WindowKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_getters::Getters)]
pub struct WindowDurations {
    /// Length of a per-minute window
    minute: TimeDelta,
    /// Length of a per-day window
    day: TimeDelta,
}

impl WindowDurations {
    /// Build window durations from seconds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either duration is zero or too large
    /// to represent.
    pub fn from_secs(minute_secs: u64, day_secs: u64) -> MarketmateResult<Self> {
        Ok(Self {
            minute: window_from_secs("minute_secs", minute_secs)?,
            day: window_from_secs("day_secs", day_secs)?,
        })
    }

    /// Duration of a window of the given kind.
    pub fn duration(&self, kind: WindowKind) -> TimeDelta {
        match kind {
            WindowKind::PerMinute => self.minute,
            WindowKind::PerDay => self.day,
        }
    }
}

impl Default for WindowDurations {
    fn default() -> Self {
        Self {
            minute: TimeDelta::seconds(60),
            day: TimeDelta::seconds(86_400),
        }
    }
}

fn window_from_secs(field: &str, secs: u64) -> MarketmateResult<TimeDelta> {
    if secs == 0 {
        return Err(ConfigError::new(format!("Window '{}' must be positive", field)).into());
    }
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| {
            ConfigError::new(format!("Window '{}' is out of range: {}s", field, secs)).into()
        })
}

/// Immutable mapping from (tier, dimension) to ceiling.
///
/// Construction checks that the catalog is total over the closed
/// `Tier × LimitDimension` product, so [`TierCatalog::ceiling`] cannot fail at
/// request time.
///
/// # Example
///
/// ```
/// use marketmate_quota::{LimitDimension, Tier, TierCatalog};
///
/// let catalog = TierCatalog::bundled().unwrap();
/// assert_eq!(catalog.ceiling(Tier::Free, LimitDimension::RequestsPerMinute), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    ceilings: [[u64; DIMENSIONS]; TIERS],
    windows: WindowDurations,
}

impl TierCatalog {
    /// Build a catalog from an explicit ceiling map.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing
    /// (tier, dimension) pair.
    pub fn new(
        ceilings: &HashMap<(Tier, LimitDimension), u64>,
        windows: WindowDurations,
    ) -> MarketmateResult<Self> {
        let mut table = [[0; DIMENSIONS]; TIERS];
        for tier in Tier::iter() {
            for dimension in LimitDimension::iter() {
                let ceiling = ceilings.get(&(tier, dimension)).ok_or_else(|| {
                    ConfigError::new(format!(
                        "Missing ceiling for tier '{}', dimension '{}'",
                        tier.key(),
                        dimension.key()
                    ))
                })?;
                table[tier.index()][dimension.index()] = *ceiling;
            }
        }
        debug!(tiers = TIERS, dimensions = DIMENSIONS, "Tier catalog built");
        Ok(Self {
            ceilings: table,
            windows,
        })
    }

    /// Maximum cumulative charge permitted within one open window.
    pub fn ceiling(&self, tier: Tier, dimension: LimitDimension) -> u64 {
        self.ceilings[tier.index()][dimension.index()]
    }

    /// Length of the window a dimension accumulates over.
    pub fn window(&self, dimension: LimitDimension) -> TimeDelta {
        self.windows.duration(dimension.window())
    }

    /// Window durations used by this catalog.
    pub fn windows(&self) -> WindowDurations {
        self.windows
    }

    /// The catalog MarketMate ships with, built from the bundled
    /// `marketmate.toml` alone.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bundled file does not validate.
    pub fn bundled() -> MarketmateResult<Self> {
        QuotaConfig::bundled()?.catalog()
    }
}

// Keeps the table shape in lockstep with the enums.
const _: () = assert!(Tier::COUNT == TIERS && LimitDimension::COUNT == DIMENSIONS);
