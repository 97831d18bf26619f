//! Configuration structures for admission control.
//!
//! This module provides TOML-based configuration for the tier catalog. The
//! configuration system supports:
//! - Bundled defaults (include_str! from marketmate.toml)
//! - User overrides (./marketmate.toml or ~/.config/marketmate/marketmate.toml)
//! - Automatic merging with user values taking precedence
//!
//! Configuration is read once at startup. [`QuotaConfig::catalog`] validates it
//! into an immutable [`TierCatalog`]; nothing is re-read afterwards.

use crate::{
    LimitDimension, QuotaEngine, QuotaEngineBuilder, Tier, TierCatalog, UnresolvedTier,
    WindowDurations,
};
use config::{Config, File, FileFormat};
use marketmate_error::{ConfigError, MarketmateResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../marketmate.toml");

/// Ceilings for one tier.
///
/// All fields are optional in the file so partial overrides merge cleanly; the
/// merged result must define every dimension for every tier.
///
/// # Example
///
/// ```toml
/// [tiers.free]
/// rpm = 3
/// rpd = 200
/// tpm = 40_000
/// tpd = 1_000_000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct TierLimits {
    /// Requests per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<u64>,

    /// Requests per day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpd: Option<u64>,

    /// Tokens per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<u64>,

    /// Tokens per day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpd: Option<u64>,
}

impl TierLimits {
    /// Ceiling configured for `dimension`, if any.
    pub fn get(&self, dimension: LimitDimension) -> Option<u64> {
        match dimension {
            LimitDimension::RequestsPerMinute => self.rpm,
            LimitDimension::RequestsPerDay => self.rpd,
            LimitDimension::TokensPerMinute => self.tpm,
            LimitDimension::TokensPerDay => self.tpd,
        }
    }
}

/// Window durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Length of a per-minute window
    #[serde(default = "default_minute_secs")]
    pub minute_secs: u64,

    /// Length of a per-day window
    #[serde(default = "default_day_secs")]
    pub day_secs: u64,
}

fn default_minute_secs() -> u64 {
    60
}

fn default_day_secs() -> u64 {
    86_400
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            minute_secs: default_minute_secs(),
            day_secs: default_day_secs(),
        }
    }
}

/// How principals are mapped onto tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct ResolutionConfig {
    /// Tier key to fall back to, or `"deny"` to fail closed
    #[serde(default)]
    pub unresolved: UnresolvedTier,
}

/// Top-level admission-control configuration.
///
/// Loads from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from marketmate.toml)
/// 2. User override (./marketmate.toml or ~/.config/marketmate/marketmate.toml)
///
/// # Example
///
/// ```no_run
/// use marketmate_quota::QuotaConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = QuotaConfig::load()?;
/// let catalog = config.catalog()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct QuotaConfig {
    /// Window durations
    #[serde(default)]
    pub windows: WindowConfig,

    /// Tier resolution policy
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Map of tier key to ceilings
    #[serde(default)]
    pub tiers: HashMap<String, TierLimits>,
}

impl QuotaConfig {
    /// Load only the bundled defaults, ignoring user files.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled file cannot be parsed.
    #[instrument]
    pub fn bundled() -> MarketmateResult<Self> {
        debug!("Loading bundled configuration");
        Self::deserialize_from(
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml)),
        )
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> MarketmateResult<Self> {
        debug!("Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)).into())
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (marketmate.toml shipped with the crate)
    /// 2. User config in home directory (~/.config/marketmate/marketmate.toml)
    /// 3. User config in current directory (./marketmate.toml)
    ///
    /// User config files are optional and will be silently skipped if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if any present source cannot be parsed.
    #[instrument]
    pub fn load() -> MarketmateResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut overrides = Vec::new();
        if let Some(home) = dirs::home_dir() {
            overrides.push(home.join(".config/marketmate/marketmate.toml"));
        }
        overrides.push(PathBuf::from("marketmate.toml"));

        Self::layered(overrides)
    }

    /// Load the bundled defaults, then merge each override file in order.
    ///
    /// Later files win key by key, so an override only needs the values it
    /// changes. Missing override files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if any present source cannot be parsed.
    pub fn layered<P: AsRef<Path>>(
        overrides: impl IntoIterator<Item = P>,
    ) -> MarketmateResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        for path in overrides {
            debug!(path = %path.as_ref().display(), "Adding optional override");
            builder = builder.add_source(File::from(path.as_ref()).required(false));
        }

        Self::deserialize_from(builder)
    }

    fn deserialize_from(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> MarketmateResult<Self> {
        builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)).into())
    }

    /// Validate into an immutable tier catalog.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a tier key is unknown, any tier lacks a
    /// ceiling for any dimension, or a window duration is zero.
    #[instrument(skip(self))]
    pub fn catalog(&self) -> MarketmateResult<TierCatalog> {
        // Only canonical keys, so two spellings of one tier can never both apply.
        let mut keys: Vec<_> = self.tiers.keys().collect();
        keys.sort();
        if let Some(unknown) = keys
            .into_iter()
            .find(|k| !Tier::iter().any(|t| t.key() == k.as_str()))
        {
            let expected: Vec<_> = Tier::iter().map(|t| t.key()).collect();
            return Err(ConfigError::new(format!(
                "Unknown tier '{}' in [tiers], expected one of: {}",
                unknown,
                expected.join(", ")
            ))
            .into());
        }

        let mut ceilings = HashMap::new();
        for tier in Tier::iter() {
            let limits = self.tiers.get(tier.key()).ok_or_else(|| {
                ConfigError::new(format!("Missing [tiers.{}] section", tier.key()))
            })?;
            for dimension in LimitDimension::iter() {
                if let Some(ceiling) = limits.get(dimension) {
                    ceilings.insert((tier, dimension), ceiling);
                }
            }
        }

        let windows = WindowDurations::from_secs(self.windows.minute_secs, self.windows.day_secs)?;
        let catalog = TierCatalog::new(&ceilings, windows)?;
        info!(
            minute_secs = self.windows.minute_secs,
            day_secs = self.windows.day_secs,
            unresolved = %String::from(self.resolution.unresolved),
            "Tier catalog loaded"
        );
        Ok(catalog)
    }

    /// Validate and start building an engine with this configuration's
    /// catalog and unresolved-tier policy.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`QuotaConfig::catalog`].
    pub fn engine_builder(&self) -> MarketmateResult<QuotaEngineBuilder> {
        Ok(QuotaEngine::builder(self.catalog()?).unresolved(self.resolution.unresolved))
    }
}
