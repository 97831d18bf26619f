//! Metered resource axes.

use serde::{Deserialize, Serialize};

/// Reset period of a dimension's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum WindowKind {
    /// Resets once the window is older than the configured minute (60s by default)
    #[strum(to_string = "per-minute")]
    PerMinute,
    /// Resets once the window is older than the configured day (86400s by default)
    #[strum(to_string = "per-day")]
    PerDay,
}

/// When a dimension is charged relative to the protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum ChargeTiming {
    /// Fixed cost of one unit, charged before the operation runs
    #[strum(to_string = "pre-charge")]
    BeforeOperation,
    /// Variable cost equal to measured consumption, charged after the operation
    #[strum(to_string = "post-charge")]
    AfterOperation,
}

/// One metered resource axis.
///
/// Declaration order is the admission order: the gate walks dimensions in
/// `Ord` order, so a denial always names the first dimension that failed.
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
pub enum LimitDimension {
    /// Requests per minute
    #[serde(rename = "rpm")]
    #[strum(to_string = "RPM")]
    RequestsPerMinute,
    /// Requests per day
    #[serde(rename = "rpd")]
    #[strum(to_string = "RPD")]
    RequestsPerDay,
    /// Tokens per minute
    #[serde(rename = "tpm")]
    #[strum(to_string = "TPM")]
    TokensPerMinute,
    /// Tokens per day
    #[serde(rename = "tpd")]
    #[strum(to_string = "TPD")]
    TokensPerDay,
}

impl LimitDimension {
    /// Window this dimension accumulates over.
    pub fn window(&self) -> WindowKind {
        match self {
            LimitDimension::RequestsPerMinute | LimitDimension::TokensPerMinute => {
                WindowKind::PerMinute
            }
            LimitDimension::RequestsPerDay | LimitDimension::TokensPerDay => WindowKind::PerDay,
        }
    }

    /// Whether this dimension is charged before or after the protected operation.
    pub fn timing(&self) -> ChargeTiming {
        match self {
            LimitDimension::RequestsPerMinute | LimitDimension::RequestsPerDay => {
                ChargeTiming::BeforeOperation
            }
            LimitDimension::TokensPerMinute | LimitDimension::TokensPerDay => {
                ChargeTiming::AfterOperation
            }
        }
    }

    /// Returns true for count-based dimensions charged one unit per request.
    pub fn is_fixed_cost(&self) -> bool {
        self.timing() == ChargeTiming::BeforeOperation
    }

    /// Key used for this dimension inside a `[tiers.*]` configuration table.
    pub fn key(&self) -> &'static str {
        match self {
            LimitDimension::RequestsPerMinute => "rpm",
            LimitDimension::RequestsPerDay => "rpd",
            LimitDimension::TokensPerMinute => "tpm",
            LimitDimension::TokensPerDay => "tpd",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}
