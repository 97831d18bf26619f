//! Principal to tier resolution.

use crate::{Principal, Tier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Looks up the subscription tier of a principal.
///
/// Implementations may call out to a profile service. A principal whose tier
/// cannot be determined yields `None`; what happens next is decided by the
/// engine's [`UnresolvedTier`] policy, never by the resolver.
#[async_trait]
pub trait TierResolver: Send + Sync {
    /// Resolve the tier for `principal`, or `None` if it is unknown.
    async fn resolve(&self, principal: &Principal) -> Option<Tier>;
}

/// Resolver that assigns the same tier to every principal.
///
/// This is the resolver MarketMate ships with until a profile service exists.
#[derive(Debug, Clone, Copy)]
pub struct StaticTierResolver {
    tier: Tier,
}

impl StaticTierResolver {
    /// Resolve every principal to `tier`.
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }
}

impl Default for StaticTierResolver {
    fn default() -> Self {
        Self::new(Tier::Free)
    }
}

#[async_trait]
impl TierResolver for StaticTierResolver {
    async fn resolve(&self, _principal: &Principal) -> Option<Tier> {
        Some(self.tier)
    }
}

/// Resolver backed by an explicit principal → tier assignment.
///
/// Principals without an assignment are unresolved.
#[derive(Debug, Clone, Default)]
pub struct AssignedTierResolver {
    assignments: HashMap<Principal, Tier>,
}

impl AssignedTierResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `tier` to `principal`, replacing any previous assignment.
    pub fn assign(mut self, principal: impl Into<Principal>, tier: Tier) -> Self {
        self.assignments.insert(principal.into(), tier);
        self
    }
}

#[async_trait]
impl TierResolver for AssignedTierResolver {
    #[instrument(skip(self), fields(principal = %principal))]
    async fn resolve(&self, principal: &Principal) -> Option<Tier> {
        let tier = self.assignments.get(principal).copied();
        debug!(resolved = tier.is_some(), "Looked up tier assignment");
        tier
    }
}

/// Policy for principals whose tier cannot be resolved.
///
/// Configured as `resolution.unresolved`: either a tier key (fail open to
/// that tier) or `"deny"` (fail closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnresolvedTier {
    /// Treat the principal as belonging to this tier
    Fallback(Tier),
    /// Reject the request with an unknown-principal error
    Deny,
}

impl Default for UnresolvedTier {
    fn default() -> Self {
        UnresolvedTier::Fallback(Tier::Free)
    }
}

impl FromStr for UnresolvedTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("deny") {
            return Ok(UnresolvedTier::Deny);
        }
        Tier::from_str(s)
            .map(UnresolvedTier::Fallback)
            .map_err(|_| format!("expected a tier name or 'deny', got '{}'", s))
    }
}

impl TryFrom<String> for UnresolvedTier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UnresolvedTier> for String {
    fn from(policy: UnresolvedTier) -> Self {
        match policy {
            UnresolvedTier::Fallback(tier) => tier.key().to_string(),
            UnresolvedTier::Deny => "deny".to_string(),
        }
    }
}
