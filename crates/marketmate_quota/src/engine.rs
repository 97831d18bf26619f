//! Quota engine: lazy fixed-window admission.
//!
//! The engine resolves a principal's tier, then applies one of two transitions
//! to the (principal, dimension) counter through the store's atomic
//! [`transact`](crate::CounterStore::transact):
//!
//! - **pre-charge** ([`QuotaEngine::try_charge`]) rolls the window, denies if the
//!   counter is saturated or the charge would cross the ceiling, and otherwise
//!   adds the charge. A zero charge only checks for saturation.
//! - **post-charge** ([`QuotaEngine::record_usage`]) rolls the window and always
//!   adds the measured amount, reporting whether the result stayed within the
//!   ceiling. It never undoes work that already happened.
//!
//! Windows are fixed and reset lazily on first touch after they expire, so a
//! principal can spend up to twice a ceiling in a burst that straddles a window
//! boundary. That is a property of fixed windows and is accepted here.

use crate::{
    Clock, CounterKey, CounterStore, InMemoryCounterStore, LimitDimension, Principal,
    StaticTierResolver, SystemClock, Tier, TierCatalog, TierResolver, UnresolvedTier,
    WindowCounter,
};
use chrono::{DateTime, TimeDelta, Utc};
use marketmate_error::{MarketmateResult, QuotaError, QuotaErrorKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Outcome of one charge against one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Dimension that was charged
    pub dimension: LimitDimension,
    /// Whether the charge was admitted (pre-charge) or stayed within the ceiling (post-charge)
    pub admitted: bool,
    /// Counter value after the charge
    pub count: u64,
    /// Ceiling that applied
    pub ceiling: u64,
    /// When the open window rolls over
    pub resets_at: DateTime<Utc>,
    /// Time from the decision until the window rolls over
    pub retry_after: Duration,
}

/// Point-in-time view of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    /// Charge accumulated in the open window
    pub count: u64,
    /// Ceiling for the principal's tier
    pub ceiling: u64,
    /// Charge still available before the ceiling
    pub remaining: u64,
    /// When the open window rolls over
    pub resets_at: DateTime<Utc>,
}

/// Pre-charge transition. Returns true if the charge was admitted and applied.
pub(crate) fn pre_charge(
    counter: &mut WindowCounter,
    now: DateTime<Utc>,
    window: TimeDelta,
    ceiling: u64,
    amount: u64,
) -> bool {
    counter.roll(now, window);
    if counter.count >= ceiling || counter.count.saturating_add(amount) > ceiling {
        return false;
    }
    counter.count += amount;
    true
}

/// Post-charge transition. Always applies; returns true if still within the ceiling.
pub(crate) fn post_charge(
    counter: &mut WindowCounter,
    now: DateTime<Utc>,
    window: TimeDelta,
    ceiling: u64,
    amount: u64,
) -> bool {
    counter.roll(now, window);
    counter.count = counter.count.saturating_add(amount);
    counter.count <= ceiling
}

/// Gates charges against per-principal, per-tier, multi-window ceilings.
///
/// The engine is the only component that touches the counter store. It is
/// cheap to share behind an `Arc`; all state lives in the store.
///
/// # Example
///
/// ```
/// use marketmate_quota::{LimitDimension, QuotaEngine, TierCatalog};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = QuotaEngine::builder(TierCatalog::bundled()?).build();
/// let alice = "alice".into();
///
/// for _ in 0..3 {
///     assert!(engine.try_charge(&alice, LimitDimension::RequestsPerMinute, 1).await?);
/// }
/// assert!(!engine.try_charge(&alice, LimitDimension::RequestsPerMinute, 1).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QuotaEngine {
    catalog: Arc<TierCatalog>,
    store: Arc<dyn CounterStore>,
    resolver: Arc<dyn TierResolver>,
    clock: Arc<dyn Clock>,
    unresolved: UnresolvedTier,
}

impl std::fmt::Debug for QuotaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaEngine")
            .field("catalog", &self.catalog)
            .field("clock", &self.clock)
            .field("unresolved", &self.unresolved)
            .finish_non_exhaustive()
    }
}

impl QuotaEngine {
    /// Start building an engine over `catalog`.
    ///
    /// Defaults: an in-memory store, every principal resolved to
    /// [`Tier::Free`], the system clock, and unresolved principals falling back
    /// to [`Tier::Free`].
    pub fn builder(catalog: TierCatalog) -> QuotaEngineBuilder {
        QuotaEngineBuilder {
            catalog,
            store: None,
            resolver: None,
            clock: None,
            unresolved: UnresolvedTier::default(),
        }
    }

    /// The catalog this engine enforces.
    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    /// Resolve the tier that applies to `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaErrorKind::UnknownPrincipal`] if the resolver cannot place
    /// the principal and the engine is configured to fail closed.
    #[instrument(skip(self), fields(principal = %principal))]
    pub async fn resolve_tier(&self, principal: &Principal) -> MarketmateResult<Tier> {
        if let Some(tier) = self.resolver.resolve(principal).await {
            return Ok(tier);
        }
        match self.unresolved {
            UnresolvedTier::Fallback(tier) => {
                debug!(%tier, "Tier unresolved, falling back");
                Ok(tier)
            }
            UnresolvedTier::Deny => {
                warn!("Tier unresolved, failing closed");
                Err(QuotaError::new(QuotaErrorKind::UnknownPrincipal(
                    principal.to_string(),
                ))
                .into())
            }
        }
    }

    /// Charge `amount` to `principal` on `dimension` if it fits under the ceiling.
    ///
    /// Returns `false`, leaving the counter untouched, when the counter is
    /// already saturated or the charge would exceed the ceiling. A zero amount
    /// only checks for saturation.
    ///
    /// # Errors
    ///
    /// Returns an error if tier resolution fails closed or the store fails.
    pub async fn try_charge(
        &self,
        principal: &Principal,
        dimension: LimitDimension,
        amount: u64,
    ) -> MarketmateResult<bool> {
        let tier = self.resolve_tier(principal).await?;
        Ok(self.admit(principal, tier, dimension, amount).await?.admitted)
    }

    /// Record `amount` of measured consumption for `principal` on `dimension`.
    ///
    /// The amount is always added. Returns `false` if the counter now exceeds
    /// the ceiling, which makes the next zero-amount pre-charge deny.
    ///
    /// # Errors
    ///
    /// Returns an error if tier resolution fails closed or the store fails.
    pub async fn record_usage(
        &self,
        principal: &Principal,
        dimension: LimitDimension,
        amount: u64,
    ) -> MarketmateResult<bool> {
        let tier = self.resolve_tier(principal).await?;
        Ok(self.record(principal, tier, dimension, amount).await?.admitted)
    }

    /// Pre-charge with an already resolved tier, returning full details.
    #[instrument(skip(self), fields(principal = %principal, %tier, %dimension))]
    pub async fn admit(
        &self,
        principal: &Principal,
        tier: Tier,
        dimension: LimitDimension,
        amount: u64,
    ) -> MarketmateResult<Admission> {
        let ceiling = self.catalog.ceiling(tier, dimension);
        let window = self.catalog.window(dimension);
        let now = self.clock.now();
        let key = CounterKey::new(principal.clone(), dimension);

        let applied = self
            .store
            .transact(&key, now, &mut |counter: &mut WindowCounter| {
                pre_charge(counter, now, window, ceiling, amount)
            })
            .await?;

        let admission = self.admission(dimension, applied.admitted, applied.counter, ceiling, now);
        if admission.admitted {
            debug!(amount, count = admission.count, ceiling, "Charge admitted");
        } else {
            warn!(
                amount,
                count = admission.count,
                ceiling,
                retry_after_secs = admission.retry_after.as_secs(),
                "Charge denied"
            );
        }
        Ok(admission)
    }

    /// Post-charge with an already resolved tier, returning full details.
    #[instrument(skip(self), fields(principal = %principal, %tier, %dimension))]
    pub async fn record(
        &self,
        principal: &Principal,
        tier: Tier,
        dimension: LimitDimension,
        amount: u64,
    ) -> MarketmateResult<Admission> {
        let ceiling = self.catalog.ceiling(tier, dimension);
        let window = self.catalog.window(dimension);
        let now = self.clock.now();
        let key = CounterKey::new(principal.clone(), dimension);

        let applied = self
            .store
            .transact(&key, now, &mut |counter: &mut WindowCounter| {
                post_charge(counter, now, window, ceiling, amount)
            })
            .await?;

        let admission = self.admission(dimension, applied.admitted, applied.counter, ceiling, now);
        if admission.admitted {
            debug!(amount, count = admission.count, ceiling, "Usage recorded");
        } else {
            warn!(
                amount,
                count = admission.count,
                ceiling,
                "Usage recorded over ceiling; next request will be denied"
            );
        }
        Ok(admission)
    }

    /// Current usage of `principal` on `dimension`.
    ///
    /// Goes through the same atomic path as a charge, so an expired window is
    /// reported (and stored) as reset. A principal never seen before reports a
    /// fresh window.
    ///
    /// # Errors
    ///
    /// Returns an error if tier resolution fails closed or the store fails.
    #[instrument(skip(self), fields(principal = %principal, %dimension))]
    pub async fn usage(
        &self,
        principal: &Principal,
        dimension: LimitDimension,
    ) -> MarketmateResult<UsageSnapshot> {
        let tier = self.resolve_tier(principal).await?;
        let ceiling = self.catalog.ceiling(tier, dimension);
        let window = self.catalog.window(dimension);
        let now = self.clock.now();
        let key = CounterKey::new(principal.clone(), dimension);

        let applied = self
            .store
            .transact(&key, now, &mut |counter: &mut WindowCounter| {
                counter.roll(now, window);
                true
            })
            .await?;

        Ok(UsageSnapshot {
            count: applied.counter.count,
            ceiling,
            remaining: ceiling.saturating_sub(applied.counter.count),
            resets_at: applied.counter.resets_at(window),
        })
    }

    fn admission(
        &self,
        dimension: LimitDimension,
        admitted: bool,
        counter: WindowCounter,
        ceiling: u64,
        now: DateTime<Utc>,
    ) -> Admission {
        let resets_at = counter.resets_at(self.catalog.window(dimension));
        let retry_after = (resets_at - now).to_std().unwrap_or(Duration::ZERO);
        Admission {
            dimension,
            admitted,
            count: counter.count,
            ceiling,
            resets_at,
            retry_after,
        }
    }
}

/// Builder for [`QuotaEngine`].
pub struct QuotaEngineBuilder {
    catalog: TierCatalog,
    store: Option<Arc<dyn CounterStore>>,
    resolver: Option<Arc<dyn TierResolver>>,
    clock: Option<Arc<dyn Clock>>,
    unresolved: UnresolvedTier,
}

impl QuotaEngineBuilder {
    /// Use `store` for counters instead of a fresh in-memory store.
    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `resolver` to look up principal tiers.
    pub fn resolver(mut self, resolver: Arc<dyn TierResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use `clock` as the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the policy for principals the resolver cannot place.
    pub fn unresolved(mut self, policy: UnresolvedTier) -> Self {
        self.unresolved = policy;
        self
    }

    /// Builds the `QuotaEngine`.
    pub fn build(self) -> QuotaEngine {
        QuotaEngine {
            catalog: Arc::new(self.catalog),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryCounterStore::new())),
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(StaticTierResolver::default())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            unresolved: self.unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(count: u64) -> (WindowCounter, DateTime<Utc>) {
        let now = Utc::now();
        (WindowCounter { count, window_start: now }, now)
    }

    #[test]
    fn test_pre_charge_admits_up_to_ceiling() {
        let (mut c, now) = counter(2);
        assert!(pre_charge(&mut c, now, TimeDelta::seconds(60), 3, 1));
        assert_eq!(c.count, 3);
        assert!(!pre_charge(&mut c, now, TimeDelta::seconds(60), 3, 1));
        assert_eq!(c.count, 3);
    }

    #[test]
    fn test_zero_charge_denies_only_saturated() {
        let (mut c, now) = counter(39_999);
        assert!(pre_charge(&mut c, now, TimeDelta::seconds(60), 40_000, 0));
        assert_eq!(c.count, 39_999);

        let (mut c, now) = counter(40_000);
        assert!(!pre_charge(&mut c, now, TimeDelta::seconds(60), 40_000, 0));
    }

    #[test]
    fn test_pre_charge_rejects_oversized_amount_without_mutation() {
        let (mut c, now) = counter(5);
        assert!(!pre_charge(&mut c, now, TimeDelta::seconds(60), 10, 6));
        assert_eq!(c.count, 5);
    }

    #[test]
    fn test_post_charge_always_applies() {
        let (mut c, now) = counter(0);
        assert!(!post_charge(&mut c, now, TimeDelta::seconds(60), 40_000, 41_000));
        assert_eq!(c.count, 41_000);

        let (mut c, now) = counter(u64::MAX - 1);
        assert!(!post_charge(&mut c, now, TimeDelta::seconds(60), 10, 5));
        assert_eq!(c.count, u64::MAX);
    }

    #[test]
    fn test_transitions_roll_expired_window_first() {
        let (mut c, start) = counter(3);
        let later = start + TimeDelta::seconds(61);
        assert!(pre_charge(&mut c, later, TimeDelta::seconds(60), 3, 1));
        assert_eq!(c.count, 1);
        assert_eq!(c.window_start, later);
    }
}
