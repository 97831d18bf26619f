//! Admission gate around a protected, metered operation.
//!
//! [`AdmissionGate::guard`] runs the admission walk before the operation and
//! the usage accounting after it:
//!
//! 1. Walk the policy's dimensions in [`LimitDimension`] order. Pre-charge
//!    dimensions are charged one unit; post-charge dimensions are checked with a
//!    zero charge. The first denial stops the walk and the operation never runs.
//! 2. Run the operation. No counter lock is held while it is in flight.
//! 3. Charge each post-charge dimension with the measured cost. Overruns are
//!    reported, never turned into a failure of the finished operation.
//!
//! If the future returned by `guard` is dropped while the operation is in
//! flight, step 3 is skipped and the cost counts as zero. Nothing is reserved
//! in step 1, so cancellation leaves no dangling state.

use crate::{Admission, LimitDimension, Principal, QuotaEngine};
use marketmate_error::{MarketmateError, MarketmateResult, QuotaError, QuotaErrorKind};
use reqwest::StatusCode;
use serde_json::json;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tracing::{debug, error, instrument, warn};

/// Output of a protected operation together with the resources it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metered<T> {
    /// What the operation produced
    pub output: T,
    /// Measured consumption (tokens for MarketMate model calls)
    pub cost: u64,
}

impl<T> Metered<T> {
    /// Wrap `output` with its measured `cost`.
    pub fn new(output: T, cost: u64) -> Self {
        Self { output, cost }
    }

    /// Wrap `output` that consumed nothing measurable.
    pub fn unmetered(output: T) -> Self {
        Self { output, cost: 0 }
    }
}

/// Which dimensions a gate charges, and when.
///
/// # Example
///
/// ```
/// use marketmate_quota::{AdmissionPolicy, LimitDimension};
///
/// let policy = AdmissionPolicy::standard();
/// assert!(policy.pre().contains(&LimitDimension::RequestsPerMinute));
/// assert!(policy.post().contains(&LimitDimension::TokensPerDay));
///
/// // Token dimensions cannot be pre-charged: their cost is unknown up front.
/// assert!(AdmissionPolicy::new([LimitDimension::TokensPerMinute], []).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pre: BTreeSet<LimitDimension>,
    post: BTreeSet<LimitDimension>,
}

impl AdmissionPolicy {
    /// Build a policy from pre-charge and post-charge dimension sets.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaErrorKind::InvalidPolicy`] if a variable-cost dimension is
    /// listed as pre-charge or a fixed-cost dimension as post-charge.
    pub fn new(
        pre: impl IntoIterator<Item = LimitDimension>,
        post: impl IntoIterator<Item = LimitDimension>,
    ) -> MarketmateResult<Self> {
        let pre: BTreeSet<_> = pre.into_iter().collect();
        let post: BTreeSet<_> = post.into_iter().collect();

        if let Some(dimension) = pre.iter().find(|d| !d.is_fixed_cost()) {
            return Err(QuotaError::new(QuotaErrorKind::InvalidPolicy(format!(
                "{} is variable-cost and cannot be pre-charged",
                dimension
            )))
            .into());
        }
        if let Some(dimension) = post.iter().find(|d| d.is_fixed_cost()) {
            return Err(QuotaError::new(QuotaErrorKind::InvalidPolicy(format!(
                "{} is fixed-cost and cannot be post-charged",
                dimension
            )))
            .into());
        }
        Ok(Self { pre, post })
    }

    /// Every dimension, each in the phase its charging model requires.
    pub fn standard() -> Self {
        let (pre, post) = LimitDimension::iter().partition(|d| d.is_fixed_cost());
        Self { pre, post }
    }

    /// Dimensions charged one unit before the operation.
    pub fn pre(&self) -> &BTreeSet<LimitDimension> {
        &self.pre
    }

    /// Dimensions charged the measured cost after the operation.
    pub fn post(&self) -> &BTreeSet<LimitDimension> {
        &self.post
    }

    /// The admission walk: each dimension with its up-front charge, in order.
    ///
    /// Request dimensions sort ahead of token dimensions, so a principal held
    /// back by a token ceiling still spends one RPM and one RPD unit on every
    /// denied retry.
    fn walk(&self) -> impl Iterator<Item = (LimitDimension, u64)> + '_ {
        let mut all: Vec<_> = self
            .pre
            .iter()
            .map(|d| (*d, 1))
            .chain(self.post.iter().map(|d| (*d, 0)))
            .collect();
        all.sort_by_key(|(d, _)| *d);
        all.into_iter()
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// A request refused because a dimension's ceiling was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Dimension whose ceiling was reached
    pub dimension: LimitDimension,
    /// Counter value at the time of the denial
    pub count: u64,
    /// Ceiling that applied
    pub ceiling: u64,
    /// Time until the denying window rolls over
    pub retry_after: Duration,
}

impl Denial {
    fn from_admission(admission: &Admission) -> Self {
        Self {
            dimension: admission.dimension,
            count: admission.count,
            ceiling: admission.ceiling,
            retry_after: admission.retry_after,
        }
    }

    /// Human-readable message naming the exceeded dimension.
    pub fn message(&self) -> String {
        format!(
            "Rate limit exceeded for {}. Please try again later.",
            self.dimension
        )
    }

    /// HTTP status a web layer should answer with.
    pub fn status(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    /// Whole seconds to advertise in a `Retry-After` header (at least one).
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        secs.max(1)
    }

    /// JSON error body a web layer should answer with.
    pub fn to_json(&self) -> serde_json::Value {
        json!({ "error": self.message() })
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Why a guarded call did not produce an output.
#[derive(Debug)]
pub enum GateError<E> {
    /// A dimension's ceiling was reached; the operation never ran
    Denied(Denial),
    /// The operation ran and failed; its error is passed through unchanged
    Operation(E),
    /// Tier resolution or the counter store failed
    Quota(MarketmateError),
}

impl<E> GateError<E> {
    /// The denial, if this is one.
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            GateError::Denied(denial) => Some(denial),
            _ => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateError::Denied(denial) => write!(f, "Admission denied: {}", denial),
            GateError::Operation(e) => write!(f, "Protected operation failed: {}", e),
            GateError::Quota(e) => write!(f, "{}", e),
        }
    }
}

impl<E> std::error::Error for GateError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GateError::Denied(_) => None,
            GateError::Operation(e) => Some(e),
            GateError::Quota(e) => Some(e),
        }
    }
}

/// Successful output of a guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guarded<T> {
    /// What the protected operation produced
    pub output: T,
    /// Post-charge dimensions this call pushed over their ceiling
    pub overrun: Vec<LimitDimension>,
}

/// Reusable guard placed in front of a protected operation.
///
/// # Example
///
/// ```
/// use marketmate_quota::{AdmissionGate, AdmissionPolicy, Metered, QuotaEngine, TierCatalog};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let catalog = TierCatalog::bundled().unwrap();
/// let gate = AdmissionGate::new(Arc::new(QuotaEngine::builder(catalog).build()));
/// let policy = AdmissionPolicy::standard();
///
/// let answer = gate
///     .guard(&"alice".into(), &policy, || async {
///         Metered::new(Ok::<_, std::io::Error>("The P/E ratio is 28.7"), 1_200)
///     })
///     .await
///     .unwrap();
/// assert_eq!(answer.output, "The P/E ratio is 28.7");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    engine: Arc<QuotaEngine>,
}

impl AdmissionGate {
    /// Create a gate charging against `engine`.
    pub fn new(engine: Arc<QuotaEngine>) -> Self {
        Self { engine }
    }

    /// The engine this gate charges against.
    pub fn engine(&self) -> &QuotaEngine {
        &self.engine
    }

    /// Admit, run, and account for one protected operation.
    ///
    /// The operation reports its measured cost even when it fails (zero if it
    /// failed before consuming anything); that cost is post-charged before the
    /// failure is returned as [`GateError::Operation`].
    ///
    /// # Errors
    ///
    /// - [`GateError::Denied`] naming the first dimension in order that was at
    ///   its ceiling; the operation was not invoked.
    /// - [`GateError::Operation`] with the operation's own error.
    /// - [`GateError::Quota`] if tier resolution or the store failed before the
    ///   operation ran.
    #[instrument(skip(self, policy, operation), fields(principal = %principal))]
    pub async fn guard<T, E, F, Fut>(
        &self,
        principal: &Principal,
        policy: &AdmissionPolicy,
        operation: F,
    ) -> Result<Guarded<T>, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Metered<Result<T, E>>>,
    {
        let tier = self
            .engine
            .resolve_tier(principal)
            .await
            .map_err(GateError::Quota)?;

        for (dimension, amount) in policy.walk() {
            let admission = self
                .engine
                .admit(principal, tier, dimension, amount)
                .await
                .map_err(GateError::Quota)?;
            if !admission.admitted {
                let denial = Denial::from_admission(&admission);
                warn!(%dimension, %tier, "Request denied: {}", denial);
                return Err(GateError::Denied(denial));
            }
        }

        debug!(%tier, "Admitted, invoking protected operation");
        let Metered { output, cost } = operation().await;

        let mut overrun = Vec::new();
        for dimension in policy.post() {
            match self.engine.record(principal, tier, *dimension, cost).await {
                Ok(admission) if !admission.admitted => overrun.push(*dimension),
                Ok(_) => {}
                Err(e) => error!(%dimension, cost, error = %e, "Failed to record usage"),
            }
        }
        if !overrun.is_empty() {
            warn!(?overrun, cost, "Call completed over ceiling");
        }

        output
            .map(|output| Guarded { output, overrun })
            .map_err(GateError::Operation)
    }
}
