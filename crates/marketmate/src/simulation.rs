//! Offline admission simulation.
//!
//! Replays a burst of model calls against a configured catalog with a manual
//! clock, so operators can see which call trips which ceiling without running
//! a model.

use chrono::TimeDelta;
use marketmate_error::MarketmateResult;
use marketmate_quota::{
    AdmissionGate, AdmissionPolicy, GateError, LimitDimension, ManualClock, Metered, Principal,
    QuotaConfig, StaticTierResolver, Tier, UsageSnapshot,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, instrument};

/// Parameters for one simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Principal every call is made as
    pub principal: Principal,
    /// Tier the principal resolves to
    pub tier: Tier,
    /// Number of calls to attempt
    pub requests: u64,
    /// Tokens each admitted call reports
    pub tokens: u64,
    /// Seconds between consecutive calls
    pub interval_secs: u32,
}

/// What happened to one simulated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    /// The call ran and was charged
    Admitted {
        /// Post-charge dimensions the call pushed over their ceiling
        overrun: Vec<LimitDimension>,
    },
    /// The call was refused before running
    Denied {
        /// Dimension that refused the call
        dimension: LimitDimension,
        /// Seconds until that dimension's window rolls over
        retry_after_secs: u64,
        /// Message a client would see
        message: String,
    },
}

/// One simulated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedCall {
    /// 1-based position in the run
    pub index: u64,
    /// Simulated seconds since the first call
    pub elapsed_secs: u64,
    /// Admission outcome
    #[serde(flatten)]
    pub outcome: CallOutcome,
}

/// Result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Principal the calls were made as
    pub principal: Principal,
    /// Tier that applied
    pub tier: Tier,
    /// Every attempted call, in order
    pub calls: Vec<SimulatedCall>,
    /// Counter state after the last call
    pub usage: BTreeMap<LimitDimension, UsageSnapshot>,
}

impl SimulationReport {
    /// Number of calls that ran.
    pub fn admitted(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call.outcome, CallOutcome::Admitted { .. }))
            .count()
    }

    /// Number of calls refused, per dimension.
    pub fn denied_by(&self) -> BTreeMap<LimitDimension, usize> {
        let mut denied = BTreeMap::new();
        for call in &self.calls {
            if let CallOutcome::Denied { dimension, .. } = call.outcome {
                *denied.entry(dimension).or_insert(0) += 1;
            }
        }
        denied
    }
}

/// Run `options.requests` metered calls through a fresh gate built from `config`.
///
/// Counters start empty and live only for the run. The clock starts at the
/// current time and advances `interval_secs` between calls.
///
/// # Errors
///
/// Returns an error if the configuration does not validate.
#[instrument(skip(config), fields(principal = %options.principal, tier = %options.tier))]
pub async fn simulate(
    config: &QuotaConfig,
    options: &SimulationOptions,
) -> MarketmateResult<SimulationReport> {
    let clock = Arc::new(ManualClock::default());
    let engine = config
        .engine_builder()?
        .resolver(Arc::new(StaticTierResolver::new(options.tier)))
        .clock(clock.clone())
        .build();
    let gate = AdmissionGate::new(Arc::new(engine));
    let policy = AdmissionPolicy::standard();
    let step = TimeDelta::seconds(i64::from(options.interval_secs));

    let mut calls = Vec::new();
    for n in 0..options.requests {
        if n > 0 {
            clock.advance(step);
        }

        let result = gate
            .guard(&options.principal, &policy, || async {
                Metered::new(Ok::<_, Infallible>(()), options.tokens)
            })
            .await;

        let outcome = match result {
            Ok(guarded) => CallOutcome::Admitted {
                overrun: guarded.overrun,
            },
            Err(GateError::Denied(denial)) => CallOutcome::Denied {
                dimension: denial.dimension,
                retry_after_secs: denial.retry_after_secs(),
                message: denial.message(),
            },
            Err(GateError::Quota(e)) => return Err(e),
            Err(GateError::Operation(never)) => match never {},
        };

        calls.push(SimulatedCall {
            index: n + 1,
            elapsed_secs: n * u64::from(options.interval_secs),
            outcome,
        });
    }

    let mut usage = BTreeMap::new();
    for dimension in LimitDimension::iter() {
        usage.insert(
            dimension,
            gate.engine().usage(&options.principal, dimension).await?,
        );
    }

    let report = SimulationReport {
        principal: options.principal.clone(),
        tier: options.tier,
        calls,
        usage,
    };
    info!(
        requests = options.requests,
        admitted = report.admitted(),
        "Simulation complete"
    );
    Ok(report)
}
