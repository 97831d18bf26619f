//! MarketMate admission control.
//!
//! MarketMate answers finance questions with a language model. Every model call
//! is gated per principal and per subscription tier on four dimensions:
//! requests and tokens, each per minute and per day.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use marketmate::{AdmissionGate, AdmissionPolicy, GateError, Metered, QuotaConfig};
//! use std::sync::Arc;
//!
//! let engine = QuotaConfig::load()?.engine_builder()?.build();
//! let gate = AdmissionGate::new(Arc::new(engine));
//!
//! match gate
//!     .guard(&user_id.into(), &AdmissionPolicy::standard(), || async {
//!         let reply = chain.invoke(&messages).await;
//!         let tokens = reply.as_ref().map(|r| r.usage.total_tokens).unwrap_or(0);
//!         Metered::new(reply, tokens)
//!     })
//!     .await
//! {
//!     Ok(guarded) => respond(guarded.output),
//!     Err(GateError::Denied(denial)) => reject(denial.status(), denial.to_json()),
//!     Err(e) => fail(e),
//! }
//! ```
//!
//! # Architecture
//!
//! - `marketmate-error` - Error types
//! - `marketmate-quota` - Tier catalog, counter store, quota engine and admission gate
//!
//! This crate (`marketmate`) re-exports both and adds logging setup and the
//! offline simulator used by the `marketmate` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod observability;
mod simulation;

pub use observability::{LogFormat, init_tracing};
pub use simulation::{CallOutcome, SimulatedCall, SimulationOptions, SimulationReport, simulate};

// Re-export error types
pub use marketmate_error::{
    ConfigError, JsonError, MarketmateError, MarketmateErrorKind, MarketmateResult, QuotaError,
    QuotaErrorKind, StoreError, StoreErrorKind,
};

// Re-export admission control
pub use marketmate_quota::{
    Admission, AdmissionGate, AdmissionPolicy, Applied, AssignedTierResolver, ChargeTiming, Clock,
    CounterKey, CounterStore, Denial, GateError, Guarded, InMemoryCounterStore, LimitDimension,
    ManualClock, Metered, Principal, QuotaConfig, QuotaEngine, QuotaEngineBuilder,
    ResolutionConfig, StaticTierResolver, SystemClock, Tier, TierCatalog, TierLimits,
    TierResolver, UnresolvedTier, UsageSnapshot, WindowConfig, WindowCounter, WindowDurations,
    WindowKind,
};
