//! Admission control for MarketMate model calls.
//!
//! Every request that invokes the language model is gated against per-principal,
//! per-tier limits over two window lengths. Request counts are charged before
//! the model runs; token counts are charged after it runs, once the true cost
//! is known.
//!
//! ## Components
//!
//! - [`TierCatalog`] - ceilings per (tier, dimension), validated once at startup
//! - [`CounterStore`] - per (principal, dimension) window counters;
//!   [`InMemoryCounterStore`] is the process-local implementation
//! - [`QuotaEngine`] - lazy fixed-window charging with atomic check-and-apply
//! - [`AdmissionGate`] - wraps a protected operation with pre- and post-charges
//!
//! ## Example
//!
//! ```rust,ignore
//! use marketmate_quota::{AdmissionGate, AdmissionPolicy, Metered, QuotaConfig};
//! use std::sync::Arc;
//!
//! let engine = QuotaConfig::load()?.engine_builder()?.build();
//! let gate = AdmissionGate::new(Arc::new(engine));
//!
//! let reply = gate
//!     .guard(&user_id, &AdmissionPolicy::standard(), || async {
//!         let response = model.invoke(&conversation).await;
//!         let tokens = response.as_ref().map(|r| r.total_tokens).unwrap_or(0);
//!         Metered::new(response, tokens)
//!     })
//!     .await?;
//! ```

mod catalog;
mod clock;
mod config;
mod dimension;
mod engine;
mod gate;
mod principal;
mod resolver;
mod store;
mod tier;

pub use catalog::{TierCatalog, WindowDurations};
pub use clock::{Clock, ManualClock, SystemClock};
pub use self::config::{QuotaConfig, ResolutionConfig, TierLimits, WindowConfig};
pub use dimension::{ChargeTiming, LimitDimension, WindowKind};
pub use engine::{Admission, QuotaEngine, QuotaEngineBuilder, UsageSnapshot};
pub use gate::{AdmissionGate, AdmissionPolicy, Denial, GateError, Guarded, Metered};
pub use principal::Principal;
pub use resolver::{AssignedTierResolver, StaticTierResolver, TierResolver, UnresolvedTier};
pub use store::{Applied, CounterKey, CounterStore, InMemoryCounterStore, WindowCounter};
pub use tier::Tier;
