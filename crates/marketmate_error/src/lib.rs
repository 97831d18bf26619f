//! Error types for MarketMate.
//!
//! This crate provides the foundation error types shared by the admission-control
//! engine and its callers.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! A quota denial is deliberately absent from this hierarchy. Denials are an
//! expected outcome of admission control and are reported as values by the
//! gate, never as a [`MarketmateError`].
//!
//! # Examples
//!
//! ```
//! use marketmate_error::{ConfigError, MarketmateResult};
//!
//! fn load() -> MarketmateResult<u64> {
//!     Err(ConfigError::new("tier 'free' is missing 'rpm'"))?
//! }
//!
//! assert!(load().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod json;
mod quota;
mod store;

pub use config::ConfigError;
pub use error::{MarketmateError, MarketmateErrorKind, MarketmateResult};
pub use json::JsonError;
pub use quota::{QuotaError, QuotaErrorKind};
pub use store::{StoreError, StoreErrorKind};
