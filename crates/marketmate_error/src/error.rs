//! Top-level error wrapper types.

use crate::{ConfigError, JsonError, QuotaError, StoreError};

/// Foundation error enum covering every fallible MarketMate operation.
///
/// # Examples
///
/// ```
/// use marketmate_error::{MarketmateError, MarketmateErrorKind, ConfigError};
///
/// let err: MarketmateError = ConfigError::new("window duration must be positive").into();
/// assert!(matches!(err.kind(), MarketmateErrorKind::Config(_)));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum MarketmateErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Counter store error
    #[from(StoreError)]
    Store(StoreError),
    /// Quota engine error
    #[from(QuotaError)]
    Quota(QuotaError),
    /// JSON rendering error
    #[from(JsonError)]
    Json(JsonError),
}

/// MarketMate error with kind discrimination.
///
/// # Examples
///
/// ```
/// use marketmate_error::{MarketmateResult, StoreError, StoreErrorKind};
///
/// fn read_counter() -> MarketmateResult<u64> {
///     Err(StoreError::new(StoreErrorKind::Unavailable("timeout".into())))?
/// }
///
/// match read_counter() {
///     Ok(count) => println!("count: {}", count),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("MarketMate Error: {}", _0)]
pub struct MarketmateError(Box<MarketmateErrorKind>);

impl MarketmateError {
    /// Create a new error from a kind.
    pub fn new(kind: MarketmateErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MarketmateErrorKind {
        &self.0
    }
}

impl<T> From<T> for MarketmateError
where
    T: Into<MarketmateErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for MarketMate operations.
pub type MarketmateResult<T> = std::result::Result<T, MarketmateError>;
