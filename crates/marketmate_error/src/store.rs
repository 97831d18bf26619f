//! Counter store error types.

/// Kinds of counter store errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StoreErrorKind {
    /// The backing store could not be reached
    #[display("Counter store unavailable: {}", _0)]
    Unavailable(String),
    /// An atomic update could not be applied after repeated conflicts
    #[display("Counter update contended: {}", _0)]
    Contention(String),
    /// A stored counter could not be decoded
    #[display("Counter record corrupted: {}", _0)]
    Corrupted(String),
}

/// Counter store error with location tracking.
///
/// The in-memory store never fails; these exist for networked stores that
/// synchronise counters across processes.
///
/// # Examples
///
/// ```
/// use marketmate_error::{StoreError, StoreErrorKind};
///
/// let err = StoreError::new(StoreErrorKind::Unavailable("connection refused".to_string()));
/// assert!(format!("{}", err).contains("unavailable"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Store Error: {} at line {} in {}", kind, line, file)]
pub struct StoreError {
    /// The kind of error that occurred
    pub kind: StoreErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StoreError {
    /// Create a new store error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StoreErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
