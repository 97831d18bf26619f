//! Quota engine error types.

/// Specific quota engine error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum QuotaErrorKind {
    /// Tier resolution failed and the engine is configured to fail closed
    #[display("Unknown principal '{}': no tier could be resolved", _0)]
    UnknownPrincipal(String),

    /// An admission policy was assembled with a dimension in the wrong phase
    #[display("Invalid admission policy: {}", _0)]
    InvalidPolicy(String),
}

/// Quota engine error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Quota Error: {} at line {} in {}", kind, line, file)]
pub struct QuotaError {
    /// The specific error kind
    pub kind: QuotaErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl QuotaError {
    /// Create a new quota error with location tracking.
    #[track_caller]
    pub fn new(kind: QuotaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &QuotaErrorKind {
        &self.kind
    }
}
