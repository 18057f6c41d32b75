//! Content safety error types.

/// Specific content safety error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SafetyErrorKind {
    /// The remote classifier could not be reached or failed
    #[display("Content classifier failed: {}", _0)]
    ClassifierFailed(String),
    /// The classifier answered with something that is not a verdict
    #[display("Unreadable classifier verdict: {}", _0)]
    InvalidVerdict(String),
    /// The remote rewrite call failed or returned nothing
    #[display("Content rewrite failed: {}", _0)]
    RewriteFailed(String),
    /// A pattern table entry did not compile
    #[display("Invalid pattern '{}': {}", pattern, reason)]
    InvalidPattern {
        /// Pattern source
        pattern: String,
        /// Compiler message
        reason: String,
    },
}

/// Content safety error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Content Safety Error: {} at line {} in {}", kind, line, file)]
pub struct SafetyError {
    /// The specific error kind
    pub kind: SafetyErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl SafetyError {
    /// Create a new safety error with location tracking.
    #[track_caller]
    pub fn new(kind: SafetyErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SafetyErrorKind {
        &self.kind
    }
}
