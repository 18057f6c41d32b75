//! Prompt validation error types.

/// Reasons a story prompt is rejected.
///
/// The display strings are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ValidationErrorKind {
    /// Prompt shorter than the minimum
    #[display("Input is too short. Minimum {} characters required.", min)]
    TooShort {
        /// Minimum length in characters
        min: usize,
    },
    /// Prompt longer than the maximum
    #[display("Input is too long. Maximum {} characters allowed.", max)]
    TooLong {
        /// Maximum length in characters
        max: usize,
    },
    /// Prompt contains a forbidden word
    #[display(
        "Input contains inappropriate content ('{}'). Please provide a child-friendly story idea.",
        _0
    )]
    ForbiddenWord(String),
    /// User abandoned the interactive prompt
    #[display("Prompt entry cancelled")]
    Cancelled,
}

/// Prompt validation error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", kind, line, file)]
pub struct ValidationError {
    /// The specific error kind
    pub kind: ValidationErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new validation error with location tracking.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ValidationErrorKind {
        &self.kind
    }
}
