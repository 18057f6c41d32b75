//! Per-image render failures.
//!
//! A render failure never aborts a batch; it leaves a gap in the output set.

/// Reasons a single illustration could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RenderFailureKind {
    /// Every attempt failed with a transient error
    #[display("Gave up after {} attempts: {}", attempts, last_error)]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Message of the final error
        last_error: String,
    },
    /// A non-retryable error ended the attempts early
    #[display("Permanent failure: {}", _0)]
    Permanent(String),
    /// Image bytes were fetched but could not be written
    #[display("Failed to save image: {}", _0)]
    Save(String),
}

/// Failure to render one illustration, tagged with its sequence number.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Render Failure for image {}: {} at line {} in {}", sequence, kind, line, file)]
pub struct RenderFailure {
    /// 1-based sequence number of the illustration
    pub sequence: usize,
    /// What went wrong
    pub kind: RenderFailureKind,
    /// Line number where the failure was recorded
    pub line: u32,
    /// File where the failure was recorded
    pub file: &'static str,
}

impl RenderFailure {
    /// Create a new render failure with automatic location tracking.
    #[track_caller]
    pub fn new(sequence: usize, kind: RenderFailureKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            sequence,
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
