//! Top-level error wrapper types.

use crate::{
    ConfigError, JsonError, RemoteError, RenderFailure, SafetyError, StorageError,
    ValidationError,
};

/// Every error condition a pipeline run can surface.
///
/// # Examples
///
/// ```
/// use storyteller_error::{StorytellerError, StorytellerErrorKind, ConfigError};
///
/// let err: StorytellerError = ConfigError::new("bad temperature").into();
/// assert!(matches!(err.kind(), StorytellerErrorKind::Config(_)));
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum StorytellerErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Remote API error
    #[from(RemoteError)]
    Remote(RemoteError),
    /// Filesystem persistence error
    #[from(StorageError)]
    Storage(StorageError),
    /// Prompt rejected
    #[from(ValidationError)]
    Validation(ValidationError),
    /// Content safety check or rewrite error
    #[from(SafetyError)]
    Safety(SafetyError),
    /// Single illustration failure
    #[from(RenderFailure)]
    Render(RenderFailure),
}

/// Storyteller error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Storyteller Error: {}", _0)]
pub struct StorytellerError(Box<StorytellerErrorKind>);

impl StorytellerError {
    /// Create a new error from a kind.
    pub fn new(kind: StorytellerErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorytellerErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to StorytellerErrorKind
impl<T> From<T> for StorytellerError
where
    T: Into<StorytellerErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Storyteller operations.
pub type StorytellerResult<T> = std::result::Result<T, StorytellerError>;
