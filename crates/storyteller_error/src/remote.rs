//! Remote API error types and retry classification.

/// Remote API error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RemoteErrorKind {
    /// API key not found in environment
    #[display("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    /// Failed to build the HTTP client
    #[display("Failed to create API client: {}", _0)]
    ClientCreation(String),
    /// Provider rejected the request because of rate limiting
    #[display("Rate limit exceeded: {}", _0)]
    RateLimited(String),
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// Connection failed or timed out before a response arrived
    #[display("Connection failed: {}", _0)]
    Connection(String),
    /// Response arrived but could not be interpreted
    #[display("Invalid response: {}", _0)]
    InvalidResponse(String),
    /// Response contained no usable content
    #[display("Empty response: {}", _0)]
    EmptyResponse(String),
    /// Call was abandoned because the run was cancelled
    #[display("Remote call cancelled")]
    Cancelled,
}

impl RemoteErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteErrorKind::RateLimited(_) => true,
            RemoteErrorKind::Connection(_) => true,
            RemoteErrorKind::Api { status_code, .. } => {
                matches!(*status_code, 408 | 409 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Check if this error signals rate limiting (escalating backoff).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteErrorKind::RateLimited(_))
    }
}

/// Remote API error with source location tracking.
///
/// # Examples
///
/// ```
/// use storyteller_error::{RemoteError, RemoteErrorKind, RetryableError};
///
/// let err = RemoteError::new(RemoteErrorKind::RateLimited("slow down".to_string()));
/// assert!(err.is_retryable());
/// assert!(err.is_rate_limited());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Remote Error: {} at line {} in {}", kind, line, file)]
pub struct RemoteError {
    /// The kind of error that occurred
    pub kind: RemoteErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RemoteError {
    /// Create a new RemoteError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RemoteErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RemoteErrorKind {
        &self.kind
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Trait for errors that support retry logic.
///
/// Retry loops consult this to decide whether another attempt is worth making
/// and whether the backoff delay should escalate.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    ///
    /// Transient errors like 429 (rate limit), 503 (service unavailable) or
    /// dropped connections return true. Permanent errors like 401 or 400 return false.
    fn is_retryable(&self) -> bool;

    /// Returns true if the error is a rate limit, which doubles the next delay.
    fn is_rate_limited(&self) -> bool {
        false
    }
}

impl RetryableError for RemoteError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn is_rate_limited(&self) -> bool {
        self.kind.is_rate_limited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let api = |status_code| RemoteErrorKind::Api {
            status_code,
            message: String::new(),
        };
        assert!(api(503).is_retryable());
        assert!(api(500).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(401).is_retryable());
        assert!(RemoteErrorKind::Connection("reset".into()).is_retryable());
        assert!(!RemoteErrorKind::MissingApiKey.is_retryable());
        assert!(!RemoteErrorKind::Cancelled.is_retryable());
        assert!(!api(503).is_rate_limited());
        assert!(RemoteErrorKind::RateLimited("429".into()).is_rate_limited());
    }
}
