//! Bounded retry with rate-limit aware backoff.

use crate::Sleeper;
use std::future::Future;
use std::time::Duration;
use storyteller_error::RetryableError;
use tracing::{debug, warn};

/// Retry policy for a single remote call.
///
/// Each call starts at `initial_delay`. After a failed attempt:
/// - rate limited: wait the current delay, then double it
/// - other transient error: wait the current delay unchanged
/// - permanent error: return it immediately
///
/// No wait follows the final attempt.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use storyteller_rate_limit::{RecordingSleeper, RetryPolicy};
/// use storyteller_error::{RemoteError, RemoteErrorKind};
///
/// # #[tokio::main]
/// # async fn main() {
/// let policy = RetryPolicy::new(3, Duration::from_secs(5));
/// let sleeper = RecordingSleeper::default();
///
/// let result: Result<(), RemoteError> = policy
///     .run(&sleeper, "image", || async {
///         Err(RemoteError::new(RemoteErrorKind::RateLimited("slow down".into())))
///     })
///     .await;
///
/// assert!(result.is_err());
/// assert_eq!(sleeper.delays(), vec![Duration::from_secs(5), Duration::from_secs(10)]);
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Maximum attempts per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// The returned error is the last one observed. If it is still retryable,
    /// every attempt was used.
    pub async fn run<T, E, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, E>
    where
        E: RetryableError + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            debug!(operation = operation_name, attempt, "Attempting remote call");
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!(operation = operation_name, attempt, error = %error, "Permanent error, not retrying");
                return Err(error);
            }
            if attempt >= self.max_attempts {
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %error,
                    "Giving up after maximum attempts"
                );
                return Err(error);
            }

            let rate_limited = error.is_rate_limited();
            warn!(
                operation = operation_name,
                attempt,
                rate_limited,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient error, retrying"
            );
            sleeper.sleep(delay).await;
            if rate_limited {
                delay *= 2;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingSleeper;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storyteller_error::{RemoteError, RemoteErrorKind};

    fn api_error(status_code: u16) -> RemoteError {
        RemoteError::new(RemoteErrorKind::Api {
            status_code,
            message: "boom".to_string(),
        })
    }

    #[tokio::test]
    async fn test_api_errors_keep_delay() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), RemoteError> = policy
            .run(&sleeper, "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(api_error(503)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(5), Duration::from_secs(5)]
        );
    }

    #[tokio::test]
    async fn test_permanent_error_stops_immediately() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), RemoteError> = policy
            .run(&sleeper, "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(api_error(401)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_success_after_rate_limit() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = policy
            .run(&sleeper, "test", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err(RemoteError::new(RemoteErrorKind::RateLimited(
                            "429".to_string(),
                        )))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
