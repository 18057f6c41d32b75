//! Retry timing against the real tokio clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use storyteller_error::{RemoteError, RemoteErrorKind};
use storyteller_rate_limit::{RateLimiter, RetryPolicy, TokioSleeper};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_rate_limit_then_success_waits_initial_backoff() {
    let policy = RetryPolicy::new(3, Duration::from_secs(5));
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = policy
        .run(&TokioSleeper, "image", || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(RemoteError::new(RemoteErrorKind::RateLimited(
                        "429 Too Many Requests".to_string(),
                    )))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 1);
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_escalating_rate_limit_delays() {
    let policy = RetryPolicy::new(3, Duration::from_secs(5));
    let start = Instant::now();

    let result: Result<(), RemoteError> = policy
        .run(&TokioSleeper, "story", || async {
            Err(RemoteError::new(RemoteErrorKind::RateLimited(
                "429".to_string(),
            )))
        })
        .await;

    assert!(result.is_err());
    assert!(start.elapsed() >= Duration::from_secs(15));
    assert!(start.elapsed() < Duration::from_secs(35));
}

#[tokio::test]
async fn test_limiter_guards_release_on_drop() {
    let limiter = RateLimiter::new(None, 1);
    {
        let _guard = limiter.acquire().await;
        assert_eq!(limiter.available_slots(), 0);
    }
    assert_eq!(limiter.available_slots(), 1);
}
