//! Rate limiter implementation using governor and Tokio Semaphore.
//!
//! - Governor (GCRA algorithm) enforces the requests-per-minute quota
//! - Tokio Semaphore bounds concurrent requests

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limits image requests per minute and in flight.
///
/// Cloning shares the underlying quota and semaphore.
///
/// # Example
///
/// ```
/// use storyteller_rate_limit::RateLimiter;
///
/// # #[tokio::main]
/// # async fn main() {
/// let limiter = RateLimiter::new(Some(5), 2);
/// let guard = limiter.acquire().await;
/// assert_eq!(limiter.available_slots(), 1);
/// drop(guard);
/// assert_eq!(limiter.available_slots(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent_semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rpm_limited", &self.rpm_limiter.is_some())
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter.
    ///
    /// `requests_per_minute` of `None` (or zero) disables the quota.
    /// `max_concurrent` is clamped to at least one.
    pub fn new(requests_per_minute: Option<u32>, max_concurrent: usize) -> Self {
        let rpm_limiter = requests_per_minute.and_then(NonZeroU32::new).map(|n| {
            let quota = Quota::per_minute(n);
            Arc::new(GovernorRateLimiter::direct(quota))
        });
        let max_concurrent = max_concurrent.max(1);
        debug!(?requests_per_minute, max_concurrent, "Creating rate limiter");

        Self {
            rpm_limiter,
            concurrent_semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Wait until a request is allowed.
    ///
    /// Returns a guard that releases the concurrent slot when dropped.
    pub async fn acquire(&self) -> RateLimiterGuard {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }

        // Acquire concurrent request slot last to avoid holding it while waiting on quota
        let permit = match self.concurrent_semaphore.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                warn!(error = %e, "Concurrency semaphore closed, proceeding unbounded");
                None
            }
        };

        RateLimiterGuard { _permit: permit }
    }

    /// Try to acquire without waiting.
    ///
    /// Returns None if either limit would block.
    pub fn try_acquire(&self) -> Option<RateLimiterGuard> {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.check().ok()?;
        }
        let permit = self.concurrent_semaphore.clone().try_acquire_owned().ok()?;
        Some(RateLimiterGuard {
            _permit: Some(permit),
        })
    }

    /// Concurrent slots currently free.
    pub fn available_slots(&self) -> usize {
        self.concurrent_semaphore.available_permits()
    }
}

/// Guard that releases the concurrent request slot when dropped.
#[derive(Debug)]
pub struct RateLimiterGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
