//! Retry and rate limiting for remote calls.
//!
//! - [`RetryPolicy`] runs a fallible async operation with bounded attempts.
//!   Rate-limit failures double the delay; other transient failures keep it.
//! - [`Sleeper`] abstracts the wait between attempts so tests stay deterministic.
//! - [`RateLimiter`] bounds requests per minute and concurrent requests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod limiter;
mod retry;
mod sleeper;

pub use limiter::{RateLimiter, RateLimiterGuard};
pub use retry::RetryPolicy;
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
