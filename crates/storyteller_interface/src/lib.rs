//! Remote client trait for the Storyteller pipeline.
//!
//! Every component that talks to the generative API receives the same
//! `Arc<dyn StoryDriver>`, so a test double can stand in for the real client.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

#[cfg(any(test, feature = "mock"))]
mod mock;

pub use traits::{SharedDriver, StoryDriver};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBehavior, MockDriver, MockResponse};
