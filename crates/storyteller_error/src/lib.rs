//! Error types for the Storyteller pipeline.
//!
//! This crate provides the foundation error types used throughout the Storyteller workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use storyteller_error::{StorytellerResult, StorageError, StorageErrorKind};
//!
//! fn save() -> StorytellerResult<()> {
//!     Err(StorageError::new(StorageErrorKind::FileWrite("story.md".to_string())))?
//! }
//!
//! assert!(save().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod json;
mod remote;
mod render;
mod safety;
mod storage;
mod validation;

pub use config::ConfigError;
pub use error::{StorytellerError, StorytellerErrorKind, StorytellerResult};
pub use json::JsonError;
pub use remote::{RemoteError, RemoteErrorKind, RemoteResult, RetryableError};
pub use render::{RenderFailure, RenderFailureKind};
pub use safety::{SafetyError, SafetyErrorKind};
pub use storage::{StorageError, StorageErrorKind};
pub use validation::{ValidationError, ValidationErrorKind};
