//! Storyteller - illustrated children's stories from a one-line idea.
//!
//! Storyteller validates a story idea, asks a text model for a story, filters it
//! for young readers, derives illustration prompts, renders them with an image
//! model, and writes a markdown file with the images spliced in.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storyteller::{OpenAiClient, StoryConfig, StoryPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoryConfig::load()?;
//!     let client = OpenAiClient::from_env(config.api_base_url().clone(), config.request_timeout())?;
//!
//!     let pipeline = StoryPipeline::new(config, Arc::new(client))?;
//!     let outcome = pipeline.run("A friendly dragon who helps children learn about recycling").await?;
//!     println!("Story saved to {}", outcome.markdown().display());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Storyteller is organized as a workspace with focused crates:
//!
//! - `storyteller_error` - Error types
//! - `storyteller_core` - Configuration, requests, stories and scene prompts
//! - `storyteller_interface` - `StoryDriver` trait and the scripted test driver
//! - `storyteller_rate_limit` - Retry policy and request throttling
//! - `storyteller_models` - OpenAI client
//! - `storyteller_security` - Prompt validation and content safety
//! - `storyteller_storage` - Story folders and markdown
//! - `storyteller_narrative` - Story generation and the pipeline
//!
//! This crate re-exports everything for convenience and hosts the command-line interface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;

pub use storyteller_core::{
    ConfigOverrides, GeneratedImage, ImagePayload, ImageRequest, Prompt, ScenePrompt, Story,
    StoryConfig, TextRequest, extract_title,
};
pub use storyteller_error::{
    RemoteError, RemoteErrorKind, StorytellerError, StorytellerErrorKind, StorytellerResult,
};
pub use storyteller_interface::{SharedDriver, StoryDriver};
pub use storyteller_models::OpenAiClient;
pub use storyteller_narrative::{
    PerformanceMonitor, PipelineStage, PromptOptimizer, SceneExtractor, StoryAnalysis,
    StoryGenerator, StoryOutcome, StoryPipeline,
};
pub use storyteller_rate_limit::{RateLimiter, RetryPolicy};
pub use storyteller_security::{ContentSafetyFilter, PromptValidator};
pub use storyteller_storage::{DocumentAssembler, StorySummary, list_stories};
