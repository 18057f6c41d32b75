//! Core data types for the Storyteller pipeline.
//!
//! This crate holds the types shared by every stage of a story run: the remote
//! request shapes, the immutable [`StoryConfig`], the story text itself, scene
//! prompts, the records produced by content checks, and JSON extraction from
//! model responses.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod content;
mod extraction;
mod request;
mod scene;
mod story;

pub use config::{ConfigOverrides, StoryConfig, StoryConfigBuilder, StoryConfigBuilderError};
pub use content::{ContentCategory, ContentCheckResult, PatternIssue, RemoteVerdict};
pub use extraction::extract_json;
pub use request::{
    ImagePayload, ImageRequest, ImageRequestBuilder, ImageRequestBuilderError, TextRequest,
    TextRequestBuilder, TextRequestBuilderError,
};
pub use scene::{GeneratedImage, SCENE_STYLE_SUFFIX, ScenePrompt};
pub use story::{DEFAULT_STORY_TITLE, Prompt, Story, extract_title};
