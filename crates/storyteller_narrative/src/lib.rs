//! Story generation and orchestration for Storyteller.
//!
//! This crate turns a validated idea into an illustrated story:
//!
//! - [`StoryGenerator`] asks the text model for the story itself
//! - [`SceneExtractor`] derives illustration prompts, falling back to heuristics
//! - [`PromptOptimizer`] optionally improves prompts and grades the result
//! - [`ImageRenderer`] renders illustrations with retry and rate limiting
//! - [`PerformanceMonitor`] times each stage and samples resource usage
//! - [`StoryPipeline`] runs the stages in order and assembles the output folder

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod monitor;
mod optimizer;
mod pipeline;
mod renderer;
mod scene;
mod story;

pub use monitor::{
    OperationRecord, OperationStats, PerformanceFiles, PerformanceMonitor, ResourceSample,
};
pub use optimizer::{PromptOptimizer, STORY_PROMPT_SUFFIX, StoryAnalysis, save_optimization_results};
pub use pipeline::{PipelineStage, ProgressCallback, StoryOutcome, StoryPipeline, performance_dir};
pub use renderer::ImageRenderer;
pub use scene::{ParseStrategy, SceneExtractor, generic_scene_prompts};
pub use story::{FALLBACK_GENERATED_TITLE, StoryGenerator, ensure_title};
