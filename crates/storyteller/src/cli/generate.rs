//! Story generation command handler.

use std::sync::Arc;
use storyteller_core::StoryConfig;
use storyteller_error::StorytellerResult;
use storyteller_interface::SharedDriver;
use storyteller_narrative::{PipelineStage, StoryOutcome, StoryPipeline};
use tokio_util::sync::CancellationToken;

/// Progress line shown for a stage, if any.
pub fn stage_message(stage: PipelineStage) -> Option<&'static str> {
    match stage {
        PipelineStage::Validating => Some("Checking your story idea..."),
        PipelineStage::OptimizingPrompt => Some("Optimizing the story prompt..."),
        PipelineStage::Generating => Some("Writing the story..."),
        PipelineStage::FilteringStory => Some("Checking the story is suitable for children..."),
        PipelineStage::SavingDocument => Some("Saving the story..."),
        PipelineStage::ExtractingScenes => Some("Choosing scenes to illustrate..."),
        PipelineStage::OptimizingImages => Some("Optimizing illustration prompts..."),
        PipelineStage::FilteringImages => Some("Checking illustration prompts..."),
        PipelineStage::RenderingImages => Some("Drawing illustrations (this can take a while)..."),
        PipelineStage::Finalizing => Some("Adding illustrations to the story..."),
        PipelineStage::Idle | PipelineStage::Done | PipelineStage::Failed => None,
    }
}

/// Run the pipeline for one idea, printing progress to stdout.
#[tracing::instrument(skip(config, driver, cancel))]
pub async fn generate_story(
    config: StoryConfig,
    driver: SharedDriver,
    idea: &str,
    cancel: CancellationToken,
) -> StorytellerResult<StoryOutcome> {
    let pipeline = StoryPipeline::new(config, driver)?
        .with_cancellation(cancel)
        .with_progress(Arc::new(|stage: PipelineStage| {
            if let Some(message) = stage_message(stage) {
                println!("{}", message);
            }
        }));

    pipeline.run(idea).await
}

/// Human-readable summary of a finished run.
pub fn render_outcome(outcome: &StoryOutcome) -> String {
    let mut lines = vec![
        String::new(),
        format!("Story: {}", outcome.title()),
        format!("Folder: {}", outcome.folder().display()),
        format!("Markdown: {}", outcome.markdown().display()),
        format!(
            "Generated {} of {} images",
            outcome.images().len(),
            outcome.requested_images()
        ),
    ];

    if let Some(analysis) = outcome.analysis() {
        lines.push(format!("Quality rating: {:.1}/10", analysis.overall_rating));
    }
    if let Some(dir) = outcome.performance_dir() {
        lines.push(format!("Performance data: {}", dir.display()));
    }

    lines.join("\n")
}
