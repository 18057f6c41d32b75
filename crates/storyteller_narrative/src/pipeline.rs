//! End-to-end story run.

use crate::{
    ImageRenderer, PerformanceMonitor, PromptOptimizer, SceneExtractor, StoryAnalysis,
    StoryGenerator, save_optimization_results,
};
use derive_getters::Getters;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyteller_core::{GeneratedImage, ScenePrompt, Story, StoryConfig};
use storyteller_error::{RemoteError, RemoteErrorKind, StorytellerResult};
use storyteller_interface::SharedDriver;
use storyteller_rate_limit::{Sleeper, TokioSleeper};
use storyteller_security::{ContentSafetyFilter, PromptValidator};
use storyteller_storage::DocumentAssembler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PipelineStage {
    /// Not started
    Idle,
    /// Checking the raw prompt
    Validating,
    /// Enhancing the story prompt
    OptimizingPrompt,
    /// Generating story text
    Generating,
    /// Making story text age-appropriate
    FilteringStory,
    /// Creating the story folder and markdown file
    SavingDocument,
    /// Deriving illustration prompts from the story
    ExtractingScenes,
    /// Improving illustration prompts
    OptimizingImages,
    /// Making illustration prompts age-appropriate
    FilteringImages,
    /// Rendering illustrations
    RenderingImages,
    /// Inserting images and writing run records
    Finalizing,
    /// Finished
    Done,
    /// Stopped by an error
    Failed,
}

impl PipelineStage {
    /// Name under which the stage is timed.
    pub fn operation_name(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "Idle",
            PipelineStage::Validating => "Input Handling",
            PipelineStage::OptimizingPrompt => "Prompt Optimization",
            PipelineStage::Generating => "Story Generation",
            PipelineStage::FilteringStory => "Content Filtering",
            PipelineStage::SavingDocument => "File Management",
            PipelineStage::ExtractingScenes => "Image Prompt Creation",
            PipelineStage::OptimizingImages => "Image Prompt Optimization",
            PipelineStage::FilteringImages => "Image Prompt Filtering",
            PipelineStage::RenderingImages => "Image Generation",
            PipelineStage::Finalizing => "Markdown Update",
            PipelineStage::Done => "Done",
            PipelineStage::Failed => "Failed",
        }
    }
}

/// Called on every stage transition.
pub type ProgressCallback = Arc<dyn Fn(PipelineStage) + Send + Sync>;

/// What a successful run produced.
#[derive(Debug, Clone, Getters)]
pub struct StoryOutcome {
    /// Story folder
    folder: PathBuf,
    /// Markdown file inside the folder
    markdown: PathBuf,
    /// Story title
    title: String,
    /// Illustrations saved, in sequence order
    images: Vec<GeneratedImage>,
    /// Illustrations asked for
    requested_images: usize,
    /// Quality analysis, when optimization ran
    analysis: Option<StoryAnalysis>,
    /// Directory holding the performance records, if they were written
    performance_dir: Option<PathBuf>,
}

/// Coordinates one story run from raw prompt to illustrated markdown.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use storyteller_core::StoryConfig;
/// use storyteller_interface::SharedDriver;
/// use storyteller_narrative::StoryPipeline;
///
/// # async fn run(driver: SharedDriver) -> storyteller_error::StorytellerResult<()> {
/// let pipeline = StoryPipeline::new(StoryConfig::default(), driver)?;
/// let outcome = pipeline.run("A brave little turtle who learns to swim").await?;
/// println!("{} images in {}", outcome.images().len(), outcome.folder().display());
/// # Ok(())
/// # }
/// ```
pub struct StoryPipeline {
    config: StoryConfig,
    driver: SharedDriver,
    validator: PromptValidator,
    filter: ContentSafetyFilter,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for StoryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryPipeline")
            .field("provider", &self.driver.provider_name())
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StoryPipeline {
    /// Build a pipeline around a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range or a safety
    /// pattern fails to compile.
    pub fn new(config: StoryConfig, driver: SharedDriver) -> StorytellerResult<Self> {
        config.validate()?;
        let validator = PromptValidator::new()?;
        let filter = ContentSafetyFilter::new(driver.clone(), config.story_model().clone())?;
        Ok(Self {
            config,
            driver,
            validator,
            filter,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Replace the retry sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Abort remote calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report stage transitions to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Token that cancels this pipeline.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The run configuration.
    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    /// Run every stage for `raw_prompt`.
    ///
    /// Validation, generation and saving failures end the run. Scene
    /// extraction falls back to heuristics and individual image failures
    /// only shrink the image set.
    ///
    /// # Errors
    ///
    /// Returns the terminal error, or [`RemoteErrorKind::Cancelled`] when the
    /// cancellation token fires during a remote stage.
    #[instrument(skip(self, raw_prompt), fields(prompt_len = raw_prompt.len()))]
    pub async fn run(&self, raw_prompt: &str) -> StorytellerResult<StoryOutcome> {
        info!(stage = %PipelineStage::Idle, "Starting story pipeline");
        let mut monitor = PerformanceMonitor::new(*self.config.max_history());
        monitor.start_monitoring(self.config.sampling_interval());

        let mut folder = None;
        match self.execute(raw_prompt, &mut monitor, &mut folder).await {
            Ok(outcome) => {
                self.report(PipelineStage::Done);
                info!(
                    folder = %outcome.folder.display(),
                    images = outcome.images.len(),
                    "Story generation complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.report(PipelineStage::Failed);
                error!(error = %e, "Story pipeline failed");
                monitor.stop_monitoring().await;
                if let Some(folder) = folder {
                    if let Err(save) = monitor.save_performance_data(&performance_dir(&folder)).await {
                        warn!(error = %save, "Failed to save performance data");
                    }
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        raw_prompt: &str,
        monitor: &mut PerformanceMonitor,
        folder_slot: &mut Option<PathBuf>,
    ) -> StorytellerResult<StoryOutcome> {
        let optimize = *self.config.optimize_prompts();
        let filter_content = *self.config.content_filter();
        let optimizer = PromptOptimizer::new(self.driver.clone(), self.config.story_model().clone());
        let assembler = DocumentAssembler::new(self.config.output_dir().clone());

        self.enter(monitor, PipelineStage::Validating);
        let validated = self.validator.validate(raw_prompt);
        self.leave(monitor, PipelineStage::Validating);
        let prompt = validated?;

        let story_prompt = if optimize {
            self.enter(monitor, PipelineStage::OptimizingPrompt);
            let enhanced = optimizer.enhance_story_prompt(&prompt);
            self.leave(monitor, PipelineStage::OptimizingPrompt);
            enhanced
        } else {
            prompt.clone()
        };

        self.enter(monitor, PipelineStage::Generating);
        let generator = StoryGenerator::new(self.driver.clone(), &self.config, self.sleeper.clone());
        let generated = self.cancellable(generator.generate(&story_prompt)).await;
        self.leave(monitor, PipelineStage::Generating);
        let mut story: Story = generated??;

        if filter_content {
            self.enter(monitor, PipelineStage::FilteringStory);
            let filtered = self.cancellable(self.filter.filter_story(story.text())).await;
            self.leave(monitor, PipelineStage::FilteringStory);
            story.replace_text(filtered?);
        }

        let title = story.title();
        self.enter(monitor, PipelineStage::SavingDocument);
        let saved = self.save_document(&assembler, &story, &title, folder_slot).await;
        self.leave(monitor, PipelineStage::SavingDocument);
        let (folder, markdown) = saved?;

        self.enter(monitor, PipelineStage::ExtractingScenes);
        let extractor = SceneExtractor::new(
            self.driver.clone(),
            self.config.story_model().clone(),
            *self.config.images_per_story(),
        );
        let extracted = self.cancellable(extractor.extract(story.text())).await;
        self.leave(monitor, PipelineStage::ExtractingScenes);
        let mut scenes = extracted?;

        if optimize {
            self.enter(monitor, PipelineStage::OptimizingImages);
            let optimized = self
                .cancellable(optimizer.optimize_image_prompts(story.text(), &scenes))
                .await;
            self.leave(monitor, PipelineStage::OptimizingImages);
            scenes = optimized?;
        }

        if filter_content {
            self.enter(monitor, PipelineStage::FilteringImages);
            scenes = scenes
                .iter()
                .map(|scene| ScenePrompt::from_text(self.filter.filter_image_prompt(scene.text())))
                .collect();
            self.leave(monitor, PipelineStage::FilteringImages);
        }

        self.enter(monitor, PipelineStage::RenderingImages);
        let renderer = ImageRenderer::new(self.driver.clone(), &self.config, self.sleeper.clone());
        let rendered = self.cancellable(renderer.render_batch(&scenes, &folder)).await;
        self.leave(monitor, PipelineStage::RenderingImages);
        let images = rendered?;

        self.enter(monitor, PipelineStage::Finalizing);
        if let Err(e) = assembler.update_markdown_with_images(&markdown, &images).await {
            warn!(error = %e, "Failed to insert images into markdown");
        }
        let performance = performance_dir(&folder);
        let analysis = if optimize {
            let analysis = self
                .cancellable(optimizer.analyze_story_quality(story.text(), &prompt))
                .await?;
            if let Err(e) =
                save_optimization_results(&analysis, &prompt, story.text(), &performance).await
            {
                warn!(error = %e, "Failed to save optimization results");
            }
            Some(analysis)
        } else {
            None
        };
        self.leave(monitor, PipelineStage::Finalizing);

        monitor.stop_monitoring().await;
        let performance_dir = match monitor.save_performance_data(&performance).await {
            Ok(_) => Some(performance),
            Err(e) => {
                warn!(error = %e, "Failed to save performance data");
                None
            }
        };

        Ok(StoryOutcome {
            folder,
            markdown,
            title,
            images,
            requested_images: *self.config.images_per_story(),
            analysis,
            performance_dir,
        })
    }

    async fn save_document(
        &self,
        assembler: &DocumentAssembler,
        story: &Story,
        title: &str,
        folder_slot: &mut Option<PathBuf>,
    ) -> StorytellerResult<(PathBuf, PathBuf)> {
        let folder = assembler.create_story_folder(title).await?;
        *folder_slot = Some(folder.clone());
        let markdown = assembler.save_story_markdown(story.text(), &folder).await?;
        info!(markdown = %markdown.display(), "Story saved");
        Ok((folder, markdown))
    }

    /// Race `future` against the cancellation token.
    async fn cancellable<T>(&self, future: impl Future<Output = T>) -> Result<T, RemoteError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Pipeline cancelled");
                Err(RemoteError::new(RemoteErrorKind::Cancelled))
            }
            value = future => Ok(value),
        }
    }

    fn enter(&self, monitor: &mut PerformanceMonitor, stage: PipelineStage) {
        info!(stage = %stage, "Entering stage");
        monitor.start_operation(stage.operation_name());
        self.report(stage);
    }

    fn leave(&self, monitor: &mut PerformanceMonitor, stage: PipelineStage) {
        monitor.end_operation(stage.operation_name());
    }

    fn report(&self, stage: PipelineStage) {
        if let Some(progress) = &self.progress {
            progress(stage);
        }
    }
}

/// Root of the performance records for a story folder.
pub fn performance_dir(folder: &Path) -> PathBuf {
    folder.join("performance")
}
