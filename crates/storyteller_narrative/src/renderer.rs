//! Illustration rendering with retry and rate limiting.

use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use storyteller_core::{GeneratedImage, ImagePayload, ImageRequest, ScenePrompt, StoryConfig};
use storyteller_error::{
    RemoteError, RemoteErrorKind, RenderFailure, RenderFailureKind, RetryableError,
};
use storyteller_interface::SharedDriver;
use storyteller_rate_limit::{RateLimiter, RetryPolicy, Sleeper};
use storyteller_security::apply_safety_preamble;
use tracing::{debug, error, info, instrument};

/// Turns scene prompts into image files.
///
/// Every attempt (image call plus download) passes through the shared
/// [`RateLimiter`]. A failed illustration is reported as a [`RenderFailure`]
/// and never affects its siblings in a batch.
pub struct ImageRenderer {
    driver: SharedDriver,
    model: String,
    size: String,
    quality: String,
    style: String,
    policy: RetryPolicy,
    limiter: RateLimiter,
    concurrency: usize,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for ImageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRenderer")
            .field("model", &self.model)
            .field("size", &self.size)
            .field("policy", &self.policy)
            .field("limiter", &self.limiter)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl ImageRenderer {
    /// Create a renderer using the image settings from `config`.
    pub fn new(driver: SharedDriver, config: &StoryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        let concurrency = (*config.image_concurrency()).max(1);
        Self {
            driver,
            model: config.image_model().clone(),
            size: config.image_size().clone(),
            quality: config.image_quality().clone(),
            style: config.image_style().clone(),
            policy: RetryPolicy::new(*config.max_attempts(), config.initial_backoff()),
            limiter: RateLimiter::new(*config.image_requests_per_minute(), concurrency),
            concurrency,
            sleeper,
        }
    }

    /// Render one illustration into `dir` as `image_{sequence:02}.png`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderFailure`] when attempts run out, a permanent error
    /// occurs, or the file cannot be written.
    #[instrument(skip(self, prompt, dir), fields(model = %self.model))]
    pub async fn render(
        &self,
        prompt: &ScenePrompt,
        dir: &Path,
        sequence: usize,
    ) -> Result<GeneratedImage, RenderFailure> {
        let request = ImageRequest::builder()
            .model(self.model.clone())
            .prompt(apply_safety_preamble(prompt.text()))
            .size(self.size.clone())
            .quality(self.quality.clone())
            .style(self.style.clone())
            .build()
            .map_err(|e| RenderFailure::new(sequence, RenderFailureKind::Permanent(e.to_string())))?;

        let driver = &self.driver;
        let limiter = &self.limiter;
        let request = &request;
        let bytes = self
            .policy
            .run(self.sleeper.as_ref(), "image generation", || async move {
                let _guard = limiter.acquire().await;
                fetch_image(driver, request).await
            })
            .await
            .map_err(|e| self.failure(sequence, e))?;

        let path = dir.join(GeneratedImage::file_name_for(sequence));
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            RenderFailure::new(
                sequence,
                RenderFailureKind::Save(format!("{}: {}", path.display(), e)),
            )
        })?;

        info!(path = %path.display(), bytes = bytes.len(), "Image saved");
        Ok(GeneratedImage::new(path, sequence, prompt.clone()))
    }

    /// Render every prompt, numbering them from 1.
    ///
    /// Returns the successful images in sequence order. Failures are logged.
    #[instrument(skip(self, prompts, dir), fields(count = prompts.len(), concurrency = self.concurrency))]
    pub async fn render_batch(&self, prompts: &[ScenePrompt], dir: &Path) -> Vec<GeneratedImage> {
        let results: Vec<_> = stream::iter(prompts.iter().enumerate())
            .map(|(index, prompt)| self.render(prompt, dir, index + 1))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut images = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(image) => images.push(image),
                Err(failure) => error!(
                    sequence = failure.sequence,
                    reason = %failure.kind,
                    "Failed to generate image"
                ),
            }
        }
        images.sort_by_key(GeneratedImage::sequence);

        info!(
            generated = images.len(),
            requested = prompts.len(),
            "Generated {} of {} images",
            images.len(),
            prompts.len()
        );
        images
    }

    fn failure(&self, sequence: usize, error: RemoteError) -> RenderFailure {
        let kind = if error.is_retryable() {
            RenderFailureKind::Exhausted {
                attempts: self.policy.max_attempts(),
                last_error: error.kind.to_string(),
            }
        } else {
            RenderFailureKind::Permanent(error.kind.to_string())
        };
        RenderFailure::new(sequence, kind)
    }
}

/// One attempt: ask for the image, then resolve it to bytes.
async fn fetch_image(driver: &SharedDriver, request: &ImageRequest) -> Result<Vec<u8>, RemoteError> {
    let bytes = match driver.generate_image(request).await? {
        ImagePayload::Url(url) => {
            debug!(url = %url, "Downloading image");
            driver.download(&url).await?
        }
        ImagePayload::Bytes(bytes) => bytes,
    };
    if bytes.is_empty() {
        return Err(RemoteError::new(RemoteErrorKind::EmptyResponse(
            "Image payload was empty".to_string(),
        )));
    }
    Ok(bytes)
}
