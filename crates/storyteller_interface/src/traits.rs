//! Trait definition for the generative API backend.

use async_trait::async_trait;
use std::sync::Arc;
use storyteller_core::{ImagePayload, ImageRequest, TextRequest};
use storyteller_error::RemoteResult;

/// Capabilities the pipeline needs from a generative API.
///
/// Implementations report failures as [`storyteller_error::RemoteError`] so
/// retry loops can tell transient errors from permanent ones.
#[async_trait]
pub trait StoryDriver: Send + Sync {
    /// Generate text for a system + user message pair.
    async fn generate_text(&self, req: &TextRequest) -> RemoteResult<String>;

    /// Generate one image.
    async fn generate_image(&self, req: &ImageRequest) -> RemoteResult<ImagePayload>;

    /// Fetch the bytes behind an image URL.
    async fn download(&self, url: &str) -> RemoteResult<Vec<u8>>;

    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &'static str;
}

/// Driver shared across all pipeline components.
pub type SharedDriver = Arc<dyn StoryDriver>;
