//! Request and payload types for the remote text and image endpoints.

use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A single text-generation call.
///
/// # Examples
///
/// ```
/// use storyteller_core::TextRequest;
///
/// let request = TextRequest::builder()
///     .system("You are a storyteller.")
///     .user("Tell me about a dragon.")
///     .model("gpt-4o")
///     .max_tokens(2000u32)
///     .temperature(0.7f32)
///     .build()
///     .unwrap();
///
/// assert!(!request.json_mode());
/// assert_eq!(request.model(), "gpt-4o");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct TextRequest {
    /// System instructions
    system: String,
    /// User message
    user: String,
    /// Model identifier
    model: String,
    /// Maximum tokens to generate
    #[builder(default)]
    max_tokens: Option<u32>,
    /// Sampling temperature (0.0 to 1.0)
    #[builder(default)]
    temperature: Option<f32>,
    /// Ask the provider for a JSON object response
    #[builder(default)]
    #[getter(skip)]
    json_mode: bool,
}

impl TextRequest {
    /// Creates a new builder for `TextRequest`.
    pub fn builder() -> TextRequestBuilder {
        TextRequestBuilder::default()
    }

    /// Whether the provider should answer with a JSON object.
    pub fn json_mode(&self) -> bool {
        self.json_mode
    }
}

/// A single image-generation call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct ImageRequest {
    /// Model identifier
    model: String,
    /// Full image prompt, safety preamble included
    prompt: String,
    /// Image dimensions, e.g. `1024x1024`
    size: String,
    /// Quality tier, e.g. `standard`
    quality: String,
    /// Rendering style, e.g. `natural`
    style: String,
    /// Number of images to produce
    #[builder(default = "1")]
    #[getter(skip)]
    n: u32,
}

impl ImageRequest {
    /// Creates a new builder for `ImageRequest`.
    pub fn builder() -> ImageRequestBuilder {
        ImageRequestBuilder::default()
    }

    /// Number of images requested.
    pub fn n(&self) -> u32 {
        self.n
    }
}

/// What the image endpoint handed back.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ImagePayload {
    /// Image hosted remotely, still to be downloaded
    #[display("url:{}", _0)]
    Url(String),
    /// Image bytes already decoded from an inline base64 payload
    #[display("bytes:{}", _0.len())]
    Bytes(Vec<u8>),
}
