//! Remote model client for Storyteller.
//!
//! [`OpenAiClient`] implements [`storyteller_interface::StoryDriver`] against the
//! OpenAI chat completions and image generation endpoints.
//!
//! ```no_run
//! use storyteller_models::OpenAiClient;
//! use storyteller_interface::StoryDriver;
//! use storyteller_core::TextRequest;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::from_env("https://api.openai.com/v1", std::time::Duration::from_secs(60))?;
//! let request = TextRequest::builder()
//!     .system("You write short poems.")
//!     .user("A poem about snails")
//!     .model("gpt-4o")
//!     .build()?;
//! let text = client.generate_text(&request).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod openai;

pub use openai::{
    ChatChoice, ChatMessage, ChatRequest, ChatRequestBuilder, ChatResponse, ChoiceMessage, ImageData,
    ImagesRequest, ImagesRequestBuilder, ImagesResponse, OPENAI_API_KEY_VAR, OpenAiClient,
    ResponseFormat,
};
