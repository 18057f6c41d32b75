//! OpenAI API integration.

mod client;
mod dto;

pub use client::{OPENAI_API_KEY_VAR, OpenAiClient};
pub use dto::{
    ChatChoice, ChatMessage, ChatRequest, ChatRequestBuilder, ChatResponse, ChoiceMessage, ImageData,
    ImagesRequest, ImagesRequestBuilder, ImagesResponse, ResponseFormat,
};
