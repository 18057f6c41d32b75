//! OpenAI client tests.
//!
//! Tests marked with the `api` feature make real calls and need `OPENAI_API_KEY`.

use std::time::Duration;
use storyteller_core::{ImagePayload, ImageRequest, TextRequest};
use storyteller_error::RemoteErrorKind;
use storyteller_interface::StoryDriver;
use storyteller_models::OpenAiClient;

const BASE_URL: &str = "https://api.openai.com/v1";

fn client() -> OpenAiClient {
    let _ = dotenvy::dotenv();
    OpenAiClient::from_env(BASE_URL, Duration::from_secs(120)).expect("OPENAI_API_KEY not set")
}

#[test]
fn test_blank_key_is_rejected() {
    let err = OpenAiClient::new("  ", BASE_URL, Duration::from_secs(5)).unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::MissingApiKey);
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let client = OpenAiClient::new("sk-test", "http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
    let request = TextRequest::builder()
        .system("Reply with one word.")
        .user("Hello")
        .model("gpt-4o")
        .build()
        .unwrap();

    let err = client.generate_text(&request).await.unwrap_err();
    assert!(err.kind.is_retryable());
}

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)] // Requires OPENAI_API_KEY
async fn test_chat_completion() {
    let request = TextRequest::builder()
        .system("Reply with exactly one word.")
        .user("Say 'ok'")
        .model("gpt-4o-mini")
        .max_tokens(10u32)
        .build()
        .unwrap();

    let text = client().generate_text(&request).await.expect("chat call failed");
    assert!(!text.trim().is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)] // Requires OPENAI_API_KEY
async fn test_json_mode_completion() {
    let request = TextRequest::builder()
        .system("Respond with a JSON object.")
        .user(r#"Return {"scenes": ["a cat"]}"#)
        .model("gpt-4o-mini")
        .json_mode(true)
        .build()
        .unwrap();

    let text = client().generate_text(&request).await.expect("chat call failed");
    let value: serde_json::Value = serde_json::from_str(&text).expect("reply was not JSON");
    assert!(value.is_object());
}

#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)] // Requires OPENAI_API_KEY
async fn test_image_generation_and_download() {
    let client = client();
    let request = ImageRequest::builder()
        .prompt("A friendly cartoon lighthouse at sunset, children's book style")
        .model("dall-e-3")
        .size("1024x1024")
        .quality("standard")
        .style("natural")
        .build()
        .unwrap();

    let bytes = match client.generate_image(&request).await.expect("image call failed") {
        ImagePayload::Url(url) => client.download(&url).await.expect("download failed"),
        ImagePayload::Bytes(bytes) => bytes,
    };
    assert!(!bytes.is_empty());
}
