use crate::openai::dto::ApiErrorBody;
use crate::{ChatMessage, ChatRequest, ChatResponse, ImagesRequest, ImagesResponse, ResponseFormat};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use storyteller_core::{ImagePayload, ImageRequest, TextRequest};
use storyteller_error::{RemoteError, RemoteErrorKind, RemoteResult};
use storyteller_interface::StoryDriver;
use tracing::{debug, error, instrument};

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RemoteError::new(RemoteErrorKind::MissingApiKey));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::new(RemoteErrorKind::ClientCreation(e.to_string())))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "Creating new OpenAI client");

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    /// Creates a client with the key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteErrorKind::MissingApiKey`] if the variable is unset or empty.
    pub fn from_env(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let api_key = std::env::var(OPENAI_API_KEY_VAR)
            .map_err(|_| RemoteError::new(RemoteErrorKind::MissingApiKey))?;
        Self::new(api_key, base_url, timeout)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends a chat completions request.
    #[instrument(skip(self, request), fields(model = %request.model()))]
    pub async fn chat(&self, request: &ChatRequest) -> RemoteResult<ChatResponse> {
        debug!("Sending chat completions request");
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(connection_error)?;
        let response = check_status(response).await?;

        response.json::<ChatResponse>().await.map_err(|e| {
            error!(error = ?e, "Failed to parse chat completions response");
            RemoteError::new(RemoteErrorKind::InvalidResponse(format!(
                "Failed to parse response: {}",
                e
            )))
        })
    }

    /// Sends an image generation request.
    #[instrument(skip(self, request), fields(model = %request.model()))]
    pub async fn images(&self, request: &ImagesRequest) -> RemoteResult<ImagesResponse> {
        debug!("Sending image generation request");
        let response = self
            .client
            .post(self.endpoint("images/generations"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(connection_error)?;
        let response = check_status(response).await?;

        response.json::<ImagesResponse>().await.map_err(|e| {
            error!(error = ?e, "Failed to parse image generation response");
            RemoteError::new(RemoteErrorKind::InvalidResponse(format!(
                "Failed to parse response: {}",
                e
            )))
        })
    }

    /// Converts a pipeline text request into a chat completions body.
    fn convert_text_request(req: &TextRequest) -> RemoteResult<ChatRequest> {
        let mut builder = ChatRequest::builder();
        builder
            .model(req.model().clone())
            .messages(vec![
                ChatMessage::system(req.system().clone()),
                ChatMessage::user(req.user().clone()),
            ])
            .max_tokens(*req.max_tokens())
            .temperature(*req.temperature());
        if req.json_mode() {
            builder.response_format(Some(ResponseFormat::json_object()));
        }
        builder
            .build()
            .map_err(|e| RemoteError::new(RemoteErrorKind::InvalidResponse(e.to_string())))
    }

    /// Converts a pipeline image request into an image generation body.
    fn convert_image_request(req: &ImageRequest) -> RemoteResult<ImagesRequest> {
        ImagesRequest::builder()
            .model(req.model().clone())
            .prompt(req.prompt().clone())
            .n(req.n())
            .size(req.size().clone())
            .quality(req.quality().clone())
            .style(req.style().clone())
            .build()
            .map_err(|e| RemoteError::new(RemoteErrorKind::InvalidResponse(e.to_string())))
    }

    /// Picks the first usable image out of a generation response.
    fn convert_image_response(response: &ImagesResponse) -> RemoteResult<ImagePayload> {
        let data = response.data().first().ok_or_else(|| {
            RemoteError::new(RemoteErrorKind::EmptyResponse(
                "Image response contained no data".to_string(),
            ))
        })?;

        if let Some(url) = data.url() {
            return Ok(ImagePayload::Url(url.clone()));
        }
        if let Some(b64) = data.b64_json() {
            let bytes = BASE64.decode(b64).map_err(|e| {
                RemoteError::new(RemoteErrorKind::InvalidResponse(format!(
                    "Invalid base64 image payload: {}",
                    e
                )))
            })?;
            return Ok(ImagePayload::Bytes(bytes));
        }

        Err(RemoteError::new(RemoteErrorKind::EmptyResponse(
            "Image response had neither url nor b64_json".to_string(),
        )))
    }
}

#[async_trait]
impl StoryDriver for OpenAiClient {
    #[instrument(skip(self, req), fields(provider = "openai", model = %req.model(), json_mode = req.json_mode()))]
    async fn generate_text(&self, req: &TextRequest) -> RemoteResult<String> {
        let request = Self::convert_text_request(req)?;
        let response = self.chat(&request).await?;
        let content = response.first_content().ok_or_else(|| {
            RemoteError::new(RemoteErrorKind::EmptyResponse(
                "Completion contained no message content".to_string(),
            ))
        })?;
        debug!(length = content.len(), "Received completion");
        Ok(content.to_string())
    }

    #[instrument(skip(self, req), fields(provider = "openai", model = %req.model(), prompt_len = req.prompt().len()))]
    async fn generate_image(&self, req: &ImageRequest) -> RemoteResult<ImagePayload> {
        let request = Self::convert_image_request(req)?;
        let response = self.images(&request).await?;
        Self::convert_image_response(&response)
    }

    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> RemoteResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(connection_error)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(connection_error)?;
        debug!(bytes = bytes.len(), "Downloaded image");
        Ok(bytes.to_vec())
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn connection_error(e: reqwest::Error) -> RemoteError {
    error!(error = ?e, "Request to OpenAI failed");
    RemoteError::new(RemoteErrorKind::Connection(e.to_string()))
}

/// Maps non-success statuses onto remote error kinds.
async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(status = %status, body = %body, "OpenAI API returned error");
    Err(RemoteError::new(classify_status(status, &body)))
}

/// Classifies an error status and body.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> RemoteErrorKind {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status == StatusCode::TOO_MANY_REQUESTS {
        RemoteErrorKind::RateLimited(message)
    } else {
        RemoteErrorKind::Api {
            status_code: status.as_u16(),
            message,
        }
    }
}
