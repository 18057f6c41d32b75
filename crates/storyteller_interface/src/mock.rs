//! Scripted driver for testing.
//!
//! `MockDriver` answers text, image and download calls from configured
//! behaviors, records every request, and counts calls per endpoint so tests can
//! verify retry and fallback paths without touching the network.

use crate::StoryDriver;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use storyteller_core::{ImagePayload, ImageRequest, TextRequest};
use storyteller_error::{RemoteError, RemoteErrorKind, RemoteResult};

/// A single mock response (success or error).
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Text body, or image URL for the image endpoint
    Success(String),
    /// Fail with this error
    Error(RemoteErrorKind),
}

/// Behavior configuration for one endpoint.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always return success with the given text
    Success(String),
    /// Always return the specified error
    Error(RemoteErrorKind),
    /// Fail N times with the error, then succeed with the text
    FailThenSucceed {
        /// Failures before the first success
        fail_count: usize,
        /// Error returned while failing
        error: RemoteErrorKind,
        /// Text returned afterwards
        success_text: String,
    },
    /// Return a sequence of responses; the last one repeats once exhausted
    Sequence(Vec<MockResponse>),
}

impl MockBehavior {
    fn respond(&self, call: usize) -> MockResponse {
        match self {
            MockBehavior::Success(text) => MockResponse::Success(text.clone()),
            MockBehavior::Error(kind) => MockResponse::Error(kind.clone()),
            MockBehavior::FailThenSucceed {
                fail_count,
                error,
                success_text,
            } => {
                if call < *fail_count {
                    MockResponse::Error(error.clone())
                } else {
                    MockResponse::Success(success_text.clone())
                }
            }
            MockBehavior::Sequence(responses) => responses
                .get(call)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or_else(|| MockResponse::Success(String::new())),
        }
    }
}

type TextRouter = Arc<dyn Fn(&TextRequest) -> MockResponse + Send + Sync>;
type ImageRouter = Arc<dyn Fn(&ImageRequest) -> MockResponse + Send + Sync>;

/// Mock driver for testing.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "mock")]
/// # {
/// use storyteller_interface::{MockBehavior, MockDriver};
///
/// let driver = MockDriver::new().with_text(MockBehavior::Success("# Title\n\nBody".into()));
/// assert_eq!(driver.text_calls(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct MockDriver {
    text: MockBehavior,
    text_router: Option<TextRouter>,
    images: MockBehavior,
    image_router: Option<ImageRouter>,
    download: Result<Vec<u8>, RemoteErrorKind>,
    text_requests: Arc<Mutex<Vec<TextRequest>>>,
    image_requests: Arc<Mutex<Vec<ImageRequest>>>,
    download_count: Arc<Mutex<usize>>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("text", &self.text)
            .field("images", &self.images)
            .field("text_calls", &self.text_calls())
            .field("image_calls", &self.image_calls())
            .finish()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockDriver {
    /// A driver that returns empty text, a fixed image URL, and a few PNG bytes.
    pub fn new() -> Self {
        Self {
            text: MockBehavior::Success(String::new()),
            text_router: None,
            images: MockBehavior::Success("https://images.example/image.png".to_string()),
            image_router: None,
            download: Ok(b"\x89PNG\r\n\x1a\nmock".to_vec()),
            text_requests: Arc::new(Mutex::new(Vec::new())),
            image_requests: Arc::new(Mutex::new(Vec::new())),
            download_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Set the text endpoint behavior.
    pub fn with_text(mut self, behavior: MockBehavior) -> Self {
        self.text = behavior;
        self
    }

    /// Route text calls through a closure, overriding the text behavior.
    pub fn with_text_router<F>(mut self, router: F) -> Self
    where
        F: Fn(&TextRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.text_router = Some(Arc::new(router));
        self
    }

    /// Set the image endpoint behavior; successes are returned as URLs.
    pub fn with_images(mut self, behavior: MockBehavior) -> Self {
        self.images = behavior;
        self
    }

    /// Route image calls through a closure, overriding the image behavior.
    pub fn with_image_router<F>(mut self, router: F) -> Self
    where
        F: Fn(&ImageRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.image_router = Some(Arc::new(router));
        self
    }

    /// Make every download fail.
    pub fn with_download_error(mut self, kind: RemoteErrorKind) -> Self {
        self.download = Err(kind);
        self
    }

    /// Number of text calls made.
    pub fn text_calls(&self) -> usize {
        lock(&self.text_requests).len()
    }

    /// Number of image calls made.
    pub fn image_calls(&self) -> usize {
        lock(&self.image_requests).len()
    }

    /// Number of downloads made.
    pub fn download_calls(&self) -> usize {
        *lock(&self.download_count)
    }

    /// Every text request received, in order.
    pub fn text_requests(&self) -> Vec<TextRequest> {
        lock(&self.text_requests).clone()
    }

    /// Every image request received, in order.
    pub fn image_requests(&self) -> Vec<ImageRequest> {
        lock(&self.image_requests).clone()
    }
}

#[async_trait]
impl StoryDriver for MockDriver {
    async fn generate_text(&self, req: &TextRequest) -> RemoteResult<String> {
        let call = {
            let mut requests = lock(&self.text_requests);
            requests.push(req.clone());
            requests.len() - 1
        };
        let response = match &self.text_router {
            Some(router) => router(req),
            None => self.text.respond(call),
        };
        match response {
            MockResponse::Success(text) => Ok(text),
            MockResponse::Error(kind) => Err(RemoteError::new(kind)),
        }
    }

    async fn generate_image(&self, req: &ImageRequest) -> RemoteResult<ImagePayload> {
        let call = {
            let mut requests = lock(&self.image_requests);
            requests.push(req.clone());
            requests.len() - 1
        };
        let response = match &self.image_router {
            Some(router) => router(req),
            None => self.images.respond(call),
        };
        match response {
            MockResponse::Success(url) => Ok(ImagePayload::Url(url)),
            MockResponse::Error(kind) => Err(RemoteError::new(kind)),
        }
    }

    async fn download(&self, _url: &str) -> RemoteResult<Vec<u8>> {
        *lock(&self.download_count) += 1;
        self.download.clone().map_err(RemoteError::new)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
