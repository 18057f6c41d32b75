//! Story text generation.

use std::sync::Arc;
use storyteller_core::{Prompt, Story, StoryConfig, TextRequest};
use storyteller_error::{RemoteError, RemoteErrorKind, RemoteResult};
use storyteller_interface::SharedDriver;
use storyteller_rate_limit::{RetryPolicy, Sleeper};
use tracing::{debug, info, instrument};

/// Title used when the first line of an untitled story is too long.
pub const FALLBACK_GENERATED_TITLE: &str = "My Children's Story";

/// First lines at least this many characters long are not used as titles.
const MAX_SYNTHESIZED_TITLE_CHARS: usize = 50;

const STORY_SYSTEM_PROMPT: &str = "You are a creative children's story writer. Create an engaging, age-appropriate story for children aged 4-10 years old based on the provided prompt. The story should:

1. Be 500-1000 words long
2. Have a clear beginning, middle, and end
3. Include 1-3 main characters with distinct personalities
4. Contain positive messages or lessons
5. Use simple language appropriate for children
6. Be engaging, imaginative, and fun
7. Avoid any scary, violent, or inappropriate content
8. Format the story in markdown with a title using # and paragraphs

Return ONLY the story text in markdown format, with no additional explanations or notes.";

/// Generates story text from a validated prompt.
pub struct StoryGenerator {
    driver: SharedDriver,
    model: String,
    max_tokens: u32,
    temperature: f32,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for StoryGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryGenerator")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl StoryGenerator {
    /// Create a generator using the story settings from `config`.
    pub fn new(driver: SharedDriver, config: &StoryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            driver,
            model: config.story_model().clone(),
            max_tokens: *config.story_max_tokens(),
            temperature: *config.story_temperature(),
            policy: RetryPolicy::new(*config.max_attempts(), config.initial_backoff()),
            sleeper,
        }
    }

    /// Generate a story, retrying transient failures.
    ///
    /// The returned story always starts with a `# ` title line.
    ///
    /// # Errors
    ///
    /// Returns the last [`RemoteError`] once retries are exhausted, the first
    /// permanent error, or [`RemoteErrorKind::EmptyResponse`] for a blank reply.
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &Prompt) -> RemoteResult<Story> {
        let request = TextRequest::builder()
            .system(STORY_SYSTEM_PROMPT)
            .user(format!(
                "Create a children's story based on this idea: \"{}\"

Make the story whimsical, educational, and engaging for young readers.
Include descriptive scenes that would work well as illustrations.",
                prompt.text()
            ))
            .model(self.model.clone())
            .max_tokens(Some(self.max_tokens))
            .temperature(Some(self.temperature))
            .build()
            .map_err(|e| RemoteError::new(RemoteErrorKind::InvalidResponse(e.to_string())))?;

        let driver = &self.driver;
        let request = &request;
        let text = self
            .policy
            .run(self.sleeper.as_ref(), "story generation", || async move {
                driver.generate_text(request).await
            })
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RemoteError::new(RemoteErrorKind::EmptyResponse(
                "Story reply was blank".to_string(),
            )));
        }

        let story = Story::new(ensure_title(text));
        info!(title = %story.title(), length = story.text().len(), "Generated story");
        Ok(story)
    }
}

/// Prepend a `# ` title line when the text does not start with one.
///
/// A first line shorter than 50 characters becomes the title; otherwise
/// [`FALLBACK_GENERATED_TITLE`] is used.
///
/// # Examples
///
/// ```
/// use storyteller_narrative::ensure_title;
///
/// assert_eq!(ensure_title("# Moon\n\nText"), "# Moon\n\nText");
/// assert_eq!(ensure_title("The Moon\nText"), "# The Moon\n\nThe Moon\nText");
/// ```
pub fn ensure_title(text: &str) -> String {
    if text.starts_with("# ") {
        return text.to_string();
    }
    let first_line = text.split('\n').next().unwrap_or_default().trim_end();
    let title = if first_line.chars().count() < MAX_SYNTHESIZED_TITLE_CHARS {
        first_line
    } else {
        FALLBACK_GENERATED_TITLE
    };
    debug!(title, "Synthesized story title");
    format!("# {}\n\n{}", title, text)
}
