//! Run configuration.
//!
//! Configuration is loaded once at startup from, in order of increasing precedence:
//! - Bundled defaults (include_str! from storyteller.toml)
//! - `~/.config/storyteller/storyteller.toml`
//! - `./storyteller.toml`
//! - `STORYTELLER_*` environment variables
//!
//! Command-line values arrive as [`ConfigOverrides`], applied above every other source.
//!
//! The resulting [`StoryConfig`] is immutable and passed by reference into each component.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use storyteller_error::{ConfigError, StorytellerResult};
use tracing::{debug, instrument};

/// Immutable configuration for one story run.
///
/// # Examples
///
/// ```
/// use storyteller_core::StoryConfig;
///
/// let config = StoryConfig::builder()
///     .images_per_story(2usize)
///     .content_filter(false)
///     .build()
///     .unwrap();
///
/// assert_eq!(*config.images_per_story(), 2);
/// assert_eq!(config.story_model(), "gpt-4o");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct StoryConfig {
    /// Model used for story text, classification and scene extraction
    story_model: String,
    /// Token ceiling for the story call
    story_max_tokens: u32,
    /// Sampling temperature for the story call
    story_temperature: f32,
    /// Model used for illustrations
    image_model: String,
    /// Illustration dimensions
    image_size: String,
    /// Illustration quality tier
    image_quality: String,
    /// Illustration rendering style
    image_style: String,
    /// Root directory for story folders
    output_dir: PathBuf,
    /// Number of illustrations per story
    images_per_story: usize,
    /// Run the content safety filter over story text and image prompts
    content_filter: bool,
    /// Run the prompt optimization stages
    optimize_prompts: bool,
    /// Attempts per remote call before giving up
    max_attempts: u32,
    /// First retry delay in milliseconds
    initial_backoff_ms: u64,
    /// Illustrations rendered at the same time
    image_concurrency: usize,
    /// Optional ceiling on image requests per minute
    image_requests_per_minute: Option<u32>,
    /// Resource sampler period in milliseconds
    sampling_interval_ms: u64,
    /// Operation history capacity
    max_history: usize,
    /// Base URL of the OpenAI-compatible API
    api_base_url: String,
    /// Per-request HTTP timeout in seconds
    request_timeout_secs: u64,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            story_model: "gpt-4o".to_string(),
            story_max_tokens: 2000,
            story_temperature: 0.7,
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            image_quality: "standard".to_string(),
            image_style: "natural".to_string(),
            output_dir: PathBuf::from("output"),
            images_per_story: 4,
            content_filter: true,
            optimize_prompts: false,
            max_attempts: 3,
            initial_backoff_ms: 5000,
            image_concurrency: 1,
            image_requests_per_minute: None,
            sampling_interval_ms: 1000,
            max_history: 100,
            api_base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl StoryConfig {
    /// Creates a new builder for `StoryConfig`.
    pub fn builder() -> StoryConfigBuilder {
        StoryConfigBuilder::default()
    }

    /// Load configuration with the standard precedence chain and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source cannot be parsed or a value is out of range.
    pub fn load() -> StorytellerResult<Self> {
        Self::load_with(&ConfigOverrides::default())
    }

    /// Load configuration with `overrides` taking precedence over every source.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source cannot be parsed or a value is out of range.
    #[instrument(skip(overrides))]
    pub fn load_with(overrides: &ConfigOverrides) -> StorytellerResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../storyteller.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/storyteller/storyteller.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("storyteller").required(false))
            .add_source(Environment::with_prefix("STORYTELLER").try_parsing(true));
        builder = overrides
            .apply(builder)
            .map_err(|e| ConfigError::new(format!("Invalid override: {}", e)))?;

        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;

        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.story_temperature) {
            return Err(ConfigError::new(format!(
                "story_temperature must be between 0.0 and 1.0 (got {})",
                self.story_temperature
            )));
        }
        if self.images_per_story == 0 {
            return Err(ConfigError::new("images_per_story must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::new("max_attempts must be at least 1"));
        }
        if self.image_concurrency == 0 {
            return Err(ConfigError::new("image_concurrency must be at least 1"));
        }
        if self.image_requests_per_minute == Some(0) {
            return Err(ConfigError::new(
                "image_requests_per_minute must be at least 1 when set",
            ));
        }
        if self.sampling_interval_ms == 0 {
            return Err(ConfigError::new("sampling_interval_ms must be at least 1"));
        }
        if self.max_history == 0 {
            return Err(ConfigError::new("max_history must be at least 1"));
        }
        if self.story_max_tokens == 0 {
            return Err(ConfigError::new("story_max_tokens must be at least 1"));
        }
        Ok(())
    }

    /// First retry delay.
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Resource sampler period.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Per-run values that take precedence over files and environment.
///
/// # Examples
///
/// ```
/// use storyteller_core::ConfigOverrides;
///
/// let overrides = ConfigOverrides {
///     images_per_story: Some(2),
///     content_filter: Some(false),
///     ..Default::default()
/// };
/// assert!(overrides.story_model.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Story text model
    pub story_model: Option<String>,
    /// Story sampling temperature
    pub story_temperature: Option<f32>,
    /// Illustration model
    pub image_model: Option<String>,
    /// Root directory for story folders
    pub output_dir: Option<PathBuf>,
    /// Illustrations per story
    pub images_per_story: Option<usize>,
    /// Run the optimization stages
    pub optimize_prompts: Option<bool>,
    /// Run the content safety filter
    pub content_filter: Option<bool>,
}

impl ConfigOverrides {
    fn apply(
        &self,
        mut builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        if let Some(model) = &self.story_model {
            builder = builder.set_override("story_model", model.as_str())?;
        }
        if let Some(temperature) = self.story_temperature {
            builder = builder.set_override("story_temperature", f64::from(temperature))?;
        }
        if let Some(model) = &self.image_model {
            builder = builder.set_override("image_model", model.as_str())?;
        }
        if let Some(dir) = &self.output_dir {
            builder = builder.set_override("output_dir", dir.to_string_lossy().into_owned())?;
        }
        if let Some(count) = self.images_per_story {
            builder = builder.set_override(
                "images_per_story",
                i64::try_from(count).unwrap_or(i64::MAX),
            )?;
        }
        if let Some(optimize) = self.optimize_prompts {
            builder = builder.set_override("optimize_prompts", optimize)?;
        }
        if let Some(filter) = self.content_filter {
            builder = builder.set_override("content_filter", filter)?;
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_backoff(), Duration::from_secs(5));
        assert_eq!(*config.max_attempts(), 3);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let hot = StoryConfig::builder()
            .story_temperature(1.5f32)
            .build()
            .unwrap();
        assert!(hot.validate().unwrap_err().message.contains("story_temperature"));

        let empty = StoryConfig::builder()
            .images_per_story(0usize)
            .build()
            .unwrap();
        assert!(empty.validate().unwrap_err().message.contains("images_per_story"));
    }

    #[test]
    fn test_overrides_win_over_bundled_defaults() {
        let overrides = ConfigOverrides {
            story_model: Some("gpt-4o-mini".to_string()),
            story_temperature: Some(0.3),
            output_dir: Some(PathBuf::from("stories")),
            images_per_story: Some(2),
            content_filter: Some(false),
            ..Default::default()
        };
        let builder = Config::builder().add_source(File::from_str(
            include_str!("../../../storyteller.toml"),
            FileFormat::Toml,
        ));
        let config: StoryConfig = overrides
            .apply(builder)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.story_model(), "gpt-4o-mini");
        assert_eq!(*config.story_temperature(), 0.3);
        assert_eq!(config.output_dir(), &PathBuf::from("stories"));
        assert_eq!(*config.images_per_story(), 2);
        assert!(!*config.content_filter());
        assert_eq!(config.image_model(), "dall-e-3");
    }

    #[test]
    fn test_bundled_defaults_match_struct_defaults() {
        let bundled: StoryConfig = Config::builder()
            .add_source(File::from_str(
                include_str!("../../../storyteller.toml"),
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(bundled, StoryConfig::default());
    }
}
