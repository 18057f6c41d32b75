//! Optional prompt optimization and story quality analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use storyteller_core::{Prompt, ScenePrompt, TextRequest, extract_json};
use storyteller_error::{JsonError, StorageError, StorageErrorKind, StorytellerResult};
use storyteller_interface::SharedDriver;
use tracing::{debug, error, info, instrument, warn};

/// Guidance appended to the story idea when optimization is on.
pub const STORY_PROMPT_SUFFIX: &str = " Make it engaging, educational, and appropriate for children ages 4-10 with clear scenes that would work well as illustrations.";

/// Characters of story text kept in a saved optimization record.
const EXCERPT_CHARS: usize = 500;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert children's literature analyst. Your task is to analyze a children's story and provide detailed feedback on its quality, appropriateness, and engagement level for children.

Analyze the following aspects:
1. Age-appropriateness (vocabulary, themes, complexity)
2. Narrative structure (beginning, middle, end)
3. Character development
4. Educational value
5. Engagement and entertainment value
6. Language quality and readability
7. Emotional impact and positive messaging

Also suggest specific improvements to the original prompt that would result in a better story.

Return your analysis as a JSON object with the following fields:
- overall_rating: A score from 1-10
- strengths: List of story strengths
- weaknesses: List of story weaknesses
- age_range: Appropriate age range for the story
- improved_prompt: A refined version of the original prompt";

const IMAGE_OPTIMIZATION_SYSTEM_PROMPT: &str = "You are an expert in creating prompts for AI image generation, specializing in children's book illustrations.
Your task is to analyze a set of image prompts for a children's story and optimize them for:

1. Visual clarity and specificity
2. Child-friendliness and appropriateness
3. Artistic style consistency
4. Emotional resonance with the story
5. Diversity of scenes and perspectives
6. Technical effectiveness for AI image generation

For each prompt, provide an optimized version that will result in better illustrations.

Return your analysis as a JSON array of optimized prompts.";

/// Story quality assessment returned by the analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryAnalysis {
    /// Score from 1 to 10; 0 when analysis failed
    #[serde(default, deserialize_with = "lenient_rating")]
    pub overall_rating: f64,
    /// Story strengths
    #[serde(default, deserialize_with = "lenient_strings")]
    pub strengths: Vec<String>,
    /// Story weaknesses
    #[serde(default, deserialize_with = "lenient_strings")]
    pub weaknesses: Vec<String>,
    /// Suitable reader ages
    #[serde(default, deserialize_with = "lenient_string")]
    pub age_range: String,
    /// Suggested rewrite of the story idea
    #[serde(default, deserialize_with = "lenient_string")]
    pub improved_prompt: String,
    /// Why analysis failed, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoryAnalysis {
    /// The record used when analysis cannot be performed.
    pub fn failed(original_prompt: &Prompt, reason: impl std::fmt::Display) -> Self {
        Self {
            overall_rating: 0.0,
            strengths: Vec::new(),
            weaknesses: vec!["Error analyzing story".to_string()],
            age_range: "unknown".to_string(),
            improved_prompt: original_prompt.text().to_string(),
            error: Some(reason.to_string()),
        }
    }
}

fn stringify(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Array(values) => values.into_iter().map(stringify).collect(),
        JsonValue::Null => Vec::new(),
        other => vec![stringify(other)],
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Null => String::new(),
        other => stringify(other),
    })
}

/// A number, or the leading number of text such as `8/10` or `7.5 out of 10`.
fn lenient_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n.as_f64().unwrap_or(0.0),
        JsonValue::String(text) => {
            let text = text.trim();
            let end = text
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(text.len());
            text[..end].parse().unwrap_or(0.0)
        }
        _ => 0.0,
    })
}

/// Saved optimization record.
#[derive(Debug, Clone, Serialize)]
struct OptimizationRecord<'a> {
    original_prompt: &'a str,
    story_excerpt: String,
    analysis: &'a StoryAnalysis,
    timestamp: DateTime<Utc>,
}

/// Improves prompts and grades finished stories.
pub struct PromptOptimizer {
    driver: SharedDriver,
    model: String,
}

impl std::fmt::Debug for PromptOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptOptimizer")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl PromptOptimizer {
    /// Create an optimizer calling `model` through `driver`.
    pub fn new(driver: SharedDriver, model: impl Into<String>) -> Self {
        Self {
            driver,
            model: model.into(),
        }
    }

    /// Append fixed guidance to a story idea.
    pub fn enhance_story_prompt(&self, prompt: &Prompt) -> Prompt {
        prompt.with_suffix(STORY_PROMPT_SUFFIX)
    }

    /// Ask the model for better image prompts.
    ///
    /// Any failure, or an empty answer, returns `prompts` unchanged. The result
    /// has the same length as the input: extra answers are dropped and missing
    /// ones are filled from the input. Answers without a style are styled.
    #[instrument(skip(self, story_text, prompts), fields(model = %self.model, prompts = prompts.len()))]
    pub async fn optimize_image_prompts(
        &self,
        story_text: &str,
        prompts: &[ScenePrompt],
    ) -> Vec<ScenePrompt> {
        let originals: Vec<&str> = prompts.iter().map(ScenePrompt::text).collect();
        let listing = serde_json::to_string_pretty(&originals).unwrap_or_default();
        let request = TextRequest::builder()
            .system(IMAGE_OPTIMIZATION_SYSTEM_PROMPT)
            .user(format!(
                "Story Text:\n{}\n\nOriginal Image Prompts:\n{}\n\nPlease optimize these image prompts for better quality and relevance to the story.",
                story_text, listing
            ))
            .model(self.model.clone())
            .json_mode(true)
            .build();
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Could not build image optimization request");
                return prompts.to_vec();
            }
        };

        let reply = match self.driver.generate_text(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Error optimizing image prompts");
                return prompts.to_vec();
            }
        };

        let optimized = match optimized_list(&reply) {
            Some(list) if !list.is_empty() => list,
            _ => {
                warn!("No optimized prompts in reply, keeping originals");
                return prompts.to_vec();
            }
        };

        info!(count = optimized.len(), "Optimized image prompts");
        let mut result: Vec<ScenePrompt> = optimized
            .into_iter()
            .take(prompts.len())
            .map(ScenePrompt::ensure_styled)
            .collect();
        let have = result.len();
        result.extend(prompts[have..].iter().cloned());
        result
    }

    /// Ask the model to grade a story, returning a default record on failure.
    #[instrument(skip(self, story_text, original_prompt), fields(model = %self.model))]
    pub async fn analyze_story_quality(
        &self,
        story_text: &str,
        original_prompt: &Prompt,
    ) -> StoryAnalysis {
        let request = TextRequest::builder()
            .system(ANALYSIS_SYSTEM_PROMPT)
            .user(format!(
                "Original Prompt: \"{}\"\n\nGenerated Story:\n{}\n\nPlease analyze this children's story and provide detailed feedback.",
                original_prompt.text(),
                story_text
            ))
            .model(self.model.clone())
            .json_mode(true)
            .build();
        let request = match request {
            Ok(request) => request,
            Err(e) => return StoryAnalysis::failed(original_prompt, e),
        };

        let reply = match self.driver.generate_text(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Error analyzing story quality");
                return StoryAnalysis::failed(original_prompt, e.kind);
            }
        };

        let parsed = extract_json(&reply)
            .map_err(|e| e.message)
            .and_then(|json| {
                serde_json::from_str::<StoryAnalysis>(&json).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(analysis) => {
                info!(
                    overall_rating = analysis.overall_rating,
                    "Story quality analysis completed"
                );
                analysis
            }
            Err(reason) => {
                error!(reason = %reason, "Unreadable story analysis");
                StoryAnalysis::failed(original_prompt, reason)
            }
        }
    }
}

/// Prompts from a bare array, `prompts`, `optimized_prompts`, or the first array field.
fn optimized_list(reply: &str) -> Option<Vec<String>> {
    let json = extract_json(reply).ok()?;
    let value: JsonValue = serde_json::from_str(&json).ok()?;
    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => {
            let array = ["prompts", "optimized_prompts"]
                .into_iter()
                .find_map(|key| map.get(key).and_then(JsonValue::as_array))
                .or_else(|| map.values().find_map(JsonValue::as_array))?;
            array.clone()
        }
        _ => return None,
    };
    Some(items.into_iter().map(stringify).collect())
}

/// First eight hex digits of the SHA-256 of the prompt text.
fn prompt_hash(prompt: &Prompt) -> String {
    let digest = Sha256::digest(prompt.text().as_bytes());
    format!("{:x}", digest).chars().take(8).collect()
}

/// First 500 characters, with `...` when the text was longer.
fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_CHARS {
        let head: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Write `optimization_{hash}.json` into `output_dir`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
#[instrument(skip(analysis, original_prompt, story_text, output_dir), fields(dir = %output_dir.display()))]
pub async fn save_optimization_results(
    analysis: &StoryAnalysis,
    original_prompt: &Prompt,
    story_text: &str,
    output_dir: &Path,
) -> StorytellerResult<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        StorageError::new(StorageErrorKind::DirectoryCreation(format!(
            "{}: {}",
            output_dir.display(),
            e
        )))
    })?;

    let path = output_dir.join(format!("optimization_{}.json", prompt_hash(original_prompt)));
    let record = OptimizationRecord {
        original_prompt: original_prompt.text(),
        story_excerpt: excerpt(story_text),
        analysis,
        timestamp: Utc::now(),
    };
    let json = serde_json::to_string_pretty(&record).map_err(|e| JsonError::new(e.to_string()))?;
    tokio::fs::write(&path, json).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;

    debug!(path = %path.display(), "Saved optimization results");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimized_list_shapes() {
        assert_eq!(optimized_list(r#"["a"]"#).unwrap(), vec!["a"]);
        assert_eq!(
            optimized_list(r#"{"optimized_prompts": ["b"], "other": ["c"]}"#).unwrap(),
            vec!["b"]
        );
        assert_eq!(
            optimized_list(r#"{"note": "x", "whatever": ["d", 3]}"#).unwrap(),
            vec!["d", "3"]
        );
        assert_eq!(optimized_list(r#"{"note": "x"}"#), None);
    }

    #[test]
    fn test_excerpt_counts_characters() {
        assert_eq!(excerpt("short"), "short");
        let long = "é".repeat(501);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), 503);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt(&"a".repeat(500)), "a".repeat(500));
    }

    #[test]
    fn test_prompt_hash_is_stable_prefix() {
        let prompt = Prompt::new_unchecked("A friendly dragon");
        let hash = prompt_hash(&prompt);
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, prompt_hash(&Prompt::new_unchecked("A friendly dragon")));
    }

    #[test]
    fn test_analysis_tolerates_loose_fields() {
        let analysis: StoryAnalysis = serde_json::from_str(
            r#"{"overall_rating": 8, "strengths": "Warm tone", "weaknesses": [], "age_range": 6}"#,
        )
        .unwrap();
        assert_eq!(analysis.overall_rating, 8.0);
        assert_eq!(analysis.strengths, vec!["Warm tone"]);
        assert_eq!(analysis.age_range, "6");
        assert_eq!(analysis.improved_prompt, "");
    }

    #[test]
    fn test_analysis_reads_rating_from_text() {
        let rating = |raw: &str| {
            serde_json::from_str::<StoryAnalysis>(&format!(r#"{{"overall_rating": {raw}}}"#))
                .unwrap()
                .overall_rating
        };
        assert_eq!(rating(r#""8/10""#), 8.0);
        assert_eq!(rating(r#"" 7.5 out of 10""#), 7.5);
        assert_eq!(rating(r#""great""#), 0.0);
        assert_eq!(rating("null"), 0.0);
        assert_eq!(rating("9"), 9.0);
    }
}
