//! Child-safety filtering for generated stories and image prompts.

use regex::{NoExpand, Regex, RegexBuilder};
use std::fmt::Write as _;
use storyteller_core::{
    ContentCategory, ContentCheckResult, PatternIssue, RemoteVerdict, TextRequest, extract_json,
};
use storyteller_error::{SafetyError, SafetyErrorKind};
use storyteller_interface::SharedDriver;
use tracing::{debug, error, info, instrument, warn};

/// Word groups scanned by the pattern layer, in scan order.
pub const CATEGORY_PATTERNS: &[(ContentCategory, &[&str])] = &[
    (
        ContentCategory::Violence,
        &[
            "kill", "murder", "dead", "death", "die", "dying", "blood", "bloody", "gore",
            "violent", "violence",
        ],
    ),
    (
        ContentCategory::Sexual,
        &[
            "sex", "sexual", "sexy", "nude", "naked", "explicit", "porn", "adult", "nsfw",
        ],
    ),
    (
        ContentCategory::Substances,
        &[
            "drug", "drugs", "alcohol", "drunk", "cigarette", "smoking", "weed", "cocaine",
            "heroin",
        ],
    ),
    (
        ContentCategory::Weapons,
        &[
            "gun", "guns", "weapon", "weapons", "knife", "knives", "shoot", "shooting",
        ],
    ),
    (
        ContentCategory::Profanity,
        &[
            "swear", "damn", "hell", "ass", "crap", "shit", "fuck", "bitch", "bastard",
        ],
    ),
];

/// Deterministic substitutions applied before any remote rewrite, in order.
pub const REPLACEMENTS: &[(&str, &str)] = &[
    ("kill", "stop"),
    ("die", "go away"),
    ("dead", "gone"),
    ("blood", "water"),
    ("gun", "tool"),
    ("weapon", "item"),
    ("knife", "utensil"),
    ("shoot", "point"),
    ("hell", "heck"),
    ("damn", "darn"),
    ("ass", "donkey"),
    ("crap", "stuff"),
];

/// Instructions spliced into every image prompt.
pub const SAFETY_PREAMBLE: &str = "Create a child-friendly, G-rated illustration suitable for young children. Use bright, cheerful colors and a non-threatening style. Ensure all content is age-appropriate for children ages 4-10. ";

/// Style appended when an image prompt names no style of its own.
pub const DEFAULT_IMAGE_STYLE: &str = " Style: children's book illustration, colorful, whimsical.";

/// Characters of context kept on each side of a pattern match.
const CONTEXT_CHARS: usize = 20;

const STYLE_MARKER: &str = "style:";

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a content moderator for children's stories. Your task is to analyze a story and determine if it contains any content that would be inappropriate for children ages 4-10.

Check for:
1. Violence or scary content
2. Adult themes or sexual content
3. Inappropriate language
4. Harmful stereotypes or prejudice
5. Dangerous behaviors children might imitate

Return a JSON object with the following fields:
- is_appropriate: boolean (true if appropriate, false if not)
- issues: array of specific issues found (empty if none)
- explanation: brief explanation of your decision";

const REWRITE_SYSTEM_PROMPT: &str = "You are an expert children's content editor. Your task is to rewrite sections of a children's story to make them age-appropriate while maintaining the story's meaning and flow.

Rewrite the story to:
1. Remove or replace any inappropriate content
2. Use child-friendly language
3. Maintain the original story's message and theme
4. Keep the same characters and basic plot
5. Ensure the story remains engaging and educational

Return ONLY the rewritten story, with no explanations or notes.";

/// Splice the safety preamble into an image prompt.
///
/// The preamble goes before the first case-insensitive `style:` marker, which is
/// rewritten as `Style:`. Without a marker the preamble is prepended and
/// [`DEFAULT_IMAGE_STYLE`] appended. Prompts that already carry the preamble are
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use storyteller_security::{apply_safety_preamble, SAFETY_PREAMBLE};
///
/// let prompt = apply_safety_preamble("A cat in a hat. style: crayon");
/// assert_eq!(prompt, format!("A cat in a hat. {}Style: crayon", SAFETY_PREAMBLE));
/// assert_eq!(apply_safety_preamble(&prompt), prompt);
/// ```
pub fn apply_safety_preamble(prompt: &str) -> String {
    if prompt.contains(SAFETY_PREAMBLE) {
        return prompt.to_string();
    }
    // ASCII lowercasing keeps byte offsets aligned with the original
    match prompt.to_ascii_lowercase().find(STYLE_MARKER) {
        Some(index) => format!(
            "{}{}Style:{}",
            &prompt[..index],
            SAFETY_PREAMBLE,
            &prompt[index + STYLE_MARKER.len()..]
        ),
        None => format!("{}{}{}", SAFETY_PREAMBLE, prompt, DEFAULT_IMAGE_STYLE),
    }
}

/// Slice up to [`CONTEXT_CHARS`] characters either side of a match.
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let before = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let after = text[end..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[before..after]
}

fn compile(pattern: String) -> Result<Regex, SafetyError> {
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| {
            SafetyError::new(SafetyErrorKind::InvalidPattern {
                pattern,
                reason: e.to_string(),
            })
        })
}

/// Two-layer content safety filter.
///
/// Layer one matches fixed word groups; layer two asks a remote classifier.
/// Text is appropriate only when no pattern matches and the classifier agrees.
/// Any classifier failure counts as inappropriate.
pub struct ContentSafetyFilter {
    driver: SharedDriver,
    model: String,
    category_regex: Vec<(ContentCategory, Regex)>,
    replacement_regex: Vec<(Regex, &'static str)>,
}

impl std::fmt::Debug for ContentSafetyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSafetyFilter")
            .field("provider", &self.driver.provider_name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ContentSafetyFilter {
    /// Create a filter that consults `model` through `driver`.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in pattern fails to compile.
    pub fn new(driver: SharedDriver, model: impl Into<String>) -> Result<Self, SafetyError> {
        let category_regex = CATEGORY_PATTERNS
            .iter()
            .map(|(category, words)| {
                let alternation = words
                    .iter()
                    .map(|w| regex::escape(w))
                    .collect::<Vec<_>>()
                    .join("|");
                compile(format!(r"\b({})\b", alternation)).map(|regex| (*category, regex))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let replacement_regex = REPLACEMENTS
            .iter()
            .map(|(word, replacement)| {
                compile(format!(r"\b{}\b", regex::escape(word))).map(|regex| (regex, *replacement))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            driver,
            model: model.into(),
            category_regex,
            replacement_regex,
        })
    }

    /// Pattern matches ordered by category group, then by position.
    pub fn pattern_issues(&self, text: &str) -> Vec<PatternIssue> {
        self.category_regex
            .iter()
            .flat_map(|(category, regex)| {
                regex.find_iter(text).map(move |m| {
                    PatternIssue::new(
                        *category,
                        m.as_str(),
                        context_window(text, m.start(), m.end()),
                        m.start(),
                    )
                })
            })
            .collect()
    }

    /// Apply the substitution table, case-insensitively on whole words.
    ///
    /// Replacements are inserted in lowercase regardless of the matched casing.
    pub fn apply_replacements(&self, text: &str) -> String {
        self.replacement_regex
            .iter()
            .fold(text.to_string(), |acc, (regex, replacement)| {
                regex.replace_all(&acc, NoExpand(replacement)).into_owned()
            })
    }

    /// Ask the remote classifier for a verdict, failing closed.
    #[instrument(skip(self, text), fields(model = %self.model, text_len = text.len()))]
    pub async fn remote_check(&self, text: &str) -> RemoteVerdict {
        let request = match TextRequest::builder()
            .system(CLASSIFIER_SYSTEM_PROMPT)
            .user(format!(
                "Please analyze this children's story for age-appropriateness:\n\n{}",
                text
            ))
            .model(self.model.clone())
            .json_mode(true)
            .build()
        {
            Ok(request) => request,
            Err(e) => return RemoteVerdict::fail_closed(e),
        };

        let response = match self.driver.generate_text(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Error in AI content check");
                return RemoteVerdict::fail_closed(SafetyErrorKind::ClassifierFailed(
                    e.kind.to_string(),
                ));
            }
        };

        let parsed = extract_json(&response)
            .map_err(|e| e.message)
            .and_then(|json| serde_json::from_str::<RemoteVerdict>(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(verdict) => {
                debug!(appropriate = verdict.is_appropriate(), "Classifier verdict received");
                verdict
            }
            Err(reason) => {
                error!(reason = %reason, "Unreadable classifier verdict");
                RemoteVerdict::fail_closed(SafetyErrorKind::InvalidVerdict(reason))
            }
        }
    }

    /// Run both layers over `text`.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn check(&self, text: &str) -> ContentCheckResult {
        let issues = self.pattern_issues(text);
        let remote = self.remote_check(text).await;
        let result = ContentCheckResult::new(issues, remote);

        info!(
            passed = result.is_appropriate(),
            "Content check completed: {}",
            if result.is_appropriate() { "PASS" } else { "FAIL" }
        );
        if !result.is_appropriate() {
            warn!(
                pattern_matches = result.pattern_issues().len(),
                "Found inappropriate pattern matches"
            );
        }
        result
    }

    /// Make story text age-appropriate.
    ///
    /// Substitutions run first. Only if the text still fails the check is a single
    /// remote rewrite requested; if that rewrite fails or comes back empty, the
    /// substituted text is returned.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn filter_story(&self, text: &str) -> String {
        let substituted = self.apply_replacements(text);
        let result = self.check(&substituted).await;
        if result.is_appropriate() {
            return substituted;
        }

        match self.rewrite(&substituted, &result).await {
            Ok(rewritten) => {
                info!("Successfully filtered story content using AI");
                rewritten
            }
            Err(e) => {
                error!(error = %e, "Error in AI content filtering, keeping substituted text");
                substituted
            }
        }
    }

    /// Substitute words and splice in the safety preamble.
    pub fn filter_image_prompt(&self, prompt: &str) -> String {
        apply_safety_preamble(&self.apply_replacements(prompt))
    }

    async fn rewrite(&self, text: &str, result: &ContentCheckResult) -> Result<String, SafetyError> {
        let mut issues = String::new();
        for issue in result.pattern_issues() {
            let _ = writeln!(issues, "- '{}' in context: \"{}\"", issue.word(), issue.context());
        }
        for issue in result.remote().issues() {
            let _ = writeln!(issues, "- {}", issue);
        }

        let request = TextRequest::builder()
            .system(REWRITE_SYSTEM_PROMPT)
            .user(format!(
                "Please rewrite this children's story to make it age-appropriate for children ages 4-10.\n\nThe following issues need to be addressed:\n{}\nOriginal story:\n{}",
                issues, text
            ))
            .model(self.model.clone())
            .build()
            .map_err(|e| SafetyError::new(SafetyErrorKind::RewriteFailed(e.to_string())))?;

        let rewritten = self
            .driver
            .generate_text(&request)
            .await
            .map_err(|e| SafetyError::new(SafetyErrorKind::RewriteFailed(e.kind.to_string())))?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Err(SafetyError::new(SafetyErrorKind::RewriteFailed(
                "empty rewrite".to_string(),
            )));
        }
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_window_clamps_to_text() {
        let text = "a kill b";
        assert_eq!(context_window(text, 2, 6), "a kill b");

        let long = format!("{}kill{}", "x".repeat(30), "y".repeat(30));
        let window = context_window(&long, 30, 34);
        assert_eq!(window, format!("{}kill{}", "x".repeat(20), "y".repeat(20)));
    }

    #[test]
    fn test_context_window_respects_char_boundaries() {
        let text = format!("{}kill{}", "é".repeat(25), "ü".repeat(25));
        let start = text.find("kill").unwrap();
        let window = context_window(&text, start, start + 4);
        assert_eq!(window.chars().count(), 44);
    }

    #[test]
    fn test_preamble_without_style_marker() {
        let prompt = apply_safety_preamble("A bear picnic");
        assert_eq!(
            prompt,
            format!("{}A bear picnic{}", SAFETY_PREAMBLE, DEFAULT_IMAGE_STYLE)
        );
    }

    #[test]
    fn test_preamble_uses_first_marker_only() {
        let prompt = apply_safety_preamble("Owls. STYLE: ink. Style: paint");
        assert_eq!(
            prompt,
            format!("Owls. {}Style: ink. Style: paint", SAFETY_PREAMBLE)
        );
    }
}
