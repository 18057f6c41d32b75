//! Illustration prompts derived from finished story text.
//!
//! One JSON-mode call asks the model for the scenes. Its reply is run through
//! [`ParseStrategy::ORDERED`] until one strategy yields enough prompts; when none
//! does, or the call itself fails, prompts are built from the story text alone.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use storyteller_core::{ScenePrompt, TextRequest, extract_json, extract_title};
use storyteller_interface::SharedDriver;
use tracing::{debug, info, instrument, warn};

/// Capitalized words never treated as character names.
const NAME_STOPLIST: &[&str] = &["The", "This", "That", "There", "They", "Then"];

/// One way of reading scene prompts out of a model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ParseStrategy {
    /// A JSON array, or an object holding one
    #[display("structured")]
    Structured,
    /// Every `"..."` substring
    #[display("quoted scan")]
    QuotedScan,
    /// Lines starting `1. ` or `1) `
    #[display("numbered list")]
    NumberedList,
}

impl ParseStrategy {
    /// Strategies in the order they are tried.
    pub const ORDERED: [ParseStrategy; 3] = [
        ParseStrategy::Structured,
        ParseStrategy::QuotedScan,
        ParseStrategy::NumberedList,
    ];

    /// Read raw scene descriptions out of `reply`.
    ///
    /// Structured parsing succeeds with at least one item; the scans need at
    /// least `count`. Returns `None` when the strategy does not apply.
    ///
    /// # Examples
    ///
    /// ```
    /// use storyteller_narrative::ParseStrategy;
    ///
    /// let reply = "1. A fox wakes up\n2) The fox finds a kite";
    /// let scenes = ParseStrategy::NumberedList.parse(reply, 2).unwrap();
    /// assert_eq!(scenes, vec!["A fox wakes up", "The fox finds a kite"]);
    /// ```
    pub fn parse(&self, reply: &str, count: usize) -> Option<Vec<String>> {
        let items = match self {
            ParseStrategy::Structured => parse_structured(reply)?,
            ParseStrategy::QuotedScan => quoted_substrings(reply),
            ParseStrategy::NumberedList => numbered_lines(reply),
        };
        let needed = match self {
            ParseStrategy::Structured => 1,
            _ => count,
        };
        (items.len() >= needed.max(1)).then_some(items)
    }
}

/// Derives a fixed number of illustration prompts from a story.
pub struct SceneExtractor {
    driver: SharedDriver,
    model: String,
    count: usize,
}

impl std::fmt::Debug for SceneExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneExtractor")
            .field("model", &self.model)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl SceneExtractor {
    /// Create an extractor producing `count` prompts per story.
    pub fn new(driver: SharedDriver, model: impl Into<String>, count: usize) -> Self {
        Self {
            driver,
            model: model.into(),
            count,
        }
    }

    /// Number of prompts produced per story.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Produce exactly `count` styled scene prompts. Never fails.
    #[instrument(skip(self, story_text), fields(model = %self.model, count = self.count, story_len = story_text.len()))]
    pub async fn extract(&self, story_text: &str) -> Vec<ScenePrompt> {
        let title = extract_title(story_text);

        let reply = match self.request(&title, story_text) {
            Some(request) => match self.driver.generate_text(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "Scene extraction call failed, using generic prompts");
                    return generic_scene_prompts(&title, story_text, self.count);
                }
            },
            None => return generic_scene_prompts(&title, story_text, self.count),
        };

        self.parse_reply(&reply, &title, story_text)
    }

    /// Run the parse strategies over a model reply, falling back to generic prompts.
    pub fn parse_reply(&self, reply: &str, title: &str, story_text: &str) -> Vec<ScenePrompt> {
        let reply = reply.trim();
        for strategy in ParseStrategy::ORDERED {
            if let Some(items) = strategy.parse(reply, self.count) {
                info!(%strategy, found = items.len(), "Parsed scene prompts");
                return self.normalize(items, title);
            }
            debug!(%strategy, "Parse strategy did not apply");
        }

        warn!("Could not parse scene prompts, using generic prompts");
        generic_scene_prompts(title, story_text, self.count)
    }

    fn request(&self, title: &str, story_text: &str) -> Option<TextRequest> {
        let system = format!(
            "You are an expert at identifying key visual scenes from children's stories.
Your task is to identify exactly {count} key scenes from the provided story that would make good illustrations for a children's book.

For each scene:
1. Choose visually interesting moments that advance the story
2. Focus on the main characters and important story elements
3. Distribute scenes evenly throughout the story (beginning, middle, end)
4. Create detailed, specific image prompts that a text-to-image AI can use
5. Make each prompt child-appropriate and visually appealing
6. Include specific details about characters, setting, actions, and mood
7. Format each prompt to be 1-3 sentences long

Return ONLY a JSON array of {count} image prompts, with no additional text.
Each prompt should be a string in the array.",
            count = self.count
        );
        let user = format!(
            "Story Title: {title}

Story Text:
{story_text}

Identify exactly {count} key scenes from this story that would make good illustrations.
Return them as a JSON array of strings, with each string being a detailed image prompt.",
            count = self.count
        );

        match TextRequest::builder()
            .system(system)
            .user(user)
            .model(self.model.clone())
            .json_mode(true)
            .build()
        {
            Ok(request) => Some(request),
            Err(e) => {
                warn!(error = %e, "Could not build scene extraction request");
                None
            }
        }
    }

    /// Style, truncate and pad parsed items to exactly `count`.
    fn normalize(&self, items: Vec<String>, title: &str) -> Vec<ScenePrompt> {
        let mut prompts: Vec<ScenePrompt> = items
            .into_iter()
            .take(self.count)
            .map(ScenePrompt::styled)
            .collect();
        if prompts.len() < self.count {
            debug!(have = prompts.len(), want = self.count, "Padding scene prompts");
            prompts.resize(self.count, ScenePrompt::styled(exciting_scene(title)));
        }
        prompts
    }
}

fn stringify(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

fn parse_structured(reply: &str) -> Option<Vec<String>> {
    let json = extract_json(reply).ok()?;
    let value: JsonValue = serde_json::from_str(&json).ok()?;
    let array = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => {
            let key = ["prompts", "scenes"]
                .into_iter()
                .find(|key| map.get(*key).is_some_and(JsonValue::is_array))
                .map(str::to_string)
                .or_else(|| {
                    map.iter()
                        .find(|(_, value)| value.is_array())
                        .map(|(key, _)| key.clone())
                });
            match key.and_then(|key| map.remove(&key)) {
                Some(JsonValue::Array(items)) => items,
                // No array field: the values themselves are the prompts
                _ if !map.is_empty() => map.into_iter().map(|(_, value)| value).collect(),
                _ => return None,
            }
        }
        _ => return None,
    };
    Some(array.into_iter().map(stringify).collect())
}

/// Non-empty `"..."` substrings, scanned left to right without overlap.
fn quoted_substrings(reply: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = reply;
    while let Some(open) = rest.find('"') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('"') else {
            break;
        };
        if close == 0 {
            // An empty pair: the second quote may open the next match
            rest = after_open;
            continue;
        }
        found.push(after_open[..close].to_string());
        rest = &after_open[close + 1..];
    }
    found
}

/// Text of lines shaped like `1. text` or `1) text`.
fn numbered_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .filter_map(|line| {
            let digits_end = line
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map(|(i, _)| i)?;
            if digits_end == 0 {
                return None;
            }
            let rest = line[digits_end..]
                .strip_prefix('.')
                .or_else(|| line[digits_end..].strip_prefix(')'))?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let text = rest.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}

/// Words shaped like `Name`: one ASCII capital followed by ASCII lowercase letters.
fn capitalized_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| {
            let mut chars = word.chars();
            chars.next().is_some_and(|c| c.is_ascii_uppercase())
                && word.len() > 1
                && chars.all(|c| c.is_ascii_lowercase())
        })
}

/// Up to two likely character names, most frequent first.
///
/// Candidates are capitalized words longer than three letters, outside the
/// stoplist, that appear more than once. Ties keep first-appearance order.
pub(crate) fn main_characters(story_text: &str) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, word) in capitalized_words(story_text)
        .filter(|word| word.len() > 3 && !NAME_STOPLIST.contains(word))
        .enumerate()
    {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count > 1)
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(2)
        .map(|(word, _, _)| word.to_string())
        .collect()
}

fn exciting_scene(title: &str) -> String {
    format!(
        "An exciting scene from the children's story '{}'. Vibrant colors, child-friendly illustration style, whimsical and engaging.",
        title
    )
}

/// Prompts built from the title and story text without a model call.
///
/// An opening scene, up to two character scenes, a happy ending, then
/// "exciting scene" prompts until `count` is reached. All prompts are styled.
pub fn generic_scene_prompts(title: &str, story_text: &str, count: usize) -> Vec<ScenePrompt> {
    let mut descriptions = vec![format!(
        "The main scene from the children's story '{}'. Colorful illustration, child-friendly style, whimsical setting.",
        title
    )];
    for character in main_characters(story_text) {
        descriptions.push(format!(
            "{} from the story '{}', engaging in an adventure. Colorful children's book illustration style, child-friendly, detailed.",
            character, title
        ));
    }
    descriptions.push(format!(
        "The happy ending scene from the children's story '{}'. Colorful, warm, and joyful illustration in a child-friendly style.",
        title
    ));
    while descriptions.len() < count {
        descriptions.push(exciting_scene(title));
    }

    descriptions
        .into_iter()
        .take(count)
        .map(ScenePrompt::styled)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_prefers_prompts_key() {
        let reply = r#"{"notes": ["x"], "prompts": ["a", "b"]}"#;
        assert_eq!(parse_structured(reply).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_structured_first_array_in_insertion_order() {
        let reply = r#"{"title": "t", "zebra": ["z"], "alpha": ["a"]}"#;
        assert_eq!(parse_structured(reply).unwrap(), vec!["z"]);
    }

    #[test]
    fn test_structured_takes_values_without_array_field() {
        let reply = r#"{"scene_1": "A fox wakes up in a meadow", "scene_2": "The fox finds a red kite", "scene_3": 3}"#;
        assert_eq!(
            parse_structured(reply).unwrap(),
            vec!["A fox wakes up in a meadow", "The fox finds a red kite", "3"]
        );
        assert_eq!(parse_structured("{}"), None);
    }

    #[test]
    fn test_structured_stringifies_objects() {
        let reply = r#"{"scenes": [{"scene": 1}, "plain"]}"#;
        assert_eq!(
            parse_structured(reply).unwrap(),
            vec![r#"{"scene":1}"#.to_string(), "plain".to_string()]
        );
    }

    #[test]
    fn test_structured_accepts_fenced_array() {
        let reply = "```json\n[\"one\"]\n```";
        assert_eq!(
            ParseStrategy::Structured.parse(reply, 4).unwrap(),
            vec!["one"]
        );
    }

    #[test]
    fn test_structured_rejects_empty_array() {
        assert_eq!(ParseStrategy::Structured.parse("[]", 4), None);
    }

    #[test]
    fn test_quoted_scan_skips_empty_pairs() {
        assert_eq!(
            quoted_substrings(r#"say "" then "hello" and "bye""#),
            vec![" then ", " and "]
        );
    }

    #[test]
    fn test_quoted_scan_needs_count() {
        assert_eq!(ParseStrategy::QuotedScan.parse(r#""a" "b""#, 3), None);
        assert!(ParseStrategy::QuotedScan.parse(r#""a" "b" "c""#, 3).is_some());
    }

    #[test]
    fn test_numbered_lines_shapes() {
        let reply = "Intro\n1. First\n2) Second\n3.Third\n10. Tenth\n- bullet";
        assert_eq!(numbered_lines(reply), vec!["First", "Second", "Tenth"]);
    }

    #[test]
    fn test_capitalized_words_require_whole_word() {
        let words: Vec<_> = capitalized_words("Lily's McDonald ran to Beep, Ab and ABC").collect();
        assert_eq!(words, vec!["Lily", "Beep", "Ab"]);
    }

    #[test]
    fn test_main_characters_ranked_by_frequency_then_first_seen() {
        let story = "Then Milo met Lily. Lily laughed. Milo smiled. Beep beeped. Beep hummed. Lily sang. Then Then Then.";
        assert_eq!(main_characters(story), vec!["Lily", "Milo"]);
    }

    #[test]
    fn test_generic_prompts_shape() {
        let story = "Ember flew. Ember landed. Lily waved. Lily cheered.";
        let prompts = generic_scene_prompts("The Dragon", story, 4);
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].text().starts_with("The main scene from the children's story 'The Dragon'."));
        assert!(prompts[1].text().starts_with("Ember from the story 'The Dragon'"));
        assert!(prompts[2].text().starts_with("Lily from the story 'The Dragon'"));
        assert!(prompts[3].text().starts_with("The happy ending scene"));
    }

    #[test]
    fn test_generic_prompts_pad_with_exciting_scenes() {
        let prompts = generic_scene_prompts("Quiet", "nobody here", 5);
        assert_eq!(prompts.len(), 5);
        assert!(prompts[1].text().starts_with("The happy ending scene"));
        assert!(prompts[4].text().starts_with("An exciting scene"));
    }
}
