//! Story prompts and generated story text.

use serde::{Deserialize, Serialize};

/// Title used when a story has neither a heading nor a non-empty first line.
pub const DEFAULT_STORY_TITLE: &str = "Children's Story";

/// A user story idea that passed validation.
///
/// Only a validator hands these out, so holding one means the text is within
/// length bounds and free of forbidden words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{}", text)]
pub struct Prompt {
    text: String,
}

impl Prompt {
    /// Wrap text that has already been validated.
    pub fn new_unchecked(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The prompt text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Character count of the prompt.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the prompt is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// A copy of this prompt with extra guidance appended.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            text: format!("{}{}", self.text, suffix),
        }
    }
}

/// Markdown text of a generated story.
///
/// # Examples
///
/// ```
/// use storyteller_core::Story;
///
/// let story = Story::new("# The Brave Turtle\n\nOnce upon a time...");
/// assert_eq!(story.title(), "The Brave Turtle");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    text: String,
}

impl Story {
    /// Wrap story text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The markdown text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The story title, see [`extract_title`].
    pub fn title(&self) -> String {
        extract_title(&self.text)
    }

    /// Replace the text, keeping ownership with the current run.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Consume the story, returning its text.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Extract a title from markdown text.
///
/// The first `# ` heading wins. Otherwise the first line is used when non-empty,
/// falling back to [`DEFAULT_STORY_TITLE`].
///
/// # Examples
///
/// ```
/// use storyteller_core::extract_title;
///
/// assert_eq!(extract_title("Intro\n#  Moon Party \ntext"), "Moon Party");
/// assert_eq!(extract_title("A plain first line\nmore"), "A plain first line");
/// assert_eq!(extract_title("\n\nbody"), "Children's Story");
/// ```
pub fn extract_title(markdown: &str) -> String {
    let heading = markdown.lines().find_map(|line| {
        let rest = line.strip_prefix('#')?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let title = rest.trim();
        (!title.is_empty()).then(|| title.to_string())
    });
    if let Some(title) = heading {
        return title;
    }

    let first_line = markdown.split('\n').next().unwrap_or_default().trim();
    if first_line.is_empty() {
        DEFAULT_STORY_TITLE.to_string()
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subheadings_are_not_titles() {
        assert_eq!(extract_title("## Part One\nstory"), "## Part One");
        assert_eq!(extract_title("#hashtag\n# Real Title"), "Real Title");
    }

    #[test]
    fn test_prompt_suffix() {
        let prompt = Prompt::new_unchecked("A kind bear");
        assert_eq!(prompt.with_suffix(" today").text(), "A kind bear today");
        assert_eq!(prompt.len(), 11);
    }
}
