//! Illustration prompts and rendered illustrations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Style guidance appended to every scene prompt.
pub const SCENE_STYLE_SUFFIX: &str = " Style: colorful children's book illustration, child-friendly, whimsical, detailed, vibrant colors, digital art.";

/// Description of one illustration.
///
/// # Examples
///
/// ```
/// use storyteller_core::{ScenePrompt, SCENE_STYLE_SUFFIX};
///
/// let prompt = ScenePrompt::styled("A turtle crossing a sunny meadow.");
/// assert!(prompt.text().ends_with(SCENE_STYLE_SUFFIX));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
#[display("{}", _0)]
pub struct ScenePrompt(String);

impl ScenePrompt {
    /// Append the fixed style suffix to a raw scene description.
    pub fn styled(description: impl AsRef<str>) -> Self {
        Self(format!("{}{}", description.as_ref(), SCENE_STYLE_SUFFIX))
    }

    /// Keep a description as-is when it already names a style, otherwise style it.
    pub fn ensure_styled(description: impl Into<String>) -> Self {
        let description = description.into();
        if description.to_lowercase().contains("style:") {
            Self(description)
        } else {
            Self::styled(description)
        }
    }

    /// Wrap prompt text that needs no further styling.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The prompt text.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Consume the prompt, returning its text.
    pub fn into_text(self) -> String {
        self.0
    }
}

/// An illustration saved to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    path: PathBuf,
    sequence: usize,
    prompt: ScenePrompt,
}

impl GeneratedImage {
    /// Record a saved illustration.
    pub fn new(path: impl Into<PathBuf>, sequence: usize, prompt: ScenePrompt) -> Self {
        Self {
            path: path.into(),
            sequence,
            prompt,
        }
    }

    /// Where the image was written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based sequence number.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Prompt the image was rendered from.
    pub fn prompt(&self) -> &ScenePrompt {
        &self.prompt
    }

    /// Standard file name for an illustration sequence number.
    ///
    /// ```
    /// use storyteller_core::GeneratedImage;
    ///
    /// assert_eq!(GeneratedImage::file_name_for(3), "image_03.png");
    /// ```
    pub fn file_name_for(sequence: usize) -> String {
        format!("image_{:02}.png", sequence)
    }
}
