//! Records produced by content safety checks.

use derive_getters::Getters;
use serde::{Deserialize, Deserializer, Serialize};

/// Pattern groups scanned by the safety filter, in scan order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    /// Violence and gore
    #[display("violence")]
    Violence,
    /// Sexual or adult content
    #[display("sexual")]
    Sexual,
    /// Drugs, alcohol and smoking
    #[display("substances")]
    Substances,
    /// Weapons
    #[display("weapons")]
    Weapons,
    /// Profanity
    #[display("profanity")]
    Profanity,
}

/// One word matched by a safety pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct PatternIssue {
    /// Pattern group that matched
    category: ContentCategory,
    /// Matched word in its original casing
    word: String,
    /// Up to 20 characters either side of the match
    context: String,
    /// Byte offset of the match
    offset: usize,
}

impl PatternIssue {
    /// Create a new issue record.
    pub fn new(
        category: ContentCategory,
        word: impl Into<String>,
        context: impl Into<String>,
        offset: usize,
    ) -> Self {
        Self {
            category,
            word: word.into(),
            context: context.into(),
            offset,
        }
    }
}

/// Verdict returned by the remote classifier.
///
/// # Examples
///
/// ```
/// use storyteller_core::RemoteVerdict;
///
/// let verdict: RemoteVerdict = serde_json::from_str(
///     r#"{"is_appropriate": false, "issues": ["scary monster", {"kind": "tone"}], "explanation": "too dark"}"#,
/// ).unwrap();
/// assert!(!verdict.is_appropriate());
/// assert_eq!(verdict.issues().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RemoteVerdict {
    /// Whether the classifier judged the text suitable
    #[getter(skip)]
    is_appropriate: bool,
    /// Specific issues named by the classifier
    #[serde(default, deserialize_with = "lenient_strings")]
    issues: Vec<String>,
    /// Short explanation of the decision
    #[serde(default)]
    explanation: String,
}

impl RemoteVerdict {
    /// An approving verdict.
    pub fn appropriate(explanation: impl Into<String>) -> Self {
        Self {
            is_appropriate: true,
            issues: Vec::new(),
            explanation: explanation.into(),
        }
    }

    /// The verdict used when the classifier cannot be consulted or understood.
    pub fn fail_closed(reason: impl std::fmt::Display) -> Self {
        Self {
            is_appropriate: false,
            issues: vec!["Error performing AI content check".to_string()],
            explanation: format!("Error: {}", reason),
        }
    }

    /// Whether the classifier judged the text suitable.
    pub fn is_appropriate(&self) -> bool {
        self.is_appropriate
    }
}

/// Accept an issue list whose entries are not all strings.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

/// Outcome of a two-layer content check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ContentCheckResult {
    /// Pattern matches, ordered by group then position
    pattern_issues: Vec<PatternIssue>,
    /// Remote classifier verdict
    remote: RemoteVerdict,
}

impl ContentCheckResult {
    /// Combine pattern matches with a remote verdict.
    pub fn new(pattern_issues: Vec<PatternIssue>, remote: RemoteVerdict) -> Self {
        Self {
            pattern_issues,
            remote,
        }
    }

    /// No pattern matched and the classifier approved.
    pub fn is_appropriate(&self) -> bool {
        self.pattern_issues.is_empty() && self.remote.is_appropriate()
    }
}
