//! Story prompt validation.

use regex::Regex;
use std::io::{BufRead, Write};
use storyteller_core::Prompt;
use storyteller_error::{SafetyError, SafetyErrorKind, ValidationError, ValidationErrorKind};
use tracing::{debug, instrument, warn};

/// Minimum prompt length in characters.
pub const MIN_PROMPT_CHARS: usize = 10;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 200;

/// Words that reject a prompt outright, checked in this order.
pub const FORBIDDEN_WORDS: &[&str] = &[
    "violent", "kill", "murder", "blood", "gore", "death", "explicit", "sexual", "adult", "nsfw",
];

/// Validates story ideas against length and forbidden-word rules.
#[derive(Debug, Clone)]
pub struct PromptValidator {
    forbidden: Vec<(&'static str, Regex)>,
}

impl PromptValidator {
    /// Create a validator with the standard rules.
    ///
    /// # Errors
    ///
    /// Returns an error if a forbidden-word pattern fails to compile.
    pub fn new() -> Result<Self, SafetyError> {
        let forbidden = FORBIDDEN_WORDS
            .iter()
            .map(|word| {
                let pattern = format!(r"\b{}\b", regex::escape(word));
                Regex::new(&pattern)
                    .map(|regex| (*word, regex))
                    .map_err(|e| {
                        SafetyError::new(SafetyErrorKind::InvalidPattern {
                            pattern,
                            reason: e.to_string(),
                        })
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { forbidden })
    }

    /// Validate a story idea.
    ///
    /// Length is measured in characters on the trimmed input; the returned
    /// prompt holds the trimmed text.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] whose message can be shown to the user.
    ///
    /// # Examples
    ///
    /// ```
    /// use storyteller_security::PromptValidator;
    ///
    /// let validator = PromptValidator::new().unwrap();
    /// assert!(validator.validate("A friendly dragon who helps children learn about recycling").is_ok());
    ///
    /// let err = validator.validate("short").unwrap_err();
    /// assert_eq!(err.kind.to_string(), "Input is too short. Minimum 10 characters required.");
    /// ```
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn validate(&self, text: &str) -> Result<Prompt, ValidationError> {
        let trimmed = text.trim();
        let length = trimmed.chars().count();

        if length < MIN_PROMPT_CHARS {
            debug!(length, "Prompt too short");
            return Err(ValidationError::new(ValidationErrorKind::TooShort {
                min: MIN_PROMPT_CHARS,
            }));
        }
        if length > MAX_PROMPT_CHARS {
            debug!(length, "Prompt too long");
            return Err(ValidationError::new(ValidationErrorKind::TooLong {
                max: MAX_PROMPT_CHARS,
            }));
        }

        let lowered = trimmed.to_lowercase();
        if let Some((word, _)) = self
            .forbidden
            .iter()
            .find(|(_, regex)| regex.is_match(&lowered))
        {
            debug!(word, "Prompt contains forbidden word");
            return Err(ValidationError::new(ValidationErrorKind::ForbiddenWord(
                (*word).to_string(),
            )));
        }

        Ok(Prompt::new_unchecked(trimmed))
    }

    /// Ask for a story idea until a valid one is entered.
    ///
    /// End of input cancels.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrorKind::Cancelled`] on end of input or a read failure.
    pub fn prompt_interactive<R, W>(&self, mut input: R, mut output: W) -> Result<Prompt, ValidationError>
    where
        R: BufRead,
        W: Write,
    {
        // Output failures are not fatal; the prompt can still be read.
        let _ = writeln!(output, "\n=== AI Children's Story Generator ===");
        let _ = writeln!(output, "Please describe the story you'd like to create.");
        let _ = writeln!(
            output,
            "Your description should be between {} and {} characters.",
            MIN_PROMPT_CHARS, MAX_PROMPT_CHARS
        );
        let _ = writeln!(
            output,
            "Example: 'A friendly dragon who helps children learn about recycling'"
        );

        loop {
            let _ = write!(output, "\nYour story idea: ");
            let _ = output.flush();

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => {
                    debug!("End of input while prompting");
                    return Err(ValidationError::new(ValidationErrorKind::Cancelled));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to read story idea");
                    return Err(ValidationError::new(ValidationErrorKind::Cancelled));
                }
            }

            match self.validate(&line) {
                Ok(prompt) => return Ok(prompt),
                Err(e) => {
                    let _ = writeln!(output, "Input error: {}", e.kind);
                    let _ = writeln!(output, "Please try again.");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PromptValidator {
        PromptValidator::new().unwrap()
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let v = validator();
        assert!(v.validate(&"a".repeat(10)).is_ok());
        assert!(v.validate(&"a".repeat(200)).is_ok());
        assert_eq!(
            v.validate(&"a".repeat(9)).unwrap_err().kind,
            ValidationErrorKind::TooShort { min: 10 }
        );
        assert_eq!(
            v.validate(&"a".repeat(201)).unwrap_err().kind,
            ValidationErrorKind::TooLong { max: 200 }
        );
    }

    #[test]
    fn test_length_counts_characters_after_trim() {
        let v = validator();
        assert!(v.validate("   short   ").is_err());
        // 10 multibyte characters
        assert!(v.validate("éééééééééé").is_ok());
    }

    #[test]
    fn test_forbidden_word_is_case_insensitive_and_bounded() {
        let v = validator();
        let err = v.validate("A story where a knight must KILL a dragon").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::ForbiddenWord("kill".to_string()));
        assert_eq!(
            err.kind.to_string(),
            "Input contains inappropriate content ('kill'). Please provide a child-friendly story idea."
        );

        // "skills" and "adulthood" contain forbidden substrings but not whole words
        assert!(v.validate("A robot who learns new skills on the way to adulthood").is_ok());
    }

    #[test]
    fn test_interactive_retries_until_valid() {
        let v = validator();
        let input = b"tiny\nA bunny who plants a magical garden\n".as_slice();
        let mut output = Vec::new();

        let prompt = v.prompt_interactive(input, &mut output).unwrap();
        assert_eq!(prompt.text(), "A bunny who plants a magical garden");
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Input error: Input is too short."));
    }

    #[test]
    fn test_interactive_eof_cancels() {
        let v = validator();
        let err = v
            .prompt_interactive(b"".as_slice(), Vec::new())
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Cancelled);
    }
}
