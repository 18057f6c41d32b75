//! Child-safety checks for Storyteller.
//!
//! - [`PromptValidator`] screens raw story ideas before any remote call.
//! - [`ContentSafetyFilter`] checks and rewrites generated stories and image prompts
//!   using fixed word patterns plus a remote classifier that fails closed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod content;
mod validation;

pub use content::{
    CATEGORY_PATTERNS, ContentSafetyFilter, DEFAULT_IMAGE_STYLE, REPLACEMENTS, SAFETY_PREAMBLE,
    apply_safety_preamble,
};
pub use validation::{FORBIDDEN_WORDS, MAX_PROMPT_CHARS, MIN_PROMPT_CHARS, PromptValidator};
