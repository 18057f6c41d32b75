//! Utilities for extracting structured data from model responses.
//!
//! Model responses often contain JSON wrapped in markdown code blocks or mixed
//! with explanatory text, even in JSON mode.

use storyteller_error::JsonError;

/// Extract JSON from a response that may contain markdown or extra text.
///
/// This function tries multiple extraction strategies:
/// 1. Markdown code blocks: ```json ... ```
/// 2. Balanced braces or brackets, whichever opens first
///
/// # Errors
///
/// Returns an error if no JSON-looking span is found in the response.
///
/// # Examples
///
/// ```
/// use storyteller_core::extract_json;
///
/// let response = "Here are the scenes:\n```json\n{\"prompts\": [\"a\", \"b\"]}\n```";
/// let json = extract_json(response).unwrap();
/// assert!(json.starts_with('{'));
/// ```
pub fn extract_json(response: &str) -> Result<String, JsonError> {
    if let Some(json) = extract_from_code_block(response) {
        return Ok(json);
    }

    let bracket_pos = response.find('[');
    let brace_pos = response.find('{');

    let (first, second) = match (bracket_pos, brace_pos) {
        (Some(b), Some(c)) if b < c => (('[', ']'), ('{', '}')),
        (Some(_), None) => (('[', ']'), ('[', ']')),
        _ => (('{', '}'), ('[', ']')),
    };
    if let Some(json) = extract_balanced(response, first.0, first.1) {
        return Ok(json);
    }
    if let Some(json) = extract_balanced(response, second.0, second.1) {
        return Ok(json);
    }

    Err(JsonError::new(format!(
        "No JSON found in response (length: {})",
        response.len()
    )))
}

/// Extract content from a markdown code block, with or without a `json` tag.
fn extract_from_code_block(response: &str) -> Option<String> {
    let pattern = "```json";
    if let Some(start) = response.find(pattern) {
        let content_start = start + pattern.len();
        let content = match response[content_start..].find("```") {
            Some(end) => &response[content_start..content_start + end],
            // No closing fence found - likely truncated response
            None => &response[content_start..],
        };
        return Some(content.trim().to_string());
    }

    let start = response.find("```")?;
    let content_start = start + 3;
    // Skip to next newline in case there's a language specifier
    let skip_to = response[content_start..]
        .find('\n')
        .map(|n| content_start + n + 1)
        .unwrap_or(content_start);
    let content = match response[skip_to..].find("```") {
        Some(end) => &response[skip_to..skip_to + end],
        None => &response[skip_to..],
    };
    Some(content.trim().to_string())
}

/// Extract content between balanced delimiters, skipping delimiters inside strings.
fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(response[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}
