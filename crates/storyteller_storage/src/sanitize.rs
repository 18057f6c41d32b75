//! Filesystem-safe names derived from story titles.

/// Longest sanitized title, in characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Name used when nothing usable is left of a title.
pub const FALLBACK_FOLDER_TITLE: &str = "story";

const FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Turn a story title into a filesystem-safe name.
///
/// Steps, in order: strip a leading `#` heading marker, drop characters that are
/// unsafe in file names, collapse runs of whitespace and hyphens into `_`, keep
/// the first [`MAX_TITLE_CHARS`] characters and trim `_` from both ends. An empty
/// result becomes [`FALLBACK_FOLDER_TITLE`].
///
/// The result is never empty, contains no path separators, and sanitizing it
/// again returns it unchanged.
///
/// # Examples
///
/// ```
/// use storyteller_storage::sanitize_title;
///
/// assert_eq!(sanitize_title("# The Dragon's Quest: Part 1"), "The_Dragon's_Quest_Part_1");
/// assert_eq!(sanitize_title("  -- "), "story");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let without_heading = strip_heading_marker(title);

    let mut collapsed = String::with_capacity(without_heading.len());
    let mut in_separator_run = false;
    for ch in without_heading
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
    {
        if ch.is_whitespace() || ch == '-' {
            if !in_separator_run {
                collapsed.push('_');
                in_separator_run = true;
            }
        } else {
            collapsed.push(ch);
            in_separator_run = false;
        }
    }

    let truncated: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    let trimmed = truncated.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_FOLDER_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Remove `#` followed by whitespace at the very start of the title.
fn strip_heading_marker(title: &str) -> &str {
    match title.strip_prefix('#') {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => title,
    }
}
