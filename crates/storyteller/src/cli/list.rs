//! Story listing command handler.

use std::path::Path;
use storyteller_error::StorytellerResult;
use storyteller_storage::{StorySummary, list_stories};

/// Print the stories found under `output_dir`.
pub async fn list_command(output_dir: &Path) -> StorytellerResult<()> {
    let stories = list_stories(output_dir).await?;
    println!("{}", render_listing(&stories));
    Ok(())
}

/// Table of stories, one per line.
pub fn render_listing(stories: &[StorySummary]) -> String {
    if stories.is_empty() {
        return "No stories found".to_string();
    }

    let mut out = format!("{:<20} {:>6}  {}\n", "Created", "Images", "Title");
    out.push_str(&format!("{:-<80}\n", ""));
    for story in stories {
        out.push_str(&format!(
            "{:<20} {:>6}  {}\n",
            story.created.format("%Y-%m-%d %H:%M:%S"),
            story.image_count,
            story.title
        ));
        let location = story.markdown.as_deref().unwrap_or(&story.folder);
        out.push_str(&format!("{:<27}  {}\n", "", location.display()));
    }
    out.push_str(&format!("Total: {} stories", stories.len()));
    out
}
