//! Story folders, markdown files and image insertion.

use crate::sanitize_title;
use std::path::{Path, PathBuf};
use storyteller_core::{GeneratedImage, extract_title};
use storyteller_error::{StorageError, StorageErrorKind};
use tracing::{debug, info, instrument, warn};

/// Owns the on-disk layout of generated stories.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    output_dir: PathBuf,
}

impl DocumentAssembler {
    /// Create an assembler rooted at `output_dir`.
    ///
    /// Nothing is created until the first story folder is requested.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Root directory holding all story folders.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create `{sanitized title}_{YYYYMMDD_HHMMSS}` under the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageErrorKind::DirectoryCreation`] if the folder cannot be created.
    #[instrument(skip(self), fields(output_dir = %self.output_dir.display()))]
    pub async fn create_story_folder(&self, title: &str) -> Result<PathBuf, StorageError> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let folder_name = format!("{}_{}", sanitize_title(title), timestamp);
        let folder = self.output_dir.join(folder_name);

        tokio::fs::create_dir_all(&folder).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                folder.display(),
                e
            )))
        })?;

        info!(path = %folder.display(), "Created story folder");
        Ok(folder)
    }

    /// Write story markdown into `folder`, named after the story's title.
    ///
    /// # Errors
    ///
    /// Returns [`StorageErrorKind::FileWrite`] if the file cannot be written.
    #[instrument(skip(self, text, folder), fields(text_len = text.len(), folder = %folder.display()))]
    pub async fn save_story_markdown(
        &self,
        text: &str,
        folder: &Path,
    ) -> Result<PathBuf, StorageError> {
        let file_name = format!("{}.md", sanitize_title(&extract_title(text)));
        let path = folder.join(file_name);
        write_file(&path, text).await?;

        info!(path = %path.display(), "Saved story markdown");
        Ok(path)
    }

    /// Splice image references into a saved markdown file.
    ///
    /// See [`insert_image_references`] for placement. When the file has fewer
    /// than two paragraphs or there are no images, the file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the file cannot be read or rewritten.
    #[instrument(skip(self, markdown, images), fields(path = %markdown.display(), images = images.len()))]
    pub async fn update_markdown_with_images(
        &self,
        markdown: &Path,
        images: &[GeneratedImage],
    ) -> Result<(), StorageError> {
        let content = tokio::fs::read_to_string(markdown).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                markdown.display(),
                e
            )))
        })?;

        let names: Vec<String> = images
            .iter()
            .map(|image| {
                image
                    .path()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| GeneratedImage::file_name_for(image.sequence()))
            })
            .collect();

        match insert_image_references(&content, &names) {
            Some(updated) => {
                write_file(markdown, &updated).await?;
                info!("Updated markdown with image references");
            }
            None => warn!("Not enough paragraphs or no images to insert"),
        }
        Ok(())
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<(), StorageError> {
    tokio::fs::write(path, contents).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })
}

/// Split markdown on runs of two or more newlines.
fn split_paragraphs(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut paragraphs = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' && bytes.get(i + 1) == Some(&b'\n') {
            paragraphs.push(&content[start..i]);
            while i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    paragraphs.push(&content[start..]);
    paragraphs
}

/// Insert `![Image i](name)` paragraphs at evenly spaced points.
///
/// With `p` paragraphs and `n` images, the step is `max(1, (p - 2) / n)` and the
/// insertion points are `1, 1 + step, ...` below `p - 1`, at most `n` of them.
/// The i-th reference (0-based) goes in at `point + i` to account for earlier
/// insertions. Returns `None` when there are fewer than two paragraphs or no
/// images; otherwise the paragraphs rejoined with blank lines.
///
/// # Examples
///
/// ```
/// use storyteller_storage::insert_image_references;
///
/// let story = "# Title\n\nOne.\n\nTwo.\n\nThree.";
/// let updated = insert_image_references(story, &["image_01.png".to_string()]).unwrap();
/// assert_eq!(updated, "# Title\n\n![Image 1](image_01.png)\n\nOne.\n\nTwo.\n\nThree.");
/// ```
pub fn insert_image_references(content: &str, names: &[String]) -> Option<String> {
    let mut paragraphs: Vec<String> = split_paragraphs(content)
        .into_iter()
        .map(str::to_string)
        .collect();
    let count = paragraphs.len();
    if count <= 1 || names.is_empty() {
        return None;
    }

    let step = ((count - 2) / names.len()).max(1);
    let points: Vec<usize> = (1..count - 1).step_by(step).take(names.len()).collect();
    debug!(paragraphs = count, step, points = ?points, "Computed image insertion points");

    for (i, point) in points.into_iter().enumerate() {
        paragraphs.insert(point + i, format!("![Image {}]({})", i + 1, names[i]));
    }
    Some(paragraphs.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(GeneratedImage::file_name_for).collect()
    }

    #[test]
    fn test_split_collapses_newline_runs() {
        assert_eq!(split_paragraphs("a\n\n\n\nb\nc\n\nd"), vec!["a", "b\nc", "d"]);
        assert_eq!(split_paragraphs("single"), vec!["single"]);
    }

    #[test]
    fn test_single_paragraph_is_untouched() {
        assert_eq!(insert_image_references("Just one paragraph.", &names(2)), None);
    }

    #[test]
    fn test_no_images_is_untouched() {
        assert_eq!(insert_image_references("a\n\nb\n\nc", &[]), None);
    }

    #[test]
    fn test_two_paragraphs_have_no_interior_points() {
        assert_eq!(
            insert_image_references("a\n\nb", &names(1)).as_deref(),
            Some("a\n\nb")
        );
    }

    #[test]
    fn test_ten_paragraphs_four_images() {
        let content = (0..10)
            .map(|i| format!("p{}", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let updated = insert_image_references(&content, &names(4)).unwrap();
        let parts: Vec<&str> = updated.split("\n\n").collect();

        // step = 8 / 4 = 2, points = 1, 3, 5, 7
        assert_eq!(parts.len(), 14);
        assert_eq!(parts[1], "![Image 1](image_01.png)");
        assert_eq!(parts[4], "![Image 2](image_02.png)");
        assert_eq!(parts[7], "![Image 3](image_03.png)");
        assert_eq!(parts[10], "![Image 4](image_04.png)");
        assert_eq!(parts[0], "p0");
        assert_eq!(parts[13], "p9");
    }

    #[test]
    fn test_fewer_points_than_images() {
        let updated = insert_image_references("a\n\nb\n\nc", &names(4)).unwrap();
        assert_eq!(updated, "a\n\n![Image 1](image_01.png)\n\nb\n\nc");
    }
}
