//! Discovery of previously generated stories.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use storyteller_core::extract_title;
use storyteller_error::{StorageError, StorageErrorKind};
use tracing::{debug, instrument};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One story folder found under the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySummary {
    /// Story folder
    pub folder: PathBuf,
    /// First markdown file in the folder, if any
    pub markdown: Option<PathBuf>,
    /// Title read from the markdown, or the folder name
    pub title: String,
    /// Number of image files in the folder
    pub image_count: usize,
    /// Folder creation (or last modification) time
    pub created: DateTime<Local>,
}

fn read_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::new(StorageErrorKind::FileRead(format!(
        "{}: {}",
        path.display(),
        e
    )))
}

/// List story folders under `output_dir`, newest first.
///
/// A missing output directory yields an empty list.
///
/// # Errors
///
/// Returns [`StorageErrorKind::FileRead`] if a directory cannot be read.
#[instrument(skip(output_dir), fields(output_dir = %output_dir.display()))]
pub async fn list_stories(output_dir: &Path) -> Result<Vec<StorySummary>, StorageError> {
    if !tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
        debug!("Output directory does not exist");
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(output_dir)
        .await
        .map_err(|e| read_error(output_dir, e))?;
    let mut stories = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| read_error(output_dir, e))?
    {
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| read_error(&entry.path(), e))?;
        if !metadata.is_dir() {
            continue;
        }
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        stories.push(summarize(entry.path(), created).await?);
    }

    stories.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.folder.cmp(&a.folder)));
    debug!(count = stories.len(), "Listed stories");
    Ok(stories)
}

async fn summarize(folder: PathBuf, created: DateTime<Local>) -> Result<StorySummary, StorageError> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(&folder)
        .await
        .map_err(|e| read_error(&folder, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| read_error(&folder, e))?
    {
        files.push(entry.path());
    }
    files.sort();

    let has_extension = |path: &Path, wanted: &[&str]| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
    };

    let markdown = files.iter().find(|p| has_extension(p, &["md"])).cloned();
    let image_count = files
        .iter()
        .filter(|p| has_extension(p, IMAGE_EXTENSIONS))
        .count();

    let title = match &markdown {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => extract_title(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not read story markdown");
                folder_name(&folder)
            }
        },
        None => folder_name(&folder),
    };

    Ok(StorySummary {
        folder,
        markdown,
        title,
        image_count,
        created,
    })
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
