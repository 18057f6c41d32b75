//! Tests for story folders, markdown files and listing.

use storyteller_core::{GeneratedImage, ScenePrompt};
use storyteller_storage::{DocumentAssembler, list_stories};
use tempfile::TempDir;

const STORY: &str = "# The Brave Little Turtle\n\nTimmy lived by a pond.\n\nOne day he set off.\n\nHe met a frog.\n\nThey became friends.\n\nThe end.";

fn image(folder: &std::path::Path, sequence: usize) -> GeneratedImage {
    GeneratedImage::new(
        folder.join(GeneratedImage::file_name_for(sequence)),
        sequence,
        ScenePrompt::styled("A turtle by a pond."),
    )
}

#[tokio::test]
async fn test_folder_name_has_title_and_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let assembler = DocumentAssembler::new(temp_dir.path().join("output"));

    let folder = assembler
        .create_story_folder("# The Brave Little Turtle")
        .await
        .unwrap();

    assert!(folder.is_dir());
    assert_eq!(folder.parent().unwrap(), temp_dir.path().join("output"));
    let name = folder.file_name().unwrap().to_str().unwrap();
    let (title, timestamp) = name.split_at(name.len() - 15);
    assert_eq!(title, "The_Brave_Little_Turtle_");
    assert_eq!(timestamp.len(), 15);
    assert_eq!(&timestamp[8..9], "_");
    assert!(timestamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_markdown_named_after_title() {
    let temp_dir = TempDir::new().unwrap();
    let assembler = DocumentAssembler::new(temp_dir.path());
    let folder = assembler.create_story_folder("Turtle").await.unwrap();

    let path = assembler.save_story_markdown(STORY, &folder).await.unwrap();
    assert_eq!(path, folder.join("The_Brave_Little_Turtle.md"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), STORY);
}

#[tokio::test]
async fn test_images_inserted_into_saved_markdown() {
    let temp_dir = TempDir::new().unwrap();
    let assembler = DocumentAssembler::new(temp_dir.path());
    let folder = assembler.create_story_folder("Turtle").await.unwrap();
    let path = assembler.save_story_markdown(STORY, &folder).await.unwrap();

    let images = vec![image(&folder, 1), image(&folder, 2)];
    assembler
        .update_markdown_with_images(&path, &images)
        .await
        .unwrap();

    // 6 paragraphs, 2 images: step 2, points 1 and 3
    let updated = std::fs::read_to_string(&path).unwrap();
    let parts: Vec<&str> = updated.split("\n\n").collect();
    assert_eq!(parts[1], "![Image 1](image_01.png)");
    assert_eq!(parts[4], "![Image 2](image_02.png)");
    assert_eq!(parts.len(), 8);
}

#[tokio::test]
async fn test_single_paragraph_file_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let assembler = DocumentAssembler::new(temp_dir.path());
    let folder = assembler.create_story_folder("Short").await.unwrap();
    let path = assembler
        .save_story_markdown("# Short story with no breaks", &folder)
        .await
        .unwrap();

    assembler
        .update_markdown_with_images(&path, &[image(&folder, 1)])
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "# Short story with no breaks"
    );
}

#[tokio::test]
async fn test_missing_markdown_is_storage_error() {
    let temp_dir = TempDir::new().unwrap();
    let assembler = DocumentAssembler::new(temp_dir.path());
    let result = assembler
        .update_markdown_with_images(&temp_dir.path().join("missing.md"), &[])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_folder_creation_failure_is_storage_error() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not_a_dir");
    std::fs::write(&blocker, "file").unwrap();

    let assembler = DocumentAssembler::new(&blocker);
    assert!(assembler.create_story_folder("Story").await.is_err());
}

#[tokio::test]
async fn test_list_stories_reports_title_and_images() {
    let temp_dir = TempDir::new().unwrap();
    let assembler = DocumentAssembler::new(temp_dir.path());
    let folder = assembler.create_story_folder("Turtle").await.unwrap();
    assembler.save_story_markdown(STORY, &folder).await.unwrap();
    std::fs::write(folder.join("image_01.png"), b"png").unwrap();
    std::fs::write(folder.join("image_02.JPG"), b"jpg").unwrap();
    std::fs::write(temp_dir.path().join("stray.txt"), b"not a story").unwrap();

    let stories = list_stories(temp_dir.path()).await.unwrap();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].folder, folder);
    assert_eq!(stories[0].title, "The Brave Little Turtle");
    assert_eq!(stories[0].image_count, 2);
    assert!(stories[0].markdown.is_some());
}

#[tokio::test]
async fn test_list_stories_missing_dir_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let stories = list_stories(&temp_dir.path().join("nothing")).await.unwrap();
    assert!(stories.is_empty());
}
