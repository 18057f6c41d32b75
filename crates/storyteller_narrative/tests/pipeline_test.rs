//! End-to-end pipeline runs against a scripted driver.

use std::path::Path;
use std::sync::{Arc, Mutex};
use storyteller_core::{StoryConfig, TextRequest};
use storyteller_error::{RemoteErrorKind, StorytellerErrorKind};
use storyteller_interface::{MockDriver, MockResponse};
use storyteller_narrative::{PipelineStage, STORY_PROMPT_SUFFIX, StoryPipeline};
use storyteller_rate_limit::RecordingSleeper;
use storyteller_security::SAFETY_PREAMBLE;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const PROMPT: &str = "A small dragon who is afraid of fire but loves books";

const STORY: &str = "# The Dragon Who Loved Books

Once upon a time, a small dragon named Ember lived in a cozy cave.

Ember loved reading books more than anything else.

One day, Ember found a library in the village.

The librarian, Rosa, was surprised at first.

Soon Rosa and Ember became the best of friends.

They read stories together every evening.";

const SCENES: &str = r#"["Ember reading in a cozy cave", "Ember flying to the village", "Rosa meeting Ember at the library door", "Ember and Rosa reading together"]"#;

const APPROVE: &str = r#"{"is_appropriate": true, "issues": [], "explanation": "Gentle story"}"#;

const ANALYSIS: &str = r#"{"overall_rating": 8, "strengths": ["warm friendship"], "weaknesses": [], "age_range": "4-8", "improved_prompt": "A shy dragon finds friends in a library"}"#;

const OPTIMIZED: &str = r#"{"optimized_prompts": ["Ember curled up with a book", "Ember soaring over rooftops", "Rosa waving at Ember", "Ember and Rosa under a lamp"]}"#;

fn route(req: &TextRequest) -> MockResponse {
    let system = req.system();
    let reply = if system.contains("content moderator") {
        APPROVE
    } else if system.contains("creative children's story writer") {
        STORY
    } else if system.contains("identifying key visual scenes") {
        SCENES
    } else if system.contains("children's literature analyst") {
        ANALYSIS
    } else if system.contains("AI image generation") {
        OPTIMIZED
    } else {
        "unexpected request"
    };
    MockResponse::Success(reply.to_string())
}

fn config(output: &Path) -> StoryConfig {
    StoryConfig::builder()
        .output_dir(output.to_path_buf())
        .sampling_interval_ms(50u64)
        .build()
        .unwrap()
}

fn pipeline(config: StoryConfig, driver: &MockDriver) -> StoryPipeline {
    StoryPipeline::new(config, Arc::new(driver.clone()))
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::default()))
}

fn recorder() -> (Arc<Mutex<Vec<PipelineStage>>>, storyteller_narrative::ProgressCallback) {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();
    let callback: storyteller_narrative::ProgressCallback =
        Arc::new(move |stage: PipelineStage| sink.lock().unwrap().push(stage));
    (stages, callback)
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_full_run_writes_illustrated_story() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(route);
    let (stages, callback) = recorder();

    let outcome = pipeline(config(output.path()), &driver)
        .with_progress(callback)
        .run(PROMPT)
        .await
        .unwrap();

    assert_eq!(outcome.title(), "The Dragon Who Loved Books");
    assert_eq!(*outcome.requested_images(), 4);
    let sequences: Vec<_> = outcome.images().iter().map(|i| i.sequence()).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert!(outcome.analysis().is_none());

    let folder_name = outcome.folder().file_name().unwrap().to_string_lossy().to_string();
    assert!(folder_name.starts_with("The_Dragon_Who_Loved_Books_"));
    assert_eq!(
        outcome.markdown().file_name().unwrap(),
        "The_Dragon_Who_Loved_Books.md"
    );

    let markdown = std::fs::read_to_string(outcome.markdown()).unwrap();
    let parts: Vec<&str> = markdown.split("\n\n").collect();
    assert_eq!(parts.len(), 11);
    assert_eq!(parts[1], "![Image 1](image_01.png)");
    assert_eq!(parts[3], "![Image 2](image_02.png)");
    assert_eq!(parts[7], "![Image 4](image_04.png)");

    for request in driver.image_requests() {
        assert_eq!(request.prompt().matches(SAFETY_PREAMBLE).count(), 1);
    }

    let performance = outcome.performance_dir().clone().unwrap();
    assert!(performance.join("operation_history.json").exists());
    assert!(performance.join("resource_usage.json").exists());
    let stats: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(performance.join("operation_stats.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(stats["Story Generation"]["count"], 1);
    assert_eq!(stats["Image Generation"]["count"], 1);
    assert!(stats.get("Prompt Optimization").is_none());

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            PipelineStage::Validating,
            PipelineStage::Generating,
            PipelineStage::FilteringStory,
            PipelineStage::SavingDocument,
            PipelineStage::ExtractingScenes,
            PipelineStage::FilteringImages,
            PipelineStage::RenderingImages,
            PipelineStage::Finalizing,
            PipelineStage::Done,
        ]
    );
}

#[tokio::test]
async fn test_optimized_run_records_analysis() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(route);
    let config = StoryConfig::builder()
        .output_dir(output.path().to_path_buf())
        .optimize_prompts(true)
        .build()
        .unwrap();
    let (stages, callback) = recorder();

    let outcome = pipeline(config, &driver)
        .with_progress(callback)
        .run(PROMPT)
        .await
        .unwrap();

    let analysis = outcome.analysis().clone().unwrap();
    assert_eq!(analysis.overall_rating, 8.0);
    assert_eq!(analysis.age_range, "4-8");

    let story_request = driver
        .text_requests()
        .into_iter()
        .find(|req| req.system().contains("creative children's story writer"))
        .unwrap();
    assert!(story_request.user().contains(STORY_PROMPT_SUFFIX));

    let image_prompts: Vec<String> = driver
        .image_requests()
        .iter()
        .map(|req| req.prompt().clone())
        .collect();
    assert!(image_prompts[0].starts_with("Ember curled up with a book"));

    let performance = outcome.performance_dir().clone().unwrap();
    let saved = std::fs::read_dir(&performance)
        .unwrap()
        .filter_map(Result::ok)
        .any(|entry| entry.file_name().to_string_lossy().starts_with("optimization_"));
    assert!(saved);

    let stages = stages.lock().unwrap();
    assert!(stages.contains(&PipelineStage::OptimizingPrompt));
    assert!(stages.contains(&PipelineStage::OptimizingImages));
    assert_eq!(stages[1], PipelineStage::OptimizingPrompt);
}

#[tokio::test]
async fn test_unfiltered_run_skips_classifier() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(route);
    let config = StoryConfig::builder()
        .output_dir(output.path().to_path_buf())
        .content_filter(false)
        .build()
        .unwrap();

    let outcome = pipeline(config, &driver).run(PROMPT).await.unwrap();

    assert_eq!(outcome.images().len(), 4);
    assert!(
        driver
            .text_requests()
            .iter()
            .all(|req| !req.system().contains("content moderator"))
    );
}

#[tokio::test]
async fn test_scene_failure_falls_back_to_generic_prompts() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(|req| {
        if req.system().contains("identifying key visual scenes") {
            MockResponse::Error(RemoteErrorKind::Api {
                status_code: 500,
                message: "overloaded".to_string(),
            })
        } else {
            route(req)
        }
    });

    let outcome = pipeline(config(output.path()), &driver)
        .run(PROMPT)
        .await
        .unwrap();

    assert_eq!(outcome.images().len(), 4);
    assert!(
        driver.image_requests()[0]
            .prompt()
            .contains("The main scene from the children's story 'The Dragon Who Loved Books'")
    );
}

#[tokio::test]
async fn test_image_failure_leaves_gap() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new()
        .with_text_router(route)
        .with_image_router(|req| {
            if req.prompt().contains("Rosa meeting Ember") {
                MockResponse::Error(RemoteErrorKind::Api {
                    status_code: 400,
                    message: "rejected".to_string(),
                })
            } else {
                MockResponse::Success("https://images.example/page.png".to_string())
            }
        });

    let outcome = pipeline(config(output.path()), &driver)
        .run(PROMPT)
        .await
        .unwrap();

    let sequences: Vec<_> = outcome.images().iter().map(|i| i.sequence()).collect();
    assert_eq!(sequences, vec![1, 2, 4]);
    let markdown = std::fs::read_to_string(outcome.markdown()).unwrap();
    assert!(markdown.contains("](image_04.png)"));
    assert!(!markdown.contains("image_03.png"));
}

#[tokio::test]
async fn test_invalid_prompt_stops_before_remote_calls() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(route);
    let (stages, callback) = recorder();

    let err = pipeline(config(output.path()), &driver)
        .with_progress(callback)
        .run("A story about a murder in the woods")
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), StorytellerErrorKind::Validation(_)));
    assert_eq!(driver.text_calls(), 0);
    assert_eq!(entries(output.path()), 0);
    assert_eq!(
        *stages.lock().unwrap(),
        vec![PipelineStage::Validating, PipelineStage::Failed]
    );
}

#[tokio::test]
async fn test_generation_failure_is_terminal() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(|req| {
        if req.system().contains("creative children's story writer") {
            MockResponse::Error(RemoteErrorKind::Api {
                status_code: 401,
                message: "bad key".to_string(),
            })
        } else {
            route(req)
        }
    });

    let err = pipeline(config(output.path()), &driver)
        .run(PROMPT)
        .await
        .unwrap_err();

    match err.kind() {
        StorytellerErrorKind::Remote(remote) => {
            assert!(matches!(remote.kind, RemoteErrorKind::Api { status_code: 401, .. }))
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(driver.text_calls(), 1);
    assert_eq!(driver.image_calls(), 0);
    assert_eq!(entries(output.path()), 0);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_remote_calls() {
    let output = TempDir::new().unwrap();
    let driver = MockDriver::new().with_text_router(route);
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline(config(output.path()), &driver)
        .with_cancellation(token)
        .run(PROMPT)
        .await
        .unwrap_err();

    match err.kind() {
        StorytellerErrorKind::Remote(remote) => {
            assert_eq!(remote.kind, RemoteErrorKind::Cancelled)
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(driver.text_calls(), 0);
}
