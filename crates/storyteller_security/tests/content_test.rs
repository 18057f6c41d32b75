//! Tests for the content safety filter against a scripted driver.

use std::sync::Arc;
use storyteller_core::ContentCategory;
use storyteller_error::RemoteErrorKind;
use storyteller_interface::{MockBehavior, MockDriver, MockResponse};
use storyteller_security::{ContentSafetyFilter, SAFETY_PREAMBLE};

const APPROVE: &str = r#"{"is_appropriate": true, "issues": [], "explanation": "Gentle story"}"#;
const REJECT: &str =
    r#"{"is_appropriate": false, "issues": ["a scary chase"], "explanation": "Too intense"}"#;

fn filter_with(driver: &MockDriver) -> ContentSafetyFilter {
    ContentSafetyFilter::new(Arc::new(driver.clone()), "gpt-4o").unwrap()
}

fn is_classifier_call(system: &str) -> bool {
    system.contains("content moderator")
}

#[tokio::test]
async fn test_kill_flagged_with_centered_context() {
    let driver = MockDriver::new().with_text(MockBehavior::Success(APPROVE.to_string()));
    let filter = filter_with(&driver);

    let text = "The brave little fox did not want to kill the old grumpy bear at all.";
    let result = filter.check(text).await;

    assert!(!result.is_appropriate());
    let issue = &result.pattern_issues()[0];
    assert_eq!(issue.word(), "kill");
    assert_eq!(issue.category(), &ContentCategory::Violence);
    assert_eq!(*issue.offset(), text.find("kill").unwrap());
    assert!(issue.context().contains("kill"));
    assert_eq!(issue.context().chars().count(), 44);
    assert_eq!(issue.context(), "fox did not want to kill the old grumpy bear");
}

#[tokio::test]
async fn test_issues_ordered_by_group_then_position() {
    let driver = MockDriver::new().with_text(MockBehavior::Success(APPROVE.to_string()));
    let filter = filter_with(&driver);

    let result = filter.check("Damn, the gun fell. Blood and a Knife.").await;
    let words: Vec<_> = result
        .pattern_issues()
        .iter()
        .map(|issue| issue.word().as_str())
        .collect();
    assert_eq!(words, vec!["Blood", "gun", "Knife", "Damn"]);
}

#[tokio::test]
async fn test_remote_failure_fails_closed() {
    let driver = MockDriver::new().with_text(MockBehavior::Error(RemoteErrorKind::Connection(
        "connection reset".to_string(),
    )));
    let filter = filter_with(&driver);

    let result = filter.check("A sunny day at the meadow with friends.").await;
    assert!(result.pattern_issues().is_empty());
    assert!(!result.is_appropriate());
    assert!(!result.remote().is_appropriate());
    assert_eq!(
        result.remote().issues(),
        &["Error performing AI content check"]
    );
}

#[tokio::test]
async fn test_unparseable_verdict_fails_closed() {
    let driver = MockDriver::new().with_text(MockBehavior::Success(
        "Looks fine to me!".to_string(),
    ));
    let filter = filter_with(&driver);

    let verdict = filter.remote_check("A sunny day.").await;
    assert!(!verdict.is_appropriate());
}

#[tokio::test]
async fn test_clean_story_after_substitution_skips_rewrite() {
    let driver = MockDriver::new().with_text(MockBehavior::Success(APPROVE.to_string()));
    let filter = filter_with(&driver);

    let filtered = filter
        .filter_story("The wizard said: Do not Kill the dragon, just shoot a bubble.")
        .await;

    assert_eq!(
        filtered,
        "The wizard said: Do not stop the dragon, just point a bubble."
    );
    assert_eq!(driver.text_calls(), 1);
}

#[tokio::test]
async fn test_rewrite_called_once_with_issues() {
    let driver = MockDriver::new().with_text_router(|req| {
        if is_classifier_call(req.system()) {
            MockResponse::Success(REJECT.to_string())
        } else {
            MockResponse::Success("  # A Gentle Story\n\nEveryone shared tea.  ".to_string())
        }
    });
    let filter = filter_with(&driver);

    let filtered = filter
        .filter_story("# A Story\n\nThe murder of crows sang loudly.")
        .await;

    assert_eq!(filtered, "# A Gentle Story\n\nEveryone shared tea.");
    let requests = driver.text_requests();
    assert_eq!(requests.len(), 2);
    let rewrites: Vec<_> = requests
        .iter()
        .filter(|req| !is_classifier_call(req.system()))
        .collect();
    assert_eq!(rewrites.len(), 1);
    assert!(rewrites[0].user().contains("- 'murder' in context:"));
    assert!(rewrites[0].user().contains("- a scary chase"));
    assert!(!rewrites[0].json_mode());
}

#[tokio::test]
async fn test_rewrite_failure_returns_substituted_text() {
    let driver = MockDriver::new().with_text_router(|req| {
        if is_classifier_call(req.system()) {
            MockResponse::Success(REJECT.to_string())
        } else {
            MockResponse::Error(RemoteErrorKind::Api {
                status_code: 500,
                message: "server error".to_string(),
            })
        }
    });
    let filter = filter_with(&driver);

    let filtered = filter.filter_story("The knife was dull. The night was dark.").await;
    assert_eq!(filtered, "The utensil was dull. The night was dark.");
}

#[tokio::test]
async fn test_empty_rewrite_returns_substituted_text() {
    let driver = MockDriver::new().with_text_router(|req| {
        if is_classifier_call(req.system()) {
            MockResponse::Success(REJECT.to_string())
        } else {
            MockResponse::Success("   ".to_string())
        }
    });
    let filter = filter_with(&driver);

    let filtered = filter.filter_story("What the hell is that noise?").await;
    assert_eq!(filtered, "What the heck is that noise?");
}

#[test]
fn test_image_prompt_filter_substitutes_then_adds_preamble() {
    let driver = MockDriver::new();
    let filter = filter_with(&driver);

    let prompt = filter.filter_image_prompt(
        "A pirate waving a knife. Style: colorful children's book illustration.",
    );
    assert_eq!(
        prompt,
        format!(
            "A pirate waving a utensil. {}Style: colorful children's book illustration.",
            SAFETY_PREAMBLE
        )
    );
    assert_eq!(driver.text_calls(), 0);
}
