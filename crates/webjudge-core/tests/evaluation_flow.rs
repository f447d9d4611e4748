//! End-to-end evaluation tests against a scripted reasoning service.
//!
//! Each test scripts the extraction response followed by the grading
//! response, then asserts on the outbound result and on what the fake saw.

use std::sync::Arc;

use base64::Engine;
use serde_json::{json, Value};

use webjudge_core::fakes::{sample_image, ScriptedReasoningService};
use webjudge_core::{
    EvaluationOutcome, GradingResult, ImageFormat, ReasoningError, RetryPolicy, RubricCategory,
    Verdict, WebJudge,
};

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn png() -> Vec<u8> {
    sample_image(ImageFormat::Png, 8, 6)
}

fn jpeg() -> Vec<u8> {
    sample_image(ImageFormat::Jpeg, 8, 6)
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn payload(screenshots: Vec<String>, trace: &str, budget: u32) -> Value {
    json!({
        "task_prompt": "Find the newest refrigerator priced $1000-$2000 with 4+ stars",
        "action_budget": budget,
        "evidence_bundle": {
            "screenshots": screenshots,
            "action_trace": trace,
        }
    })
}

fn default_payload() -> Value {
    payload(
        vec![data_uri("image/png", &png()), data_uri("image/jpeg", &jpeg())],
        "open site\nsearch refrigerator\nsort by newest",
        10,
    )
}

fn extraction() -> Value {
    json!({"constraints": [
        {"text": "Sort by newest", "critical": false},
        {"text": "Price: $1,000 - $2,000", "critical": true},
        {"text": "Rating: 4+ stars", "critical": true}
    ]})
}

fn grading(gc: f64, ca: f64, eff: f64, eq: f64, violations: &[&str]) -> Value {
    json!({
        "rubric_scores": {
            "goal_completion": {"score": gc, "reasoning": "final page shows a refrigerator"},
            "constraint_adherence": {"score": ca, "reasoning": "constraints checked"},
            "efficiency": {"score": eff, "reasoning": "within budget"},
            "evidence_quality": {"score": eq, "reasoning": "screenshots are clear"}
        },
        "critical_violations": violations,
        "total_score": gc + ca + eff + eq,
        "final_verdict": "SUCCESS",
        "summary_reasoning": "The agent found a matching refrigerator."
    })
}

fn scripted(grading_response: Value) -> Arc<ScriptedReasoningService> {
    Arc::new(
        ScriptedReasoningService::new()
            .then_respond_json(extraction())
            .then_respond_json(grading_response),
    )
}

fn judge(fake: Arc<ScriptedReasoningService>) -> WebJudge {
    WebJudge::new(fake, RetryPolicy::none())
}

fn graded(outcome: EvaluationOutcome) -> GradingResult {
    match outcome {
        EvaluationOutcome::Graded(result) => result,
        EvaluationOutcome::Error(err) => panic!("expected a grading result, got {err:?}"),
    }
}

// -------------------------------------------------------------------------
// Validation and extraction
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_fields_rejected_before_any_call() {
    let fake = Arc::new(ScriptedReasoningService::new());
    let outcome = judge(fake.clone())
        .evaluate(&json!({"task_prompt": "Find a fridge"}))
        .await;

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({
            "status": "error",
            "message": "Payload is missing required fields: action_budget, evidence_bundle.screenshots, evidence_bundle.action_trace"
        })
    );
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_empty_extraction_never_invokes_grader() {
    let fake = Arc::new(
        ScriptedReasoningService::new()
            .then_respond_json(json!({"constraints": []}))
            .then_respond_json(grading(40.0, 40.0, 10.0, 10.0, &[])),
    );
    let outcome = judge(fake.clone()).evaluate(&default_payload()).await;

    assert_eq!(
        outcome.error_message(),
        Some("Could not deconstruct task into key points.")
    );
    assert_eq!(fake.call_count(), 1);
}

#[tokio::test]
async fn test_failed_extraction_is_structured_error() {
    let fake = Arc::new(
        ScriptedReasoningService::new().then_fail(ReasoningError::MalformedResponse(
            "not json".into(),
        )),
    );
    let outcome = judge(fake.clone()).evaluate(&default_payload()).await;

    assert!(outcome.is_error());
    assert_eq!(fake.call_count(), 1);
}

// -------------------------------------------------------------------------
// Grading
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_full_marks_is_success() {
    let fake = scripted(grading(40.0, 40.0, 10.0, 10.0, &[]));
    let result = graded(judge(fake.clone()).evaluate(&default_payload()).await);

    assert_eq!(result.total_score, Some(100));
    assert_eq!(result.final_verdict, Verdict::Success);
    assert_eq!(fake.call_count(), 2);

    let grading_prompt = &fake.calls()[1].prompt;
    assert!(grading_prompt.contains("Price: $1,000 - $2,000 [CRITICAL]"));
    assert!(grading_prompt.contains("- Actions Taken: 3"));
    assert!(grading_prompt.contains("- Action Budget: 10"));
}

#[tokio::test]
async fn test_critical_price_violation_forces_failure() {
    let fake = scripted(grading(
        40.0,
        35.0,
        10.0,
        10.0,
        &["Price: $1,000 - $2,000"],
    ));
    let result = graded(judge(fake).evaluate(&default_payload()).await);

    assert_eq!(result.category_score(RubricCategory::ConstraintAdherence), 0);
    assert!(result.total() <= 60);
    assert_eq!(result.total_score, Some(60));
    assert_eq!(result.final_verdict, Verdict::Failure);
}

#[tokio::test]
async fn test_zero_adherence_fails_even_when_service_claims_success() {
    let fake = scripted(grading(40.0, 0.0, 10.0, 10.0, &[]));
    let result = graded(judge(fake).evaluate(&default_payload()).await);

    assert_eq!(result.total_score, Some(60));
    assert_eq!(result.final_verdict, Verdict::Failure);
}

#[tokio::test]
async fn test_total_of_exactly_eighty_is_failure() {
    let fake = scripted(grading(30.0, 30.0, 10.0, 10.0, &[]));
    let result = graded(judge(fake).evaluate(&default_payload()).await);

    assert_eq!(result.total_score, Some(80));
    assert_eq!(result.final_verdict, Verdict::Failure);
}

#[tokio::test]
async fn test_out_of_range_scores_keep_total_bounded() {
    let fake = scripted(grading(75.0, 120.0, 7.5, 42.0, &[]));
    let result = graded(judge(fake).evaluate(&default_payload()).await);

    let total = result.total_score.unwrap();
    assert!(total <= 100);
    assert_eq!(total, 100);
    assert_eq!(result.category_score(RubricCategory::Efficiency), 10);
}

#[tokio::test]
async fn test_efficiency_within_budget() {
    let trace = "a\nb\nc\nd\ne";
    let fake = scripted(grading(40.0, 40.0, 0.0, 10.0, &[]));
    let result = graded(
        judge(fake)
            .evaluate(&payload(vec![data_uri("image/png", &png())], trace, 10))
            .await,
    );

    assert_eq!(result.category_score(RubricCategory::Efficiency), 10);
}

#[tokio::test]
async fn test_efficiency_over_budget() {
    let trace = (1..=12).map(|i| format!("step {i}")).collect::<Vec<_>>().join("\n");
    let fake = scripted(grading(40.0, 40.0, 10.0, 10.0, &[]));
    let result = graded(
        judge(fake)
            .evaluate(&payload(vec![data_uri("image/png", &png())], &trace, 10))
            .await,
    );

    assert_eq!(result.category_score(RubricCategory::Efficiency), 0);
    assert_eq!(result.total_score, Some(90));
}

#[tokio::test]
async fn test_invalid_grading_json_yields_sentinel() {
    let fake = Arc::new(
        ScriptedReasoningService::new()
            .then_respond_json(extraction())
            .then_respond("The agent did well, I think."),
    );
    let outcome = judge(fake).evaluate(&default_payload()).await;

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({"final_verdict": "FAILURE", "summary_reasoning": "Error during evaluation."})
    );
}

#[tokio::test]
async fn test_grading_error_yields_sentinel() {
    let fake = Arc::new(
        ScriptedReasoningService::new()
            .then_respond_json(extraction())
            .then_fail(ReasoningError::Rejected {
                status: 400,
                body: "bad request".into(),
            }),
    );
    let result = graded(judge(fake).evaluate(&default_payload()).await);
    assert!(result.is_sentinel());
}

// -------------------------------------------------------------------------
// Evidence handling
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_malformed_screenshot_is_skipped() {
    let screenshots = vec![
        data_uri("image/png", &png()),
        "data:image/png;base64,***not-base64***".to_string(),
        data_uri("image/jpeg", &jpeg()),
    ];
    let fake = scripted(grading(40.0, 40.0, 10.0, 10.0, &[]));
    let result = graded(
        judge(fake.clone())
            .evaluate(&payload(screenshots, "open\nsearch", 10))
            .await,
    );

    assert!(!result.is_sentinel());
    let calls = fake.calls();
    assert!(calls[0].image_indices.is_empty());
    assert_eq!(calls[1].image_indices, vec![0, 2]);
}

#[tokio::test]
async fn test_corrupt_image_is_skipped_and_grading_proceeds() {
    let mut truncated = png();
    truncated.truncate(truncated.len() / 2);
    let screenshots = vec![
        data_uri("image/png", PNG_SIGNATURE),
        data_uri("image/png", &png()),
        data_uri("image/png", &truncated),
    ];
    let fake = scripted(grading(40.0, 40.0, 10.0, 10.0, &[]));
    let result = graded(
        judge(fake.clone())
            .evaluate(&payload(screenshots, "open\nsearch", 10))
            .await,
    );

    assert_eq!(result.total_score, Some(100));
    assert_eq!(fake.calls()[1].image_indices, vec![1]);
}

#[tokio::test]
async fn test_path_screenshots_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("step1.png");
    let second = dir.path().join("step2.jpg");
    std::fs::write(&first, png()).unwrap();
    std::fs::write(&second, jpeg()).unwrap();
    let missing = dir.path().join("missing.png");

    let screenshots = vec![
        first.display().to_string(),
        missing.display().to_string(),
        second.display().to_string(),
    ];
    let fake = scripted(grading(40.0, 40.0, 10.0, 10.0, &[]));
    graded(
        judge(fake.clone())
            .evaluate(&payload(screenshots, "open", 10))
            .await,
    );

    assert_eq!(fake.calls()[1].image_indices, vec![0, 2]);
}

// -------------------------------------------------------------------------
// Determinism and isolation
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_identical_payloads_produce_identical_results() {
    let payload = default_payload();
    let first = judge(scripted(grading(35.0, 30.0, 10.0, 5.0, &[])))
        .evaluate(&payload)
        .await;
    let second = judge(scripted(grading(35.0, 30.0, 10.0, 5.0, &[])))
        .evaluate(&payload)
        .await;

    assert_eq!(first, second);
    assert_eq!(graded(first).total_score, Some(80));
}

#[tokio::test]
async fn test_concurrent_evaluations_share_one_engine() {
    let fake = Arc::new(ScriptedReasoningService::new().with_fallback(Ok(json!({
        "constraints": ["Sort by newest"],
        "rubric_scores": {
            "goal_completion": {"score": 40, "reasoning": "ok"},
            "constraint_adherence": {"score": 40, "reasoning": "ok"},
            "efficiency": {"score": 10, "reasoning": "ok"},
            "evidence_quality": {"score": 10, "reasoning": "ok"}
        },
        "total_score": 100,
        "final_verdict": "SUCCESS",
        "summary_reasoning": "ok"
    })
    .to_string())));
    let judge = judge(fake.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let judge = judge.clone();
        handles.push(tokio::spawn(async move {
            judge.evaluate(&default_payload()).await
        }));
    }
    for handle in handles {
        let result = graded(handle.await.unwrap());
        assert_eq!(result.final_verdict, Verdict::Success);
    }
    assert_eq!(fake.call_count(), 8);
}
