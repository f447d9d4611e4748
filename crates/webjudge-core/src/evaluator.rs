//! Rubric evaluator.
//!
//! Builds one multimodal grading request, parses the structured response and
//! enforces the rubric algebra locally: the reasoning service proposes
//! scores, but ranges, the critical-constraint veto, the efficiency step
//! function, the total and the verdict are always recomputed here.
//!
//! Any failure yields [`GradingResult::sentinel`]; an inability to grade is
//! never reported as success.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::rubric::{efficiency_points, normalize_points};
use crate::domain::{
    CategoryScore, Constraint, DecodedImage, GradingResult, RubricCategory, RubricScores, Verdict,
};
use crate::obs;
use crate::reasoning::{
    call_with_controls, CallContext, ReasoningError, ReasoningRequest, ReasoningService,
    RetryPolicy,
};

/// Rubric definition sent with every grading request.
pub const RUBRIC_INSTRUCTIONS: &str = r#"You are an automated evaluator for web-browsing agents. Your task is to grade an agent's performance based on the provided evidence and a strict rubric.
You must score the agent out of 100 points and provide a final verdict ('SUCCESS' or 'FAILURE').

### Rubric (100 points total)
1.  **Goal Completion (40 points):**
    - 40 pts: The agent reached a final page/product that correctly satisfies ALL critical constraints.
    - Between 1-39 pts: The agent partially met the goal, satisfying some constraints but not all. Give proportional points based on how well it performed.
    - 0 pts: The final product is incorrect.
2.  **Constraint Adherence (40 points):**
    - Award points proportionally for each constraint from the list that is verifiably met in the evidence.
    - **CRITICAL RULE:** If a critical constraint (e.g., price, rating, specific item attribute) is violated, this ENTIRE section scores 0 points, leading to an automatic task failure.
3.  **Efficiency (10 points):**
    - 10 pts: Actions taken are less than or equal to the action budget.
    - 0 pts: Actions taken exceed the action budget.
4.  **Evidence Quality (10 points):**
    - 10 pts: The screenshots and action log provide clear, unambiguous proof for the final decision.
    - 5 pts: The evidence is present but confusing or incomplete.
    - 0 pts: The evidence does not support the agent's final answer.

### Final Verdict
- **SUCCESS:** The total score is > 80 AND no critical constraints were violated.
- **FAILURE:** The total score is <= 80 OR any critical constraint was violated.

You MUST respond in a valid JSON format with the following structure:
{
  "rubric_scores": {
    "goal_completion": {"score": <number>, "reasoning": "<text>"},
    "constraint_adherence": {"score": <number>, "reasoning": "<text>"},
    "efficiency": {"score": <number>, "reasoning": "<text>"},
    "evidence_quality": {"score": <number>, "reasoning": "<text>"}
  },
  "critical_violations": ["<text of each violated critical constraint>"],
  "total_score": <number>,
  "final_verdict": "<'SUCCESS' or 'FAILURE'>",
  "summary_reasoning": "<A brief, overall summary of the performance.>"
}"#;

/// Everything the grader needs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct GradingInput<'a> {
    pub constraints: &'a [Constraint],
    pub images: &'a [DecodedImage],
    pub action_trace: &'a str,
    pub actions_taken: usize,
    pub action_budget: u64,
}

/// Build the grading prompt. Images travel alongside it as separate parts.
pub fn build_prompt(input: &GradingInput<'_>) -> String {
    let listed: Vec<String> = input.constraints.iter().map(ToString::to_string).collect();
    let constraints =
        serde_json::to_string_pretty(&listed).unwrap_or_else(|_| format!("{listed:?}"));

    format!(
        r#"Please evaluate the following agent's performance based on the attached screenshots and the provided information.

**System Instructions:**
{RUBRIC_INSTRUCTIONS}

**Task Constraints to Verify:**
Constraints marked [CRITICAL] are critical constraints.
{constraints}

**Efficiency Constraints:**
- Action Budget: {budget}
- Actions Taken: {taken}

**Agent's Evidence:**
- Action Log: "{trace}"
- Screenshots are attached ({count} in chronological order)."#,
        budget = input.action_budget,
        taken = input.actions_taken,
        trace = input.action_trace,
        count = input.images.len(),
    )
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    score: f64,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawRubricScores {
    goal_completion: RawCategory,
    constraint_adherence: RawCategory,
    efficiency: RawCategory,
    evidence_quality: RawCategory,
}

#[derive(Debug, Deserialize)]
struct RawGrading {
    rubric_scores: RawRubricScores,
    #[serde(default)]
    critical_violations: Vec<String>,
    #[serde(default)]
    total_score: Option<f64>,
    final_verdict: String,
    summary_reasoning: String,
}

/// Parse a grading response and apply the rubric algebra.
pub fn parse_grading(
    body: &str,
    actions_taken: usize,
    action_budget: u64,
) -> Result<GradingResult, ReasoningError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ReasoningError::MalformedResponse(format!("invalid JSON: {e}")))?;
    let raw: RawGrading = serde_json::from_value(value)
        .map_err(|e| ReasoningError::SchemaMismatch(e.to_string()))?;

    let scores = enforce_rubric(&raw, actions_taken, action_budget);
    let result = GradingResult::from_scores(scores, raw.summary_reasoning.clone());

    let service_total = raw.total_score.map(|t| t.round() as i64);
    if service_total != Some(i64::from(result.total()))
        || Verdict::parse(&raw.final_verdict) != Some(result.final_verdict)
    {
        obs::emit_verdict_adjusted(
            service_total,
            raw.final_verdict.trim(),
            result.total(),
            result.final_verdict,
        );
    }

    Ok(result)
}

fn enforce_rubric(raw: &RawGrading, actions_taken: usize, action_budget: u64) -> RubricScores {
    let scores = &raw.rubric_scores;

    let goal_completion = CategoryScore::new(
        normalize_points(RubricCategory::GoalCompletion, scores.goal_completion.score),
        scores.goal_completion.reasoning.clone(),
    );

    let violations: Vec<&str> = raw
        .critical_violations
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    let constraint_adherence = if violations.is_empty() {
        CategoryScore::new(
            normalize_points(
                RubricCategory::ConstraintAdherence,
                scores.constraint_adherence.score,
            ),
            scores.constraint_adherence.reasoning.clone(),
        )
    } else {
        CategoryScore::new(
            0,
            format!(
                "Critical constraint violated: {}. {}",
                violations.join("; "),
                scores.constraint_adherence.reasoning
            )
            .trim_end()
            .to_string(),
        )
    };

    let efficiency_score = efficiency_points(actions_taken, action_budget);
    let efficiency = if normalize_points(RubricCategory::Efficiency, scores.efficiency.score)
        == efficiency_score
        && !scores.efficiency.reasoning.is_empty()
    {
        CategoryScore::new(efficiency_score, scores.efficiency.reasoning.clone())
    } else {
        let relation = if efficiency_score > 0 { "within" } else { "over" };
        CategoryScore::new(
            efficiency_score,
            format!("{actions_taken} actions taken, {relation} the budget of {action_budget}."),
        )
    };

    let evidence_quality = CategoryScore::new(
        normalize_points(RubricCategory::EvidenceQuality, scores.evidence_quality.score),
        scores.evidence_quality.reasoning.clone(),
    );

    RubricScores {
        goal_completion,
        constraint_adherence,
        efficiency,
        evidence_quality,
    }
}

/// Grades evidence through an injected reasoning service.
#[derive(Clone)]
pub struct RubricEvaluator {
    service: Arc<dyn ReasoningService>,
    policy: RetryPolicy,
}

impl RubricEvaluator {
    pub fn new(service: Arc<dyn ReasoningService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Grade, surfacing the kind of any failure.
    pub async fn try_grade(
        &self,
        input: &GradingInput<'_>,
        ctx: &CallContext,
    ) -> Result<GradingResult, ReasoningError> {
        let prompt = build_prompt(input);
        let body = call_with_controls(
            self.service.as_ref(),
            ReasoningRequest::with_images(&prompt, input.images),
            &self.policy,
            ctx,
        )
        .await?;
        parse_grading(&body, input.actions_taken, input.action_budget)
    }

    /// Grade; any failure yields the fail-closed sentinel.
    pub async fn grade(&self, input: &GradingInput<'_>, ctx: &CallContext) -> GradingResult {
        match self.try_grade(input, ctx).await {
            Ok(result) => result,
            Err(err) => {
                obs::emit_grading_failed(&err);
                GradingResult::sentinel()
            }
        }
    }
}
