//! Rubric categories, scores and the verdict algebra.
//!
//! | Category | Range | Rule |
//! |---|---|---|
//! | Goal completion | 0–40 | proportional, 40 only when every critical constraint holds |
//! | Constraint adherence | 0–40 | proportional, vetoed to 0 by any critical violation |
//! | Efficiency | {0, 10} | 10 iff actions taken ≤ action budget |
//! | Evidence quality | {0, 5, 10} | clear / confusing / unsupported |
//!
//! `SUCCESS` iff the total is above [`SUCCESS_THRESHOLD`] and constraint
//! adherence is non-zero.

use serde::{Deserialize, Serialize};

/// A total strictly above this is required for `SUCCESS`.
pub const SUCCESS_THRESHOLD: u32 = 80;

/// Summary carried by the fail-closed sentinel result.
pub const SENTINEL_SUMMARY: &str = "Error during evaluation.";

/// The four weighted scoring dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RubricCategory {
    GoalCompletion,
    ConstraintAdherence,
    Efficiency,
    EvidenceQuality,
}

impl RubricCategory {
    pub const ALL: [RubricCategory; 4] = [
        Self::GoalCompletion,
        Self::ConstraintAdherence,
        Self::Efficiency,
        Self::EvidenceQuality,
    ];

    pub fn max_points(self) -> u32 {
        match self {
            Self::GoalCompletion | Self::ConstraintAdherence => 40,
            Self::Efficiency | Self::EvidenceQuality => 10,
        }
    }

    /// Field name used in JSON results.
    pub fn key(self) -> &'static str {
        match self {
            Self::GoalCompletion => "goal_completion",
            Self::ConstraintAdherence => "constraint_adherence",
            Self::Efficiency => "efficiency",
            Self::EvidenceQuality => "evidence_quality",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::GoalCompletion => "Goal Completion",
            Self::ConstraintAdherence => "Constraint Adherence",
            Self::Efficiency => "Efficiency",
            Self::EvidenceQuality => "Evidence Quality",
        }
    }

    /// Points a category may take; `None` means any integer in `0..=max`.
    pub fn allowed_scores(self) -> Option<&'static [u32]> {
        match self {
            Self::Efficiency => Some(&[0, 10]),
            Self::EvidenceQuality => Some(&[0, 5, 10]),
            Self::GoalCompletion | Self::ConstraintAdherence => None,
        }
    }
}

impl std::fmt::Display for RubricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Final binary outcome of an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    /// Apply the verdict rule to a total and a constraint-adherence score.
    pub fn decide(total_score: u32, constraint_adherence: u32) -> Self {
        if total_score > SUCCESS_THRESHOLD && constraint_adherence > 0 {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// Parse a verdict string as the reasoning service writes it.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score and justification for one category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryScore {
    pub score: u32,
    pub reasoning: String,
}

impl CategoryScore {
    pub fn new(score: u32, reasoning: impl Into<String>) -> Self {
        Self {
            score,
            reasoning: reasoning.into(),
        }
    }
}

/// Scores for all four categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RubricScores {
    pub goal_completion: CategoryScore,
    pub constraint_adherence: CategoryScore,
    pub efficiency: CategoryScore,
    pub evidence_quality: CategoryScore,
}

impl RubricScores {
    pub fn get(&self, category: RubricCategory) -> &CategoryScore {
        match category {
            RubricCategory::GoalCompletion => &self.goal_completion,
            RubricCategory::ConstraintAdherence => &self.constraint_adherence,
            RubricCategory::Efficiency => &self.efficiency,
            RubricCategory::EvidenceQuality => &self.evidence_quality,
        }
    }

    /// Sum of the category scores; bounded to 0–100 by the category ranges.
    pub fn total(&self) -> u32 {
        RubricCategory::ALL
            .iter()
            .map(|c| self.get(*c).score)
            .sum()
    }
}

/// Outcome of grading one evaluation.
///
/// The fail-closed sentinel carries neither rubric scores nor a total and
/// serializes to `{"final_verdict": "FAILURE", "summary_reasoning": "Error during evaluation."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_scores: Option<RubricScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<u32>,
    pub final_verdict: Verdict,
    pub summary_reasoning: String,
}

impl GradingResult {
    /// Build a result from scores, deriving the total and the verdict.
    pub fn from_scores(scores: RubricScores, summary_reasoning: impl Into<String>) -> Self {
        let total = scores.total();
        let verdict = Verdict::decide(total, scores.constraint_adherence.score);
        Self {
            rubric_scores: Some(scores),
            total_score: Some(total),
            final_verdict: verdict,
            summary_reasoning: summary_reasoning.into(),
        }
    }

    /// The result returned whenever grading cannot be completed.
    pub fn sentinel() -> Self {
        Self {
            rubric_scores: None,
            total_score: None,
            final_verdict: Verdict::Failure,
            summary_reasoning: SENTINEL_SUMMARY.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.rubric_scores.is_none()
            && self.final_verdict == Verdict::Failure
            && self.summary_reasoning == SENTINEL_SUMMARY
    }

    /// Total score, 0 when absent.
    pub fn total(&self) -> u32 {
        self.total_score.unwrap_or(0)
    }

    /// Score of one category, 0 when absent.
    pub fn category_score(&self, category: RubricCategory) -> u32 {
        self.rubric_scores
            .as_ref()
            .map(|s| s.get(category).score)
            .unwrap_or(0)
    }

    pub fn is_success(&self) -> bool {
        self.final_verdict == Verdict::Success
    }
}

/// Efficiency is a step function: full credit within budget, nothing over it.
pub fn efficiency_points(actions_taken: usize, action_budget: u64) -> u32 {
    if actions_taken as u64 <= action_budget {
        RubricCategory::Efficiency.max_points()
    } else {
        0
    }
}

/// Round a raw service score half-down and clamp it into the category range,
/// snapping to the nearest allowed value for discrete categories (ties go
/// to the lower value).
pub fn normalize_points(category: RubricCategory, raw: f64) -> u32 {
    let max = category.max_points();
    let rounded = (raw - 0.5).ceil().clamp(0.0, f64::from(max)) as u32;
    match category.allowed_scores() {
        None => rounded,
        Some(allowed) => allowed
            .iter()
            .copied()
            .min_by_key(|v| (v.abs_diff(rounded), *v))
            .unwrap_or(0),
    }
}
