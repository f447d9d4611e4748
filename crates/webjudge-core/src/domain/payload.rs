//! Inbound evaluation payload and outbound outcome shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::EvaluationError;
use super::evidence::{EvidenceBundle, ScreenshotRef};
use super::rubric::GradingResult;

/// Raw evidence as received on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEvidenceBundle {
    /// Inline-encoded images or path references, in action order.
    #[serde(default)]
    pub screenshots: Vec<String>,
    /// Newline-delimited action log.
    #[serde(default)]
    pub action_trace: String,
}

/// The inbound request to evaluate one agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationPayload {
    pub task_prompt: String,
    pub action_budget: u64,
    pub evidence_bundle: RawEvidenceBundle,
}

impl EvaluationPayload {
    /// Parse and validate an untyped payload.
    ///
    /// Every missing, empty or mistyped required field is reported at once.
    pub fn from_value(value: &Value) -> Result<Self, EvaluationError> {
        let mut missing = Vec::new();

        let task_prompt = value
            .get("task_prompt")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty());
        if task_prompt.is_none() {
            missing.push("task_prompt");
        }

        let action_budget = value
            .get("action_budget")
            .and_then(Value::as_u64)
            .filter(|n| *n > 0);
        if action_budget.is_none() {
            missing.push("action_budget");
        }

        let evidence = value.get("evidence_bundle");
        let screenshots: Option<Vec<String>> = evidence
            .and_then(|e| e.get("screenshots"))
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .and_then(|a| {
                a.iter()
                    .map(|s| s.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            });
        if screenshots.is_none() {
            missing.push("evidence_bundle.screenshots");
        }

        let action_trace = evidence
            .and_then(|e| e.get("action_trace"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty());
        if action_trace.is_none() {
            missing.push("evidence_bundle.action_trace");
        }

        match (task_prompt, action_budget, screenshots, action_trace) {
            (Some(task_prompt), Some(action_budget), Some(screenshots), Some(action_trace)) => {
                Ok(Self {
                    task_prompt: task_prompt.to_string(),
                    action_budget,
                    evidence_bundle: RawEvidenceBundle {
                        screenshots,
                        action_trace: action_trace.to_string(),
                    },
                })
            }
            _ => Err(EvaluationError::MissingFields {
                fields: missing.into_iter().map(str::to_string).collect(),
            }),
        }
    }

    /// Resolve screenshot entries into tagged references.
    pub fn evidence(&self) -> EvidenceBundle {
        EvidenceBundle {
            screenshots: self
                .evidence_bundle
                .screenshots
                .iter()
                .map(|s| ScreenshotRef::classify(s))
                .collect(),
            action_trace: self.evidence_bundle.action_trace.clone(),
            action_budget: self.action_budget,
        }
    }
}

/// Structured error returned instead of a grading result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl From<&EvaluationError> for ErrorResponse {
    fn from(err: &EvaluationError) -> Self {
        Self {
            status: "error".to_string(),
            message: err.to_string(),
        }
    }
}

/// What an evaluation returns to the transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EvaluationOutcome {
    Graded(GradingResult),
    Error(ErrorResponse),
}

impl EvaluationOutcome {
    pub fn rejected(err: &EvaluationError) -> Self {
        Self::Error(err.into())
    }

    pub fn grading(&self) -> Option<&GradingResult> {
        match self {
            Self::Graded(result) => Some(result),
            Self::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Graded(_) => None,
            Self::Error(e) => Some(e.message.as_str()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "task_prompt": "Find the newest refrigerator priced $1000-$2000",
            "action_budget": 10,
            "evidence_bundle": {
                "screenshots": ["shots/1.png", "shots/2.png"],
                "action_trace": "open site\nsearch fridge"
            }
        })
    }

    #[test]
    fn test_from_value_accepts_valid_payload() {
        let payload = EvaluationPayload::from_value(&valid()).unwrap();
        assert_eq!(payload.action_budget, 10);
        assert_eq!(payload.evidence_bundle.screenshots.len(), 2);
    }

    #[test]
    fn test_from_value_reports_all_missing_fields() {
        let err = EvaluationPayload::from_value(&json!({})).unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MissingFields {
                fields: vec![
                    "task_prompt".to_string(),
                    "action_budget".to_string(),
                    "evidence_bundle.screenshots".to_string(),
                    "evidence_bundle.action_trace".to_string(),
                ]
            }
        );
    }

    #[test]
    fn test_from_value_rejects_empty_and_mistyped_fields() {
        let mut v = valid();
        v["task_prompt"] = json!("   ");
        v["action_budget"] = json!(0);
        v["evidence_bundle"]["screenshots"] = json!([]);
        v["evidence_bundle"]["action_trace"] = json!("");
        let err = EvaluationPayload::from_value(&v).unwrap_err();
        assert!(matches!(err, EvaluationError::MissingFields { ref fields } if fields.len() == 4));

        let mut v = valid();
        v["action_budget"] = json!("ten");
        let err = EvaluationPayload::from_value(&v).unwrap_err();
        assert_eq!(err.to_string(), "Payload is missing required fields: action_budget");
    }

    #[test]
    fn test_from_value_accepts_budget_beyond_u32() {
        let mut v = valid();
        v["action_budget"] = json!(5_000_000_000u64);
        let payload = EvaluationPayload::from_value(&v).unwrap();
        assert_eq!(payload.action_budget, 5_000_000_000);
        assert_eq!(payload.evidence().action_budget, 5_000_000_000);
    }

    #[test]
    fn test_evidence_classifies_entries() {
        let payload = EvaluationPayload::from_value(&valid()).unwrap();
        let bundle = payload.evidence();
        assert!(bundle.screenshots.iter().all(|s| !s.is_encoded()));
        assert_eq!(bundle.actions_taken(), 2);
        assert_eq!(bundle.action_budget, 10);
    }

    #[test]
    fn test_error_outcome_shape() {
        let outcome = EvaluationOutcome::rejected(&EvaluationError::NoConstraints);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "status": "error",
                "message": "Could not deconstruct task into key points."
            })
        );
        assert!(outcome.is_error());
    }
}
