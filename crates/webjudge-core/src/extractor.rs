//! Constraint extractor.
//!
//! Turns a free-text task into an ordered list of atomic constraints with one
//! reasoning-service call.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::Constraint;
use crate::obs;
use crate::reasoning::{
    call_with_controls, CallContext, ReasoningError, ReasoningRequest, ReasoningService,
    RetryPolicy,
};

/// Instruction block sent ahead of every task.
pub const EXTRACTION_INSTRUCTIONS: &str = r#"You are an expert system designed to deconstruct a user's task into a list of specific, verifiable constraints.
Analyze the user's request and extract every distinct requirement that must be met for the task to be considered successful.
Each constraint should be a short, clear statement.
Mark a constraint as critical when violating it makes the final result wrong: a price range, a rating threshold, a dimension, or any specifically named attribute of the item.
Return the constraints as a JSON object with a single key "constraints" containing a list of objects, each with a "text" string and a "critical" boolean.
Example Task: 'Find the newest refrigerator that is 34-36 inches wide, priced between $1,000 and $2,000, and has a customer review rating of 4 stars or higher.'
Example Output:
{
  "constraints": [
    {"text": "Sort by 'Newest'", "critical": false},
    {"text": "Filter by width: 34-36 inches", "critical": true},
    {"text": "Filter by price: $1,000 - $2,000", "critical": true},
    {"text": "Filter by rating: 4 stars or higher", "critical": true}
  ]
}"#;

/// Build the extraction prompt for `task`.
pub fn build_prompt(task: &str) -> String {
    format!("{EXTRACTION_INSTRUCTIONS}\n\nHere is the task: {task}")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConstraint {
    Text(String),
    Tagged {
        text: String,
        #[serde(default)]
        critical: bool,
    },
}

/// Parse an extraction response body.
///
/// Accepts `{"constraints": [...]}` whose elements are plain strings or
/// `{"text", "critical"}` objects; blank entries are dropped.
pub fn parse_constraints(body: &str) -> Result<Vec<Constraint>, ReasoningError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ReasoningError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let items = value
        .get("constraints")
        .ok_or_else(|| ReasoningError::SchemaMismatch("missing `constraints` field".to_string()))?
        .as_array()
        .ok_or_else(|| {
            ReasoningError::SchemaMismatch("`constraints` is not an array".to_string())
        })?;

    let mut constraints = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let raw: RawConstraint = serde_json::from_value(item.clone()).map_err(|_| {
            ReasoningError::SchemaMismatch(format!("constraint {i} is neither a string nor an object with `text`"))
        })?;
        let constraint = match raw {
            RawConstraint::Text(text) => Constraint::new(text.trim()),
            RawConstraint::Tagged { text, critical } => Constraint {
                text: text.trim().to_string(),
                critical,
            },
        };
        if !constraint.text.is_empty() {
            constraints.push(constraint);
        }
    }
    Ok(constraints)
}

/// Extracts constraints through an injected reasoning service.
#[derive(Clone)]
pub struct ConstraintExtractor {
    service: Arc<dyn ReasoningService>,
    policy: RetryPolicy,
}

impl ConstraintExtractor {
    pub fn new(service: Arc<dyn ReasoningService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// Extract constraints, surfacing the kind of any failure.
    pub async fn try_extract(
        &self,
        task: &str,
        ctx: &CallContext,
    ) -> Result<Vec<Constraint>, ReasoningError> {
        let prompt = build_prompt(task);
        let body = call_with_controls(
            self.service.as_ref(),
            ReasoningRequest::text(&prompt),
            &self.policy,
            ctx,
        )
        .await?;
        parse_constraints(&body)
    }

    /// Extract constraints; any failure yields an empty list.
    pub async fn extract(&self, task: &str, ctx: &CallContext) -> Vec<Constraint> {
        match self.try_extract(task, ctx).await {
            Ok(constraints) => {
                obs::emit_constraints_extracted(&constraints);
                constraints
            }
            Err(err) => {
                obs::emit_extraction_failed(&err);
                Vec::new()
            }
        }
    }
}
