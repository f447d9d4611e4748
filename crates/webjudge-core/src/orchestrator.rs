//! Verdict aggregator.
//!
//! Sequences one evaluation: validate payload → extract constraints → (abort
//! if none) → normalize evidence → grade. The grader is never invoked with
//! zero constraints.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{payload_digest, EvaluationError, EvaluationOutcome, EvaluationPayload};
use crate::evaluator::{GradingInput, RubricEvaluator};
use crate::extractor::ConstraintExtractor;
use crate::normalizer::normalize_evidence;
use crate::obs;
use crate::reasoning::{
    CallContext, ConfigError, GeminiClient, ReasoningConfig, ReasoningService, RetryPolicy,
};

/// The evaluation engine.
///
/// Holds only the shared, stateless reasoning-service handle; concurrent
/// evaluations on one `WebJudge` are independent.
#[derive(Clone)]
pub struct WebJudge {
    extractor: ConstraintExtractor,
    evaluator: RubricEvaluator,
}

impl WebJudge {
    pub fn new(service: Arc<dyn ReasoningService>, policy: RetryPolicy) -> Self {
        Self {
            extractor: ConstraintExtractor::new(service.clone(), policy.clone()),
            evaluator: RubricEvaluator::new(service, policy),
        }
    }

    /// Build an engine backed by [`GeminiClient`].
    pub fn from_config(config: ReasoningConfig) -> Result<Self, ConfigError> {
        let policy = config.retry.clone();
        let client = GeminiClient::new(config)?;
        Ok(Self::new(Arc::new(client), policy))
    }

    pub fn extractor(&self) -> &ConstraintExtractor {
        &self.extractor
    }

    pub fn evaluator(&self) -> &RubricEvaluator {
        &self.evaluator
    }

    /// Evaluate an inbound payload with no deadline.
    pub async fn evaluate(&self, payload: &Value) -> EvaluationOutcome {
        self.evaluate_with(payload, &CallContext::unbounded()).await
    }

    /// Evaluate an inbound payload under the caller's deadline and cancellation.
    pub async fn evaluate_with(&self, payload: &Value, ctx: &CallContext) -> EvaluationOutcome {
        let evaluation_id = Uuid::new_v4().to_string();
        let span = obs::evaluation_span(&evaluation_id, &payload_digest(payload));
        self.run(payload, ctx).instrument(span).await
    }

    /// Evaluate a typed payload.
    pub async fn evaluate_payload(
        &self,
        payload: &EvaluationPayload,
        ctx: &CallContext,
    ) -> EvaluationOutcome {
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        self.evaluate_with(&value, ctx).await
    }

    async fn run(&self, raw: &Value, ctx: &CallContext) -> EvaluationOutcome {
        let started = Instant::now();

        let payload = match EvaluationPayload::from_value(raw) {
            Ok(payload) => payload,
            Err(err) => return reject(err),
        };
        obs::emit_evaluation_started(
            payload.task_prompt.len(),
            payload.evidence_bundle.screenshots.len(),
            payload.action_budget,
        );

        let constraints = self.extractor.extract(&payload.task_prompt, ctx).await;
        if constraints.is_empty() {
            return reject(EvaluationError::NoConstraints);
        }

        let bundle = payload.evidence();
        let evidence = normalize_evidence(&bundle).await;
        obs::emit_evidence_normalized(
            evidence.images.len(),
            evidence.skipped.len(),
            evidence.actions_taken,
        );

        let input = GradingInput {
            constraints: &constraints,
            images: &evidence.images,
            action_trace: &bundle.action_trace,
            actions_taken: evidence.actions_taken,
            action_budget: bundle.action_budget,
        };
        let result = self.evaluator.grade(&input, ctx).await;

        obs::emit_evaluation_finished(
            result.total_score,
            result.final_verdict,
            started.elapsed().as_millis() as u64,
        );
        EvaluationOutcome::Graded(result)
    }
}

fn reject(err: EvaluationError) -> EvaluationOutcome {
    obs::emit_evaluation_rejected(&err);
    EvaluationOutcome::rejected(&err)
}
