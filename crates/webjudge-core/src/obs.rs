//! Structured observability hooks for the evaluation lifecycle.
//!
//! This module provides:
//! - An evaluation-scoped span carrying the evaluation id and payload digest
//! - Emission functions for key events: start, rejection, extraction,
//!   evidence decoding, grading and finish
//!
//! Events are emitted at `info!` level, failures at `warn!`.

use tracing::{info, warn};

use crate::domain::{Constraint, EvaluationError, EvidenceDecodeError, Verdict};
use crate::reasoning::ReasoningError;

/// Span carrying the evaluation id and payload digest.
///
/// Attach it to async work with `tracing::Instrument`.
pub fn evaluation_span(evaluation_id: &str, payload_digest: &str) -> tracing::Span {
    tracing::info_span!(
        "webjudge.evaluation",
        evaluation_id = %evaluation_id,
        payload_digest = %payload_digest,
    )
}

pub fn emit_evaluation_started(task_len: usize, screenshots: usize, action_budget: u64) {
    info!(
        event = "evaluation.started",
        task_len = task_len,
        screenshots = screenshots,
        action_budget = action_budget,
    );
}

/// Warn: the payload failed validation or extraction yielded nothing.
pub fn emit_evaluation_rejected(error: &EvaluationError) {
    warn!(event = "evaluation.rejected", error = %error);
}

pub fn emit_constraints_extracted(constraints: &[Constraint]) {
    info!(
        event = "constraints.extracted",
        count = constraints.len(),
        critical = constraints.iter().filter(|c| c.critical).count(),
    );
}

pub fn emit_extraction_failed(error: &ReasoningError) {
    warn!(event = "constraints.failed", kind = error.kind(), error = %error);
}

pub fn emit_screenshot_skipped(index: usize, error: &EvidenceDecodeError) {
    warn!(event = "evidence.skipped", index = index, error = %error);
}

pub fn emit_evidence_normalized(decoded: usize, skipped: usize, actions_taken: usize) {
    info!(
        event = "evidence.normalized",
        decoded = decoded,
        skipped = skipped,
        actions_taken = actions_taken,
    );
}

pub fn emit_grading_failed(error: &ReasoningError) {
    warn!(event = "grading.failed", kind = error.kind(), error = %error);
}

/// The service's own total or verdict disagreed with the enforced rubric.
pub fn emit_verdict_adjusted(
    service_total: Option<i64>,
    service_verdict: &str,
    total: u32,
    verdict: Verdict,
) {
    warn!(
        event = "grading.adjusted",
        service_total = ?service_total,
        service_verdict = %service_verdict,
        total = total,
        verdict = %verdict,
    );
}

pub fn emit_evaluation_finished(total: Option<u32>, verdict: Verdict, duration_ms: u64) {
    info!(
        event = "evaluation.finished",
        total = ?total,
        verdict = %verdict,
        duration_ms = duration_ms,
    );
}
