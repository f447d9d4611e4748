//! WebJudge Core Library
//!
//! Evaluation engine for autonomous web-browsing agents: decomposes a task
//! into verifiable constraints and grades an evidence bundle against them
//! with a weighted rubric and a critical-constraint veto.
//!
//! ## Pipeline
//!
//! - [`extractor`]: task → ordered constraints (one reasoning call)
//! - [`normalizer`]: screenshots → decoded images, trace → action count
//! - [`evaluator`]: constraints + evidence → [`GradingResult`] (one reasoning call)
//! - [`orchestrator`]: validation and sequencing, structured errors

pub mod domain;
pub mod evaluator;
pub mod extractor;
pub mod fakes;
pub mod normalizer;
pub mod obs;
pub mod orchestrator;
pub mod reasoning;
pub mod telemetry;

pub use domain::{
    count_actions, payload_digest, CategoryScore, Constraint, DecodedImage, ErrorResponse,
    EvaluationError, EvaluationOutcome, EvaluationPayload, EvidenceBundle, EvidenceDecodeError,
    GradingResult, ImageFormat, RawEvidenceBundle, RubricCategory, RubricScores, ScreenshotRef,
    Verdict, SENTINEL_SUMMARY, SUCCESS_THRESHOLD,
};

pub use evaluator::{parse_grading, GradingInput, RubricEvaluator, RUBRIC_INSTRUCTIONS};
pub use extractor::{parse_constraints, ConstraintExtractor, EXTRACTION_INSTRUCTIONS};
pub use normalizer::{decode_screenshot, normalize_evidence, NormalizedEvidence, SkippedScreenshot};
pub use orchestrator::WebJudge;
pub use reasoning::{
    call_with_controls, CallContext, CancelHandle, CancelSignal, ConfigError, GeminiClient,
    ReasoningConfig, ReasoningError, ReasoningRequest, ReasoningService, RetryPolicy,
};

pub use obs::{
    emit_constraints_extracted, emit_evaluation_finished, emit_evaluation_rejected,
    emit_evaluation_started, emit_evidence_normalized, emit_extraction_failed,
    emit_grading_failed, emit_screenshot_skipped, emit_verdict_adjusted, evaluation_span,
};
pub use telemetry::init_tracing;

/// WebJudge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
