//! Domain models for WebJudge.
//!
//! Canonical definitions for the entities of one evaluation:
//! - `Constraint`: an atomic, verifiable requirement extracted from a task
//! - `EvidenceBundle`: ordered screenshots plus the agent's action log
//! - `GradingResult`: the rubric scores and final verdict
//! - `EvaluationPayload`: the inbound request, validated before any work

pub mod constraint;
pub mod digest;
pub mod error;
pub mod evidence;
pub mod payload;
pub mod rubric;

pub use constraint::Constraint;
pub use digest::payload_digest;
pub use error::{EvaluationError, EvidenceDecodeError};
pub use evidence::{count_actions, DecodedImage, EvidenceBundle, ImageFormat, ScreenshotRef};
pub use payload::{ErrorResponse, EvaluationOutcome, EvaluationPayload, RawEvidenceBundle};
pub use rubric::{
    CategoryScore, GradingResult, RubricCategory, RubricScores, Verdict, SENTINEL_SUMMARY,
    SUCCESS_THRESHOLD,
};
