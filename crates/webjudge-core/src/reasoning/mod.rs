//! Reasoning service seam.
//!
//! The evaluation engine talks to an external text-and-vision model through
//! [`ReasoningService`]. The production implementation is [`GeminiClient`];
//! tests substitute [`crate::fakes::ScriptedReasoningService`].
//!
//! Calls are wrapped by [`call_with_controls`], which applies the caller's
//! deadline and cancellation and, when the policy allows, retries transient
//! failures with jitter.

pub mod config;
pub mod controls;
pub mod error;
pub mod gemini;

use async_trait::async_trait;

use crate::domain::DecodedImage;

pub use config::ReasoningConfig;
pub use controls::{call_with_controls, CallContext, CancelHandle, CancelSignal, RetryPolicy};
pub use error::{ConfigError, ReasoningError};
pub use gemini::GeminiClient;

/// A single prompt, optionally paired with images.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningRequest<'a> {
    pub prompt: &'a str,
    /// Attached as multimodal context after the prompt, in order.
    pub images: &'a [DecodedImage],
}

impl<'a> ReasoningRequest<'a> {
    pub fn text(prompt: &'a str) -> Self {
        Self {
            prompt,
            images: &[],
        }
    }

    pub fn with_images(prompt: &'a str, images: &'a [DecodedImage]) -> Self {
        Self { prompt, images }
    }
}

/// An inference endpoint that answers in JSON-only response mode.
///
/// Implementations hold no per-request state and are shared across
/// concurrent evaluations behind an `Arc`.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send the request and return the raw response text.
    ///
    /// The text is expected, but not guaranteed, to be valid JSON.
    async fn generate_json(&self, request: ReasoningRequest<'_>) -> Result<String, ReasoningError>;
}
