//! In-memory fakes and fixtures (testing only)
//!
//! `ScriptedReasoningService` replays canned responses in order and records
//! every request it receives, so tests can assert both what was sent and how
//! many calls were made. [`sample_image`] produces well-formed screenshots.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ImageFormat;
use crate::reasoning::{ReasoningError, ReasoningRequest, ReasoningService};

/// Encode a solid `width`×`height` image in `format`.
///
/// Returns an empty buffer if the encoder rejects the dimensions.
pub fn sample_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let pixels = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    match image::DynamicImage::ImageRgb8(pixels).write_to(&mut out, format.to_decoder()) {
        Ok(()) => out.into_inner(),
        Err(_) => Vec::new(),
    }
}

/// A request observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    /// `DecodedImage::index` of each attached image, in order.
    pub image_indices: Vec<usize>,
}

/// Reasoning service that answers from a script.
#[derive(Debug, Default)]
pub struct ScriptedReasoningService {
    script: Mutex<VecDeque<Result<String, ReasoningError>>>,
    fallback: Option<Result<String, ReasoningError>>,
    latency: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedReasoningService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response body.
    pub fn then_respond(self, body: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(body.into()));
        self
    }

    /// Queue a JSON value as the response body.
    pub fn then_respond_json(self, value: serde_json::Value) -> Self {
        self.then_respond(value.to_string())
    }

    /// Queue an error.
    pub fn then_fail(self, err: ReasoningError) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(err));
        self
    }

    /// Answer used once the script is exhausted.
    pub fn with_fallback(mut self, response: Result<String, ReasoningError>) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoningService {
    async fn generate_json(&self, request: ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                prompt: request.prompt.to_string(),
                image_indices: request.images.iter().map(|i| i.index).collect(),
            });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(response) => response,
            None => self.fallback.clone().unwrap_or_else(|| {
                Err(ReasoningError::ServiceUnavailable(
                    "script exhausted".to_string(),
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_replays_in_order_then_falls_back() {
        let fake = ScriptedReasoningService::new()
            .then_respond("first")
            .then_fail(ReasoningError::MalformedResponse("bad".into()))
            .with_fallback(Ok("again".into()));

        let req = ReasoningRequest::text("p");
        assert_eq!(fake.generate_json(req).await.unwrap(), "first");
        assert!(fake.generate_json(req).await.is_err());
        assert_eq!(fake.generate_json(req).await.unwrap(), "again");
        assert_eq!(fake.call_count(), 3);
        assert_eq!(fake.calls()[0].prompt, "p");
    }

    #[test]
    fn test_sample_image_is_encoded_in_format() {
        let png = sample_image(ImageFormat::Png, 2, 2);
        assert_eq!(&png[1..4], b"PNG");
        let jpeg = sample_image(ImageFormat::Jpeg, 2, 2);
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_unavailable() {
        let fake = ScriptedReasoningService::new();
        let err = fake
            .generate_json(ReasoningRequest::text("p"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
