//! Gemini `generateContent` client.
//!
//! Sends the prompt and any images as one multimodal user turn and requests
//! `application/json` output.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::config::ReasoningConfig;
use super::error::{ConfigError, ReasoningError};
use super::{ReasoningRequest, ReasoningService};

/// HTTP client for the Gemini generative-language API.
pub struct GeminiClient {
    config: ReasoningConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new client from explicit configuration.
    pub fn new(config: ReasoningConfig) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("webjudge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(GeminiClient {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Request body for one multimodal turn in JSON response mode.
    pub fn build_body(request: ReasoningRequest<'_>) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        parts.extend(request.images.iter().map(|image| {
            json!({
                "inline_data": {
                    "mime_type": image.mime_type(),
                    "data": image.to_base64(),
                }
            })
        }));

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseMimeType": "application/json" }
        })
    }
}

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn generate_json(&self, request: ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        debug!(
            model = %self.config.model,
            prompt_len = request.prompt.len(),
            images = request.images.len(),
            "calling reasoning service"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::ServiceUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;
        candidate_text(&payload)
    }
}

/// Concatenate the text parts of the first candidate.
pub fn candidate_text(payload: &Value) -> Result<String, ReasoningError> {
    let parts = payload["candidates"][0]["content"]["parts"].as_array();
    let text: String = parts
        .into_iter()
        .flatten()
        .filter_map(|part| part["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        let reason = payload["promptFeedback"]["blockReason"]
            .as_str()
            .or_else(|| payload["candidates"][0]["finishReason"].as_str())
            .unwrap_or("no text in first candidate");
        return Err(ReasoningError::MalformedResponse(reason.to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DecodedImage, ImageFormat};

    #[test]
    fn test_build_body_requests_json_mode_and_inlines_images() {
        let images = vec![DecodedImage {
            index: 0,
            format: ImageFormat::Png,
            width: 1,
            height: 1,
            bytes: vec![1, 2, 3],
        }];
        let body = GeminiClient::build_body(ReasoningRequest::with_images("grade", &images));

        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "grade");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        });
        assert_eq!(candidate_text(&payload).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_candidate_text_reports_block_reason() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = candidate_text(&payload).unwrap_err();
        assert_eq!(err, ReasoningError::MalformedResponse("SAFETY".to_string()));
    }
}
