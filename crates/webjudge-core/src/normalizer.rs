//! Evidence normalizer.
//!
//! Decodes every screenshot reference into an in-memory image. A bad entry is
//! logged and skipped; the grader then sees less evidence and the
//! evidence-quality category absorbs the loss.

use std::io::Cursor;

use base64::Engine;
use image::ImageReader;

use crate::domain::{
    count_actions, DecodedImage, EvidenceBundle, EvidenceDecodeError, ImageFormat, ScreenshotRef,
};
use crate::obs;

/// A screenshot that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedScreenshot {
    pub index: usize,
    pub reason: String,
}

/// Canonical in-memory form of an evidence bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvidence {
    /// Successfully decoded images, in submission order.
    pub images: Vec<DecodedImage>,
    pub skipped: Vec<SkippedScreenshot>,
    pub actions_taken: usize,
}

/// Decode all screenshots of `bundle` and count its actions.
pub async fn normalize_evidence(bundle: &EvidenceBundle) -> NormalizedEvidence {
    let mut images = Vec::with_capacity(bundle.screenshots.len());
    let mut skipped = Vec::new();

    for (index, screenshot) in bundle.screenshots.iter().enumerate() {
        match decode_screenshot(index, screenshot).await {
            Ok(image) => images.push(image),
            Err(err) => {
                obs::emit_screenshot_skipped(index, &err);
                skipped.push(SkippedScreenshot {
                    index,
                    reason: err.to_string(),
                });
            }
        }
    }

    NormalizedEvidence {
        images,
        skipped,
        actions_taken: count_actions(&bundle.action_trace),
    }
}

/// Decode one screenshot reference.
pub async fn decode_screenshot(
    index: usize,
    screenshot: &ScreenshotRef,
) -> Result<DecodedImage, EvidenceDecodeError> {
    let bytes = match screenshot {
        ScreenshotRef::Encoded(_) => {
            let body = screenshot.encoded_body().unwrap_or_default();
            if body.is_empty() {
                return Err(EvidenceDecodeError::Empty);
            }
            base64::engine::general_purpose::STANDARD.decode(strip_whitespace(body))?
        }
        ScreenshotRef::Path(path) => {
            if path.as_os_str().is_empty() {
                return Err(EvidenceDecodeError::Empty);
            }
            tokio::fs::read(path)
                .await
                .map_err(|source| EvidenceDecodeError::Unreadable {
                    path: path.display().to_string(),
                    source,
                })?
        }
    };

    decode_image(index, bytes)
}

/// Fully decode `bytes` as an image of an accepted format.
///
/// The original bytes are kept for transport; decoding only proves they are
/// a complete, well-formed image.
pub fn decode_image(index: usize, bytes: Vec<u8>) -> Result<DecodedImage, EvidenceDecodeError> {
    let unsupported = || EvidenceDecodeError::UnsupportedFormat {
        leading: hex::encode(&bytes[..bytes.len().min(8)]),
    };

    let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| EvidenceDecodeError::Corrupt(image::ImageError::IoError(e)))?;
    let format = reader
        .format()
        .and_then(ImageFormat::from_decoder)
        .ok_or_else(unsupported)?;
    let decoded = reader.decode()?;

    Ok(DecodedImage {
        index,
        format,
        width: decoded.width(),
        height: decoded.height(),
        bytes,
    })
}

/// Base64 bodies copied from logs or JSON often carry line breaks.
fn strip_whitespace(body: &str) -> String {
    body.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}
