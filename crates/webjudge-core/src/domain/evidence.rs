//! Evidence submitted by an agent: screenshots and the action log.

use std::path::PathBuf;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Entries at least this long without a data-URI marker are treated as
/// inline-encoded images rather than paths.
pub const INLINE_LENGTH_THRESHOLD: usize = 200;

const DATA_URI_MARKER: &str = "base64,";

/// A screenshot reference, resolved once at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScreenshotRef {
    /// Base64 image data, optionally still carrying a `data:...;base64,` prefix.
    Encoded(String),
    /// A filesystem path to an image file.
    Path(PathBuf),
}

impl ScreenshotRef {
    /// Classify a raw screenshot entry.
    ///
    /// Data URIs and long strings are inline images; anything else is a path.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("data:")
            || trimmed.contains(DATA_URI_MARKER)
            || trimmed.len() > INLINE_LENGTH_THRESHOLD
        {
            Self::Encoded(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    /// The base64 body of an encoded entry with any data-URI prefix removed.
    pub fn encoded_body(&self) -> Option<&str> {
        match self {
            Self::Encoded(data) => Some(match data.split_once(DATA_URI_MARKER) {
                Some((_, body)) => body.trim(),
                None => data.trim(),
            }),
            Self::Path(_) => None,
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self, Self::Encoded(_))
    }
}

/// Image container formats accepted as evidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// Map a format detected by the decoder; `None` for formats not accepted as evidence.
    pub fn from_decoder(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn to_decoder(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Gif => image::ImageFormat::Gif,
            Self::Webp => image::ImageFormat::WebP,
            Self::Bmp => image::ImageFormat::Bmp,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

/// A screenshot that decoded successfully, kept in its original encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Position of the entry in the submitted screenshot list.
    pub index: usize,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Standard base64 encoding of the image bytes, as sent to the reasoning service.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// The ordered screenshots plus action log submitted as proof of behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceBundle {
    /// Chronological order of the agent's actions.
    pub screenshots: Vec<ScreenshotRef>,
    pub action_trace: String,
    pub action_budget: u64,
}

impl EvidenceBundle {
    pub fn actions_taken(&self) -> usize {
        count_actions(&self.action_trace)
    }
}

/// Count the non-empty lines of an action trace.
pub fn count_actions(trace: &str) -> usize {
    trace.lines().filter(|line| !line.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_actions() {
        assert_eq!(count_actions("a\nb\nc"), 3);
        assert_eq!(count_actions(""), 0);
        assert_eq!(count_actions("click\n\n   \ntype\r\nsubmit\n"), 3);
    }

    #[test]
    fn test_classify_data_uri_as_encoded() {
        let r = ScreenshotRef::classify("data:image/png;base64,iVBORw0KGgo=");
        assert!(r.is_encoded());
        assert_eq!(r.encoded_body(), Some("iVBORw0KGgo="));
    }

    #[test]
    fn test_classify_short_string_as_path() {
        let r = ScreenshotRef::classify("  shots/step_1.png ");
        assert_eq!(r, ScreenshotRef::Path(PathBuf::from("shots/step_1.png")));
        assert_eq!(r.encoded_body(), None);
    }

    #[test]
    fn test_classify_long_string_as_encoded() {
        let raw = "A".repeat(INLINE_LENGTH_THRESHOLD + 1);
        let r = ScreenshotRef::classify(&raw);
        assert_eq!(r.encoded_body(), Some(raw.as_str()));
    }

    #[test]
    fn test_decoder_formats_round_trip() {
        for format in [
            ImageFormat::Png,
            ImageFormat::Jpeg,
            ImageFormat::Gif,
            ImageFormat::Webp,
            ImageFormat::Bmp,
        ] {
            assert_eq!(ImageFormat::from_decoder(format.to_decoder()), Some(format));
        }
        assert_eq!(ImageFormat::from_decoder(image::ImageFormat::Tiff), None);
        assert_eq!(ImageFormat::Webp.mime_type(), "image/webp");
    }

    #[test]
    fn test_bundle_actions_taken() {
        let bundle = EvidenceBundle {
            screenshots: vec![],
            action_trace: "open\nclick\n".to_string(),
            action_budget: 10,
        };
        assert_eq!(bundle.actions_taken(), 2);
    }
}
