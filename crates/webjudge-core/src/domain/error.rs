//! Domain-level error taxonomy for WebJudge.

/// Errors that stop an evaluation before the grader is reached.
///
/// Both variants are surfaced to the caller as a structured
/// `{"status": "error", "message": ...}` response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// A required payload field is missing, empty or of the wrong type.
    #[error("Payload is missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// Constraint extraction produced nothing usable.
    #[error("Could not deconstruct task into key points.")]
    NoConstraints,
}

/// Errors produced while decoding a single screenshot.
///
/// Never escalates past the evidence normalizer: the entry is skipped.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceDecodeError {
    #[error("screenshot entry is empty")]
    Empty,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognised image format (leading bytes {leading})")]
    UnsupportedFormat { leading: String },

    /// The format was recognised but the image data does not decode.
    #[error("corrupt image data: {0}")]
    Corrupt(#[from] image::ImageError),
}
