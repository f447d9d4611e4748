//! Error types for the reasoning-service layer.

/// Failures of a call to the reasoning service.
///
/// Callers choose a policy per kind: only [`ReasoningError::ServiceUnavailable`]
/// is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReasoningError {
    /// Transport failure, attempt timeout, HTTP 429 or 5xx.
    #[error("reasoning service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service refused the request (non-retryable HTTP status).
    #[error("reasoning service rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response carried no text, or the text was not JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response was JSON of the wrong shape.
    #[error("response schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("call cancelled")]
    Cancelled,
}

impl ReasoningError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }

    /// Short stable name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Rejected { .. } => "rejected",
            Self::MalformedResponse(_) => "malformed_response",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for ReasoningError {
    fn from(err: reqwest::Error) -> Self {
        ReasoningError::ServiceUnavailable(err.to_string())
    }
}

/// Errors raised while building a [`super::ReasoningConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),
}
