use std::fmt;

/// Batch-level failure of a source adapter.
///
/// Field-level problems never surface here; they become remediation flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Host unreachable, auth rejected, non-success status, retries exhausted.
    SourceUnreachable(String),
    /// Extension or content signature not accepted by the adapter.
    UnsupportedFormat(String),
    /// Structurally malformed monolithic file or response body.
    ParseFailure(String),
    /// Trigger request is missing what the adapter needs (file, url).
    InvalidRequest(String),
    /// The per-run network budget ran out.
    Timeout(String),
}

impl IngestError {
    /// Stable machine-readable category.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SourceUnreachable(_) => "source_unreachable",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ParseFailure(_) => "parse_failure",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Timeout(_) => "timeout",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::SourceUnreachable(m)
            | Self::UnsupportedFormat(m)
            | Self::ParseFailure(m)
            | Self::InvalidRequest(m)
            | Self::Timeout(m) => m,
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnreachable(msg) => write!(f, "source unreachable: {msg}"),
            Self::UnsupportedFormat(msg) => write!(f, "unsupported format: {msg}"),
            Self::ParseFailure(msg) => write!(f, "parse failure: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {}
