// External response bodies

use serde::Serialize;
use trustgrid_core::{CanonicalRecord, TrustabilityReport};

use crate::error::RunError;

/// `{report, raw_data: {data}}`
#[derive(Debug, Serialize)]
pub struct TriggerResponse<'a> {
    pub report: &'a TrustabilityReport,
    pub raw_data: RawData<'a>,
}

#[derive(Debug, Serialize)]
pub struct RawData<'a> {
    pub data: &'a [CanonicalRecord],
}

/// `{error, category}` for a failed trigger or an empty retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub category: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            category: category.into(),
        }
    }

    /// Retrieval before any run has succeeded.
    pub fn no_report() -> Self {
        Self::new("no report has been generated yet", "no_report")
    }
}

impl From<&RunError> for ErrorBody {
    fn from(e: &RunError) -> Self {
        Self::new(e.message(), e.category())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustgrid_core::IngestError;

    #[test]
    fn error_body_shape() {
        let err = RunError::Ingest(IngestError::SourceUnreachable("auth failed (HTTP 401)".into()));
        let v = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(v["error"], "auth failed (HTTP 401)");
        assert_eq!(v["category"], "source_unreachable");
    }
}
