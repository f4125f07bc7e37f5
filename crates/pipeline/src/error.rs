use std::fmt;

use trustgrid_config::ConfigError;
use trustgrid_core::IngestError;

/// Why a run produced no report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    Ingest(IngestError),
    Config(ConfigError),
}

impl RunError {
    /// Stable machine-readable category, shared with [`IngestError::category`].
    pub fn category(&self) -> &'static str {
        match self {
            Self::Ingest(e) => e.category(),
            Self::Config(_) => "config_invalid",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Ingest(e) => e.message().to_string(),
            Self::Config(e) => e.to_string(),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<IngestError> for RunError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
