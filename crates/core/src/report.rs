use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::source::SourceType;

/// Report status for a successful run that produced zero records.
pub const NO_DATA_STATUS: &str = "No Data Found for this period";

// ---------------------------------------------------------------------------
// Dimensions + status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dimension {
    Completeness,
    Accuracy,
    Validity,
    Consistency,
    Uniqueness,
    Integrity,
    Lineage,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Completeness,
        Dimension::Accuracy,
        Dimension::Validity,
        Dimension::Consistency,
        Dimension::Uniqueness,
        Dimension::Integrity,
        Dimension::Lineage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "Completeness",
            Self::Accuracy => "Accuracy",
            Self::Validity => "Validity",
            Self::Consistency => "Consistency",
            Self::Uniqueness => "Uniqueness",
            Self::Integrity => "Integrity",
            Self::Lineage => "Lineage",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Warn,
    Fail,
}

impl Status {
    pub const PASS_AT: u8 = 90;
    pub const WARN_AT: u8 = 70;

    /// Fixed thresholds: `>= 90` PASS, `70..90` WARN, below 70 FAIL.
    pub fn from_score(score: u8) -> Self {
        if score >= Self::PASS_AT {
            Self::Pass
        } else if score >= Self::WARN_AT {
            Self::Warn
        } else {
            Self::Fail
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Warn => write!(f, "WARN"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: u8,
    pub status: Status,
}

impl DimensionScore {
    /// Scores above 100 are clamped; status is always derived, never passed in.
    pub fn new(dimension: Dimension, score: u8) -> Self {
        let score = score.min(100);
        Self {
            dimension,
            score,
            status: Status::from_score(score),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Success,
    NoData,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NoData => NO_DATA_STATUS,
        }
    }
}

impl Serialize for ReportStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Aggregated remediation flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub missing: usize,
    pub invalid: usize,
    pub duplicate: usize,
    pub inconsistent: usize,
    pub corrupted: usize,
    pub duplicate_indices: Vec<usize>,
    pub integrity_fail_indices: Vec<usize>,
}

/// Immutable result of one run. Built only through [`TrustabilityReport::scored`]
/// or [`TrustabilityReport::no_data`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustabilityReport {
    status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    overall_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    overall_status: Option<Status>,
    total_records: usize,
    dimensions: Vec<DimensionScore>,
    issues: IssueSummary,
    source_type: SourceType,
    lineage_id: String,
    generated_at: String,
}

impl TrustabilityReport {
    pub fn scored(
        dimensions: Vec<DimensionScore>,
        overall_score: u8,
        total_records: usize,
        issues: IssueSummary,
        source_type: SourceType,
        lineage_id: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let overall_score = overall_score.min(100);
        Self {
            status: ReportStatus::Success,
            overall_score: Some(overall_score),
            overall_status: Some(Status::from_score(overall_score)),
            total_records,
            dimensions,
            issues,
            source_type,
            lineage_id: lineage_id.into(),
            generated_at: generated_at.to_rfc3339(),
        }
    }

    /// The empty-result sentinel: no scores, no dimensions.
    pub fn no_data(
        source_type: SourceType,
        lineage_id: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: ReportStatus::NoData,
            overall_score: None,
            overall_status: None,
            total_records: 0,
            dimensions: Vec::new(),
            issues: IssueSummary::default(),
            source_type,
            lineage_id: lineage_id.into(),
            generated_at: generated_at.to_rfc3339(),
        }
    }

    pub fn status(&self) -> ReportStatus {
        self.status
    }

    pub fn is_no_data(&self) -> bool {
        self.status == ReportStatus::NoData
    }

    pub fn overall_score(&self) -> Option<u8> {
        self.overall_score
    }

    pub fn overall_status(&self) -> Option<Status> {
        self.overall_status
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn dimensions(&self) -> &[DimensionScore] {
        &self.dimensions
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }

    pub fn issues(&self) -> &IssueSummary {
        &self.issues
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn lineage_id(&self) -> &str {
        &self.lineage_id
    }

    pub fn generated_at(&self) -> &str {
        &self.generated_at
    }
}
