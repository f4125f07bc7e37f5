//! `trustgrid-core` — shared data model for the ingestion pipeline.
//!
//! Every other crate speaks in these types: adapters produce a
//! [`RawBatch`], the engine turns it into [`CanonicalRecord`]s and a
//! [`TrustabilityReport`]. No I/O lives here.

pub mod adapter;
pub mod capture;
pub mod error;
pub mod record;
pub mod report;
pub mod source;
pub mod value;

pub use adapter::{Clock, FixedClock, RunBudget, RunContext, SourceAdapter, SystemClock};
pub use capture::{RawBatch, RawCapture, RawItem};
pub use error::IngestError;
pub use record::{CanonicalRecord, IssueKind, Provenance, RemediationFlag};
pub use report::{
    Dimension, DimensionScore, IssueSummary, ReportStatus, Status, TrustabilityReport,
    NO_DATA_STATUS,
};
pub use source::{SourceType, TriggerRequest, UploadedFile};
pub use value::FieldValue;
