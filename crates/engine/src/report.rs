//! Report Assembler.

use chrono::{DateTime, Utc};
use trustgrid_core::{CanonicalRecord, IssueKind, IssueSummary, SourceType, TrustabilityReport};

use crate::score::{RecordSet, Scorecard};

/// Flag counts per kind plus the indices the report calls out by name.
pub fn summarize_issues(set: &RecordSet<'_>) -> IssueSummary {
    let mut summary = IssueSummary::default();
    for record in set.records {
        for flag in &record.flags {
            match flag.issue_kind {
                IssueKind::Missing => summary.missing += 1,
                IssueKind::Invalid => summary.invalid += 1,
                IssueKind::Duplicate => summary.duplicate += 1,
                IssueKind::Inconsistent => summary.inconsistent += 1,
                IssueKind::Corrupted => summary.corrupted += 1,
            }
        }
        if record.has_flag(IssueKind::Duplicate) {
            summary.duplicate_indices.push(record.index);
        }
    }
    summary.integrity_fail_indices = set.integrity_failures().collect();
    summary
}

/// Build the run's report. No scorecard means no records: the sentinel.
pub fn assemble(
    set: &RecordSet<'_>,
    scorecard: Option<Scorecard>,
    source_type: SourceType,
    lineage_id: &str,
    generated_at: DateTime<Utc>,
) -> TrustabilityReport {
    match scorecard {
        Some(card) => TrustabilityReport::scored(
            card.dimensions,
            card.overall,
            set.len(),
            summarize_issues(set),
            source_type,
            lineage_id,
            generated_at,
        ),
        None => TrustabilityReport::no_data(source_type, lineage_id, generated_at),
    }
}

/// The first `limit` records, for inline previews.
pub fn preview(records: &[CanonicalRecord], limit: usize) -> &[CanonicalRecord] {
    &records[..records.len().min(limit)]
}
