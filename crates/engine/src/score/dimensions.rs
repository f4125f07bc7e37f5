use chrono::DateTime;
use trustgrid_config::CoreField;
use trustgrid_core::{CanonicalRecord, Dimension, FieldValue, IssueKind};

use super::{percent, DimensionScorer, RecordSet};

/// Filled required slots over all required slots.
pub struct Completeness;

impl DimensionScorer for Completeness {
    fn dimension(&self) -> Dimension {
        Dimension::Completeness
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        let fields = set.active_required();
        let filled = set
            .records
            .iter()
            .flat_map(|r| fields.iter().map(move |f| r.get(f.as_str())))
            .filter(|v| v.is_some_and(|v| !v.is_missing()))
            .count();
        percent(filled, set.len() * fields.len())
    }
}

/// Typed values and dates that fall inside the plausibility ranges.
pub struct Accuracy;

impl DimensionScorer for Accuracy {
    fn dimension(&self) -> Dimension {
        Dimension::Accuracy
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        let p = set.rules.plausibility;
        let values: Vec<f64> = set
            .records
            .iter()
            .filter_map(|r| r.get(CoreField::Value.as_str()).and_then(FieldValue::as_f64))
            .collect();
        let spread = Spread::of(&values, p.outlier_min_sample);

        let mut checked = 0;
        let mut plausible = 0;
        for &v in &values {
            checked += 1;
            let in_range = v > p.value_min && p.value_max.map_or(true, |max| v <= max);
            let outlier = spread.is_some_and(|s| s.z(v) > p.outlier_z);
            if in_range && !outlier {
                plausible += 1;
            }
        }

        let date_fields = set.rules.date_fields();
        for r in set.records {
            for field in &date_fields {
                if let Some(d) = r.get(field).and_then(FieldValue::as_date) {
                    checked += 1;
                    if d >= p.date_min && d <= set.rules.today {
                        plausible += 1;
                    }
                }
            }
        }
        percent(plausible, checked)
    }
}

#[derive(Debug, Clone, Copy)]
struct Spread {
    mean: f64,
    std: f64,
}

impl Spread {
    /// Population mean and deviation; `None` below `min_sample` values or
    /// when every value is equal.
    fn of(values: &[f64], min_sample: usize) -> Option<Self> {
        if values.len() < min_sample.max(2) {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        (std > 0.0 && std.is_finite()).then_some(Self { mean, std })
    }

    fn z(&self, v: f64) -> f64 {
        ((v - self.mean) / self.std).abs()
    }
}

/// Present value and date slots that hold the expected type.
pub struct Validity;

impl DimensionScorer for Validity {
    fn dimension(&self) -> Dimension {
        Dimension::Validity
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        let date_fields = set.rules.date_fields();
        let mut present = 0;
        let mut typed = 0;
        for r in set.records {
            if let Some(v) = r.get(CoreField::Value.as_str()).filter(|v| !v.is_missing()) {
                present += 1;
                if v.as_f64().is_some() {
                    typed += 1;
                }
            }
            for field in &date_fields {
                if let Some(v) = r.get(field).filter(|v| !v.is_missing()) {
                    present += 1;
                    if v.as_date().is_some() {
                        typed += 1;
                    }
                }
            }
        }
        percent(typed, present)
    }
}

fn share_without(set: &RecordSet<'_>, kind: IssueKind) -> u8 {
    let clean = set.records.iter().filter(|r| !r.has_flag(kind)).count();
    percent(clean, set.len())
}

pub struct Consistency;

impl DimensionScorer for Consistency {
    fn dimension(&self) -> Dimension {
        Dimension::Consistency
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        share_without(set, IssueKind::Inconsistent)
    }
}

pub struct Uniqueness;

impl DimensionScorer for Uniqueness {
    fn dimension(&self) -> Dimension {
        Dimension::Uniqueness
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        share_without(set, IssueKind::Duplicate)
    }
}

/// Records that are readable, reference existing keys and match their
/// declared format.
pub struct Integrity;

impl DimensionScorer for Integrity {
    fn dimension(&self) -> Dimension {
        Dimension::Integrity
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        let failed = set.integrity_failures().count();
        percent(set.len().saturating_sub(failed), set.len())
    }
}

/// Records whose provenance is complete.
pub struct Lineage;

impl DimensionScorer for Lineage {
    fn dimension(&self) -> Dimension {
        Dimension::Lineage
    }

    fn score(&self, set: &RecordSet<'_>) -> u8 {
        let traced = set.records.iter().filter(|r| has_lineage(r)).count();
        percent(traced, set.len())
    }
}

fn has_lineage(record: &CanonicalRecord) -> bool {
    let p = &record.provenance;
    !p.source_id.trim().is_empty()
        && !p.lineage_id.trim().is_empty()
        && DateTime::parse_from_rfc3339(&p.ingestion_timestamp).is_ok()
}
