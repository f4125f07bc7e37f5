//! Trust Scoring: seven dimension scorers and the weighted overall score.
//!
//! Each dimension is a [`DimensionScorer`] over a [`RecordSet`]. Scorers are
//! pure and never see each other's output; the overall score is a weighted
//! mean computed by [`ScoringEngine`].

mod dimensions;

use std::collections::{BTreeSet, HashSet};

use trustgrid_config::{CoreField, ScoringConfig};
use trustgrid_core::{CanonicalRecord, Dimension, DimensionScore, FieldValue};

use crate::remediate::Rules;

pub use dimensions::{
    Accuracy, Completeness, Consistency, Integrity, Lineage, Uniqueness, Validity,
};

/// One quality dimension.
pub trait DimensionScorer {
    fn dimension(&self) -> Dimension;

    /// Score in `0..=100`. Only called on a non-empty set.
    fn score(&self, set: &RecordSet<'_>) -> u8;
}

/// Remediated records plus what the scorers derive from them once.
pub struct RecordSet<'a> {
    pub records: &'a [CanonicalRecord],
    pub rules: Rules<'a>,
    active: Vec<CoreField>,
    integrity_failures: BTreeSet<usize>,
}

impl<'a> RecordSet<'a> {
    pub fn new(records: &'a [CanonicalRecord], rules: Rules<'a>) -> Self {
        let active = rules.active_required(records);
        let integrity_failures = integrity_failures(records, &rules);
        Self {
            records,
            rules,
            active,
            integrity_failures,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Required core fields present somewhere in the batch.
    pub fn active_required(&self) -> &[CoreField] {
        &self.active
    }

    /// Record indices failing a referential or structural check, ascending.
    pub fn integrity_failures(&self) -> impl Iterator<Item = usize> + '_ {
        self.integrity_failures.iter().copied()
    }

    pub fn fails_integrity(&self, index: usize) -> bool {
        self.integrity_failures.contains(&index)
    }
}

/// `floor(100 * num / den)`; an empty denominator scores 100.
pub fn percent(num: usize, den: usize) -> u8 {
    if den == 0 {
        return 100;
    }
    let num = num.min(den);
    ((num as u128 * 100) / den as u128) as u8
}

// ---------------------------------------------------------------------------
// Integrity checks
// ---------------------------------------------------------------------------

fn integrity_failures(records: &[CanonicalRecord], rules: &Rules<'_>) -> BTreeSet<usize> {
    let mut failed = BTreeSet::new();

    for r in records.iter().filter(|r| r.is_corrupted()) {
        failed.insert(r.index);
    }

    for reference in &rules.schema.references {
        let targets: HashSet<String> = records
            .iter()
            .filter_map(|r| r.get(&reference.target))
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
            .collect();
        for r in records {
            if let Some(v) = r.get(&reference.field).filter(|v| !v.is_missing()) {
                if !targets.contains(&v.to_string()) {
                    failed.insert(r.index);
                }
            }
        }
    }

    if rules.source.is_multimedia() {
        for r in records {
            if format_mismatch(r) {
                failed.insert(r.index);
            }
        }
    }

    failed
}

/// The member's extension disagrees with the format found in its header.
fn format_mismatch(record: &CanonicalRecord) -> bool {
    let text = |k: &str| record.get(k).and_then(FieldValue::as_text).map(canonical_format);
    match (text("extension"), text("detected_format")) {
        (Some(ext), Some(found)) => ext != found,
        _ => false,
    }
}

fn canonical_format(s: &str) -> String {
    let s = s.trim().trim_start_matches('.').to_ascii_lowercase();
    if s == "jpg" {
        "jpeg".to_string()
    } else {
        s
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-dimension scores and the weighted overall score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub dimensions: Vec<DimensionScore>,
    pub overall: u8,
}

pub struct ScoringEngine {
    scorers: Vec<Box<dyn DimensionScorer>>,
    weights: ScoringConfig,
}

impl ScoringEngine {
    /// The seven standard dimensions, in report order.
    pub fn standard(weights: ScoringConfig) -> Self {
        Self {
            scorers: vec![
                Box::new(Completeness),
                Box::new(Accuracy),
                Box::new(Validity),
                Box::new(Consistency),
                Box::new(Uniqueness),
                Box::new(Integrity),
                Box::new(Lineage),
            ],
            weights,
        }
    }

    /// Replace the scorer for the same dimension. The engine always scores
    /// exactly the seven dimensions, so nothing is ever appended.
    pub fn with_scorer(mut self, scorer: Box<dyn DimensionScorer>) -> Self {
        match self.scorers.iter().position(|s| s.dimension() == scorer.dimension()) {
            Some(i) => self.scorers[i] = scorer,
            None => tracing::warn!(dimension = %scorer.dimension(), "no such dimension; scorer ignored"),
        }
        self
    }

    /// `None` for an empty set: there is nothing to score.
    pub fn score(&self, set: &RecordSet<'_>) -> Option<Scorecard> {
        if set.is_empty() {
            return None;
        }
        let dimensions: Vec<DimensionScore> = self
            .scorers
            .iter()
            .map(|s| DimensionScore::new(s.dimension(), s.score(set).min(100)))
            .collect();
        let overall = weighted_mean(&dimensions, &self.weights);
        tracing::debug!(overall, "scored record set");
        Some(Scorecard { dimensions, overall })
    }
}

/// Rounded weighted mean. Falls back to the plain mean when every weight is zero.
pub fn weighted_mean(dimensions: &[DimensionScore], weights: &ScoringConfig) -> u8 {
    if dimensions.is_empty() {
        return 0;
    }
    let total: f64 = dimensions.iter().map(|d| weights.weight(d.dimension)).sum();
    let mean = if total > 0.0 {
        dimensions
            .iter()
            .map(|d| d.score as f64 * weights.weight(d.dimension))
            .sum::<f64>()
            / total
    } else {
        dimensions.iter().map(|d| d.score as f64).sum::<f64>() / dimensions.len() as f64
    };
    mean.round().clamp(0.0, 100.0) as u8
}
