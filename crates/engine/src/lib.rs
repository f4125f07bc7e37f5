//! `trustgrid-engine` — pure unification, remediation and scoring.
//!
//! Receives a captured [`RawBatch`], returns canonical records and a
//! [`TrustabilityReport`]. No network or filesystem access; every timestamp
//! comes from the caller's [`Clock`].

pub mod coerce;
pub mod normalize;
pub mod remediate;
pub mod report;
pub mod score;
pub mod unify;

use trustgrid_config::PipelineConfig;
use trustgrid_core::{CanonicalRecord, Clock, RawBatch, TrustabilityReport};

pub use remediate::{remediate, Rules};
pub use score::{DimensionScorer, RecordSet, Scorecard, ScoringEngine};
pub use unify::unify;

/// Records and report of one processed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub records: Vec<CanonicalRecord>,
    pub report: TrustabilityReport,
}

/// Unify, remediate and score `batch` under `config`.
///
/// Deterministic: the same batch, config and clock give the same output.
pub fn process(config: &PipelineConfig, batch: &RawBatch, clock: &dyn Clock) -> Processed {
    process_with(config, batch, clock, &ScoringEngine::standard(config.scoring.clone()))
}

/// [`process`] with a caller-supplied scoring engine.
pub fn process_with(
    config: &PipelineConfig,
    batch: &RawBatch,
    clock: &dyn Clock,
    engine: &ScoringEngine,
) -> Processed {
    let now = clock.now();
    let source_type = batch.capture.source_type();
    let source = config.schema_for(source_type);

    let mut records = unify(batch, &source, now);

    let rules = Rules {
        schema: &config.schema,
        source: &source,
        plausibility: &config.plausibility,
        today: now.date_naive(),
    };
    remediate(&mut records, &rules);

    let set = RecordSet::new(&records, rules);
    let scorecard = engine.score(&set);
    let report = report::assemble(&set, scorecard, source_type, batch.capture.lineage_id(), now);

    Processed { records, report }
}
