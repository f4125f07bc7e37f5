//! One run: Adapter → Unifier → Remediation → Scoring → Assembler.

use std::collections::BTreeMap;
use std::sync::Arc;

use trustgrid_config::PipelineConfig;
use trustgrid_core::{
    CanonicalRecord, Clock, IngestError, RawCapture, RunBudget, RunContext, SourceAdapter,
    SourceType, SystemClock, TriggerRequest, TrustabilityReport,
};
use trustgrid_engine::process;

use crate::error::RunError;
use crate::registry::adapter_for;
use crate::response::{RawData, TriggerResponse};

/// Outcome of a successful run. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    capture: RawCapture,
    records: Vec<CanonicalRecord>,
    report: TrustabilityReport,
}

impl CompletedRun {
    pub fn capture(&self) -> &RawCapture {
        &self.capture
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn report(&self) -> &TrustabilityReport {
        &self.report
    }

    /// The first `limit` records.
    pub fn preview(&self, limit: usize) -> &[CanonicalRecord] {
        trustgrid_engine::report::preview(&self.records, limit)
    }

    /// Success body of a trigger: the report plus a record preview.
    pub fn response(&self, preview_limit: usize) -> TriggerResponse<'_> {
        TriggerResponse {
            report: &self.report,
            raw_data: RawData {
                data: self.preview(preview_limit),
            },
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    overrides: BTreeMap<SourceType, Box<dyn SourceAdapter>>,
}

impl Pipeline {
    /// Validates `config` up front; a pipeline never runs on a bad config.
    pub fn new(config: PipelineConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            overrides: BTreeMap::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Serve `source_type` with `adapter` instead of the built-in one.
    pub fn with_adapter(mut self, source_type: SourceType, adapter: Box<dyn SourceAdapter>) -> Self {
        self.overrides.insert(source_type, adapter);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, req: &TriggerRequest) -> Result<CompletedRun, RunError> {
        if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
            if start > end {
                return Err(IngestError::InvalidRequest(format!(
                    "start_date {start} is after end_date {end}"
                ))
                .into());
            }
        }

        let built;
        let adapter: &dyn SourceAdapter = match self.overrides.get(&req.source_type) {
            Some(a) => a.as_ref(),
            None => {
                built = adapter_for(req.source_type, &self.config);
                built.as_ref()
            }
        };

        let ctx = RunContext::new(self.clock.as_ref(), RunBudget::new(self.config.fetch.run_budget()));
        tracing::info!(
            source = %req.source_type,
            adapter = adapter.name(),
            origin = %req.origin(),
            "run started"
        );

        let batch = adapter.ingest(req, &ctx).map_err(|e| {
            tracing::warn!(source = %req.source_type, category = e.category(), error = %e, "ingestion failed");
            e
        })?;

        let processed = process(&self.config, &batch, self.clock.as_ref());
        tracing::info!(
            source = %req.source_type,
            lineage_id = batch.capture.lineage_id(),
            records = processed.records.len(),
            overall = ?processed.report.overall_score(),
            "run complete"
        );

        Ok(CompletedRun {
            capture: batch.capture,
            records: processed.records,
            report: processed.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use trustgrid_core::{FixedClock, UploadedFile};

    fn pipeline() -> Pipeline {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        Pipeline::new(PipelineConfig::default())
            .unwrap()
            .with_clock(Arc::new(clock))
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.schema.identity_key.clear();
        let err = Pipeline::new(config).err().unwrap();
        assert_eq!(err.category(), "config_invalid");
    }

    #[test]
    fn reversed_date_range_rejected() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 1, day);
        let req = TriggerRequest::new(SourceType::Api)
            .with_url("http://127.0.0.1:9/")
            .with_dates(d(10), d(1));
        let err = pipeline().run(&req).unwrap_err();
        assert_eq!(err.category(), "invalid_request");
    }

    #[test]
    fn upload_without_file_rejected() {
        let err = pipeline().run(&TriggerRequest::new(SourceType::CsvUpload)).unwrap_err();
        assert_eq!(err.category(), "invalid_request");
    }

    #[test]
    fn csv_upload_end_to_end() {
        let csv = "address,price,listed_date\n12 oak st,250000,2026-01-04\n9 elm ave,310000,2026-01-05\n";
        let req = TriggerRequest::new(SourceType::CsvUpload)
            .with_file(UploadedFile::new("listings.csv", csv.as_bytes().to_vec()));
        let run = pipeline().run(&req).unwrap();
        assert_eq!(run.records().len(), 2);
        assert_eq!(run.report().overall_score(), Some(100));
        assert_eq!(run.report().lineage_id(), run.capture().lineage_id());
        assert_eq!(run.preview(1).len(), 1);
    }
}
