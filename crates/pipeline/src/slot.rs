//! The "current report" holder.
//!
//! One run at a time holds `run_lock` from start to finish. Readers never
//! wait on a run: they take a short read lock on `current` and clone the
//! `Arc`. Only a successful run replaces `current`, so a failed or timed-out
//! run leaves the previous report in place.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use trustgrid_core::{CanonicalRecord, TriggerRequest, TrustabilityReport};

use crate::error::RunError;
use crate::pipeline::{CompletedRun, Pipeline};
use crate::response::ErrorBody;

/// Records served inline with a report.
pub const DEFAULT_PREVIEW_LIMIT: usize = 100;

pub struct ReportSlot {
    run_lock: Mutex<()>,
    current: RwLock<Option<Arc<CompletedRun>>>,
    preview_limit: usize,
}

impl Default for ReportSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSlot {
    pub fn new() -> Self {
        Self {
            run_lock: Mutex::new(()),
            current: RwLock::new(None),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit
    }

    /// Run `req` and, on success, make it the current result.
    ///
    /// Blocks while another run holds the slot.
    pub fn trigger(&self, pipeline: &Pipeline, req: &TriggerRequest) -> Result<Arc<CompletedRun>, RunError> {
        let _running = self.run_lock.lock();
        let run = Arc::new(pipeline.run(req)?);
        *self.current.write() = Some(Arc::clone(&run));
        Ok(run)
    }

    /// True while a run holds the slot.
    pub fn is_running(&self) -> bool {
        self.run_lock.is_locked()
    }

    pub fn current(&self) -> Option<Arc<CompletedRun>> {
        self.current.read().clone()
    }

    /// Last successful report, or an error body when there is none.
    pub fn retrieve(&self) -> Result<TrustabilityReport, ErrorBody> {
        self.current()
            .map(|run| run.report().clone())
            .ok_or_else(ErrorBody::no_report)
    }

    /// First records of the current result.
    pub fn preview(&self) -> Vec<CanonicalRecord> {
        self.current()
            .map(|run| run.preview(self.preview_limit).to_vec())
            .unwrap_or_default()
    }
}
