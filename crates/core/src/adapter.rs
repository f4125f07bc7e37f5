use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::capture::RawBatch;
use crate::error::IngestError;
use crate::source::TriggerRequest;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for a run. Every timestamp a run writes comes from here.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Used for reproducible runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Run budget
// ---------------------------------------------------------------------------

/// Wall-clock budget shared by every network call of one run.
#[derive(Debug, Clone, Copy)]
pub struct RunBudget {
    started: Instant,
    budget: Duration,
}

impl RunBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// `Err(Timeout)` once the budget is spent.
    pub fn check(&self, what: &str) -> Result<Duration, IngestError> {
        let left = self.remaining();
        if left.is_zero() {
            return Err(IngestError::Timeout(format!(
                "{what}: run budget of {}s exhausted",
                self.budget.as_secs_f64()
            )));
        }
        Ok(left)
    }
}

// ---------------------------------------------------------------------------
// Adapter contract
// ---------------------------------------------------------------------------

/// Per-run context handed to every adapter.
pub struct RunContext<'a> {
    pub clock: &'a dyn Clock,
    pub budget: RunBudget,
}

impl<'a> RunContext<'a> {
    pub fn new(clock: &'a dyn Clock, budget: RunBudget) -> Self {
        Self { clock, budget }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Turns a trigger request into a raw capture plus its items.
///
/// An adapter either returns a batch or a categorized error. It never returns
/// `Ok` with the whole batch silently dropped: if nothing could be parsed out
/// of a monolithic input, that is a `ParseFailure`.
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_is_stable() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), at);
    }

    #[test]
    fn zero_budget_is_expired() {
        let b = RunBudget::new(Duration::ZERO);
        assert!(b.expired());
        let err = b.check("GET /data").unwrap_err();
        assert_eq!(err.category(), "timeout");
    }

    #[test]
    fn generous_budget_has_time_left() {
        let b = RunBudget::new(Duration::from_secs(3600));
        assert!(!b.expired());
        assert!(b.check("x").is_ok());
    }
}
