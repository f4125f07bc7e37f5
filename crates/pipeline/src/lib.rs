//! `trustgrid-pipeline` — runs a trigger request end to end.
//!
//! [`Pipeline::run`] dispatches the request to the adapter for its source
//! kind and hands the batch to the engine. [`ReportSlot`] holds the latest
//! successful run and serializes writers.

pub mod error;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod slot;

pub use error::RunError;
pub use pipeline::{CompletedRun, Pipeline};
pub use registry::adapter_for;
pub use response::{ErrorBody, RawData, TriggerResponse};
pub use slot::{ReportSlot, DEFAULT_PREVIEW_LIMIT};
