//! Pipeline configuration.
//!
//! One TOML document drives the whole pipeline: which raw keys map onto the
//! core fields for each source kind, which fields are required, plausibility
//! ranges, scoring weights and network budgets. Everything is checked at load
//! time so a run never starts with a contradictory alias table.

pub mod error;
pub mod schema;
pub mod settings;

pub use error::ConfigError;
pub use schema::{
    normalize_key, AliasTable, CoreField, DatePair, Reference, SchemaConfig, SourceSchema,
};
pub use settings::{FetchConfig, PipelineConfig, PlausibilityConfig, ScoringConfig, ScrapeConfig};
