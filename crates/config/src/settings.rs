// Pipeline settings
// Loaded from ~/.config/trustgrid/pipeline.toml, or an explicit --config path

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use trustgrid_core::{Dimension, SourceType};

use crate::error::ConfigError;
use crate::schema::{SchemaConfig, SourceSchema};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub schema: SchemaConfig,
    /// Keyed by source type label (`csv_upload`, `api`, ...). Sources not
    /// listed use [`SourceSchema::default_for`].
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSchema>,
    #[serde(default)]
    pub plausibility: PlausibilityConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

// ---------------------------------------------------------------------------
// Plausibility
// ---------------------------------------------------------------------------

/// Reference ranges used by the accuracy dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityConfig {
    /// Values must be strictly greater than this.
    pub value_min: f64,
    pub value_max: Option<f64>,
    pub date_min: NaiveDate,
    /// Absolute z-score above which a value counts as an outlier.
    pub outlier_z: f64,
    /// Outlier test only runs with at least this many numeric values.
    pub outlier_min_sample: usize,
}

impl Default for PlausibilityConfig {
    fn default() -> Self {
        Self {
            value_min: 0.0,
            value_max: None,
            date_min: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default(),
            outlier_z: 3.0,
            outlier_min_sample: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Per-dimension weights for the overall score. Equal by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub completeness: f64,
    pub accuracy: f64,
    pub validity: f64,
    pub consistency: f64,
    pub uniqueness: f64,
    pub integrity: f64,
    pub lineage: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            completeness: 1.0,
            accuracy: 1.0,
            validity: 1.0,
            consistency: 1.0,
            uniqueness: 1.0,
            integrity: 1.0,
            lineage: 1.0,
        }
    }
}

impl ScoringConfig {
    pub fn weight(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Completeness => self.completeness,
            Dimension::Accuracy => self.accuracy,
            Dimension::Validity => self.validity,
            Dimension::Consistency => self.consistency,
            Dimension::Uniqueness => self.uniqueness,
            Dimension::Integrity => self.integrity,
            Dimension::Lineage => self.lineage,
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch + Scrape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub request_timeout_secs: u64,
    /// Wall-clock budget for all network work of one run.
    pub run_budget_secs: u64,
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub start_param: String,
    pub end_param: String,
    /// Cap on records kept when no date range is given.
    pub baseline_limit: Option<usize>,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            run_budget_secs: 60,
            max_retries: 3,
            backoff_secs: 1,
            start_param: "start_date".into(),
            end_param: "end_date".into(),
            baseline_limit: None,
            user_agent: concat!("trustgrid/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub max_records: usize,
    /// Lists shorter than this are ignored by the list fallback.
    pub min_list_items: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_records: 100,
            min_list_items: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Load + Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Default config file location.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trustgrid")
            .join("pipeline.toml")
    }

    /// Explicit path, else the default location if it exists, else built-ins.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::config_path();
                if !p.exists() {
                    tracing::debug!(path = %p.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                p
            }
        };
        let text = fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Effective schema for a source kind.
    pub fn schema_for(&self, source_type: SourceType) -> SourceSchema {
        self.sources
            .get(source_type.as_str())
            .cloned()
            .unwrap_or_else(|| SourceSchema::default_for(source_type))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema.check()?;

        for (name, schema) in &self.sources {
            let parsed: SourceType = name
                .parse()
                .map_err(|e: String| ConfigError::Validation(format!("sources.{name}: {e}")))?;
            if parsed.as_str() != name {
                return Err(ConfigError::Validation(format!(
                    "sources.{name}: use the canonical label '{}'",
                    parsed.as_str()
                )));
            }
            schema.check(name)?;
        }

        let p = &self.plausibility;
        if !p.value_min.is_finite() {
            return Err(ConfigError::Validation(
                "plausibility.value_min must be finite".into(),
            ));
        }
        if let Some(max) = p.value_max {
            if !max.is_finite() || max < p.value_min {
                return Err(ConfigError::Validation(format!(
                    "plausibility.value_max ({max}) must be finite and >= value_min ({})",
                    p.value_min
                )));
            }
        }
        if !(p.outlier_z.is_finite() && p.outlier_z > 0.0) {
            return Err(ConfigError::Validation(
                "plausibility.outlier_z must be a positive number".into(),
            ));
        }

        let mut total = 0.0;
        for d in Dimension::ALL {
            let w = self.scoring.weight(d);
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "scoring.{}: weight must be finite and non-negative, got {w}",
                    d.as_str().to_ascii_lowercase()
                )));
            }
            total += w;
        }
        if total <= 0.0 {
            return Err(ConfigError::Validation(
                "scoring: at least one weight must be positive".into(),
            ));
        }

        let f = &self.fetch;
        if f.request_timeout_secs == 0 || f.run_budget_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch: timeouts must be positive".into(),
            ));
        }
        if f.run_budget_secs < f.request_timeout_secs {
            return Err(ConfigError::Validation(format!(
                "fetch.run_budget_secs ({}) must be >= request_timeout_secs ({})",
                f.run_budget_secs, f.request_timeout_secs
            )));
        }
        if f.start_param.trim().is_empty() || f.end_param.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fetch: date parameter names must be non-empty".into(),
            ));
        }

        if self.scrape.max_records == 0 {
            return Err(ConfigError::Validation(
                "scrape.max_records must be positive".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CoreField;

    const CUSTOM: &str = r#"
[schema]
required = ["identity", "value"]
identity_key = ["identity", "date"]

[[schema.related_dates]]
earlier = "listed_date"
later = "sold_date"

[sources.csv_upload]
schema = "tabular"
identity = ["street", "address"]
address = ["street", "address"]
value = ["asking_price"]
date = ["listed"]

[sources.zip_upload]
schema = "multimedia"

[plausibility]
value_min = 1000.0
value_max = 50000000.0

[scoring]
completeness = 2.0
lineage = 0.5

[fetch]
request_timeout_secs = 5
run_budget_secs = 30
baseline_limit = 15
"#;

    #[test]
    fn empty_document_is_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.schema.required, CoreField::ALL.to_vec());
        assert_eq!(config.fetch.run_budget(), Duration::from_secs(60));
    }

    #[test]
    fn parse_custom() {
        let config = PipelineConfig::from_toml(CUSTOM).unwrap();
        assert_eq!(config.schema.required, vec![CoreField::Identity, CoreField::Value]);
        assert_eq!(config.schema.related_dates.len(), 1);
        match config.schema_for(SourceType::CsvUpload) {
            SourceSchema::Tabular(t) => assert_eq!(t.value, vec!["asking_price".to_string()]),
            other => panic!("expected tabular, got {:?}", other),
        }
        assert!(config.schema_for(SourceType::ZipUpload).is_multimedia());
        assert_eq!(config.scoring.weight(Dimension::Completeness), 2.0);
        assert_eq!(config.scoring.weight(Dimension::Accuracy), 1.0);
        assert_eq!(config.fetch.baseline_limit, Some(15));
    }

    #[test]
    fn unlisted_source_falls_back_to_builtin() {
        let config = PipelineConfig::default();
        match config.schema_for(SourceType::JsonUpload) {
            SourceSchema::Tabular(t) => assert!(t.identity.contains(&"address".to_string())),
            other => panic!("expected tabular, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_schema_tag() {
        let err = PipelineConfig::from_toml("[sources.csv_upload]\nschema = \"graph\"\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_unknown_source_key() {
        let err = PipelineConfig::from_toml("[sources.ftp]\nschema = \"multimedia\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown source type 'ftp'"));
    }

    #[test]
    fn rejects_legacy_source_key() {
        let err = PipelineConfig::from_toml("[sources.upload]\nschema = \"multimedia\"\n").unwrap_err();
        assert!(err.to_string().contains("csv_upload"));
    }

    #[test]
    fn rejects_alias_conflict() {
        let input = r#"
[sources.json_upload]
schema = "tabular"
identity = ["id", "total"]
value = ["total"]
"#;
        let err = PipelineConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("'total'"));
    }

    #[test]
    fn rejects_all_zero_weights() {
        let input = r#"
[scoring]
completeness = 0.0
accuracy = 0.0
validity = 0.0
consistency = 0.0
uniqueness = 0.0
integrity = 0.0
lineage = 0.0
"#;
        let err = PipelineConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("at least one weight"));
    }

    #[test]
    fn rejects_inverted_value_range() {
        let input = "[plausibility]\nvalue_min = 10.0\nvalue_max = 5.0\n";
        assert!(PipelineConfig::from_toml(input).is_err());
    }

    #[test]
    fn rejects_budget_below_request_timeout() {
        let input = "[fetch]\nrequest_timeout_secs = 20\nrun_budget_secs = 10\n";
        let err = PipelineConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("run_budget_secs"));
    }

    #[test]
    fn toml_output_reparses() {
        let config = PipelineConfig::from_toml(CUSTOM).unwrap();
        let text = config.to_toml().unwrap();
        let again = PipelineConfig::from_toml(&text).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn load_reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, CUSTOM).unwrap();
        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.fetch.request_timeout_secs, 5);

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            PipelineConfig::load(Some(&missing)),
            Err(ConfigError::Io(_))
        ));
    }
}
