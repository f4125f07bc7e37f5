// Dynamic JSON API adapter

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use trustgrid_config::FetchConfig;
use trustgrid_core::value::flatten_json;
use trustgrid_core::{
    IngestError, RawBatch, RawCapture, RawItem, RunContext, SourceAdapter, SourceType,
    TriggerRequest,
};
use trustgrid_io::json::discover_records;

use crate::client::{parse_source_url, FetchClient};

/// Key fragments that mark a field as the record's date for range filtering.
const DATE_KEY_HINTS: [&str; 3] = ["date", "time", "created"];

pub struct ApiAdapter {
    config: FetchConfig,
}

impl ApiAdapter {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

impl SourceAdapter for ApiAdapter {
    fn name(&self) -> &'static str {
        "api"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let mut url = parse_source_url(req.source_url.as_deref(), "api")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(start) = req.start_date {
                query.append_pair(&self.config.start_param, &start.format("%Y-%m-%d").to_string());
            }
            if let Some(end) = req.end_date {
                query.append_pair(&self.config.end_param, &end.format("%Y-%m-%d").to_string());
            }
        }
        // query_pairs_mut leaves a bare '?' behind when nothing was appended
        if url.query() == Some("") {
            url.set_query(None);
        }

        let client = FetchClient::new("api", &self.config)?;
        let api_key = req.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
        let fetched = client.get_with_retry(&ctx.budget, |http| {
            let mut rb = http.get(url.clone()).header("accept", "application/json");
            if let Some(key) = api_key {
                rb = rb.bearer_auth(key).header("x-api-key", key);
            }
            rb
        })?;

        let text = String::from_utf8_lossy(&fetched.body);
        let doc: Value = serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
            let excerpt: String = text.trim().chars().take(200).collect();
            IngestError::ParseFailure(format!("API response is not JSON: {} (body: {})", e, excerpt))
        })?;

        let records = discover_records(&doc);
        let found = records.len();
        let records = select_records(records, req.start_date, req.end_date, self.config.baseline_limit);
        tracing::info!(url = %url, found, kept = records.len(), "API records fetched");

        let items = records.into_iter().map(|r| RawItem::new(flatten_json(r))).collect();
        let capture = RawCapture::new(
            SourceType::Api,
            url.as_str(),
            ctx.now(),
            fetched.content_type.clone(),
            fetched.body,
        );
        Ok(RawBatch { capture, items })
    }
}

/// Inclusive client-side date filter. Records without a recognizable date
/// are kept. With no range, the optional baseline limit applies instead.
pub fn select_records<'a>(
    records: Vec<&'a Value>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    baseline_limit: Option<usize>,
) -> Vec<&'a Value> {
    if start.is_none() && end.is_none() {
        let limit = baseline_limit.unwrap_or(usize::MAX);
        return records.into_iter().take(limit).collect();
    }
    records
        .into_iter()
        .filter(|r| match record_date(r) {
            Some(d) => start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e),
            None => true,
        })
        .collect()
}

/// Date of the first key that looks date-like and holds a parsable value.
fn record_date(record: &Value) -> Option<NaiveDate> {
    let obj = record.as_object()?;
    let (_, value) = obj.iter().find(|(k, _)| {
        let k = k.to_ascii_lowercase();
        DATE_KEY_HINTS.iter().any(|hint| k.contains(hint))
    })?;
    parse_loose_date(value.as_str()?)
}

fn parse_loose_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
