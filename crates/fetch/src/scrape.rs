// Web scraper adapter

use trustgrid_config::{FetchConfig, ScrapeConfig};
use trustgrid_core::{
    IngestError, RawBatch, RawCapture, RunContext, SourceAdapter, SourceType, TriggerRequest,
};
use trustgrid_io::csv::decode_text;
use trustgrid_io::html::{records_from_html, HtmlLimits};
use trustgrid_io::sniff::{sniff, Signature};

use crate::client::{parse_source_url, FetchClient};

pub struct ScrapeAdapter {
    fetch: FetchConfig,
    limits: HtmlLimits,
}

impl ScrapeAdapter {
    pub fn new(fetch: FetchConfig, scrape: &ScrapeConfig) -> Self {
        Self {
            fetch,
            limits: HtmlLimits {
                max_records: scrape.max_records,
                min_list_items: scrape.min_list_items,
            },
        }
    }
}

impl SourceAdapter for ScrapeAdapter {
    fn name(&self) -> &'static str {
        "scraping"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let url = parse_source_url(req.source_url.as_deref(), "scraping")?;
        let client = FetchClient::new("scraping", &self.fetch)?;
        let fetched = client.get_with_retry(&ctx.budget, |http| {
            http.get(url.clone())
                .header("accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
        })?;

        if !is_html(fetched.content_type.as_deref(), &fetched.body) {
            return Err(IngestError::UnsupportedFormat(format!(
                "{} did not return HTML (content-type: {})",
                fetched.url,
                fetched.content_type.as_deref().unwrap_or("none")
            )));
        }

        let html = decode_text(&fetched.body);
        let items = records_from_html(&html, self.limits);
        tracing::info!(url = %fetched.url, records = items.len(), "scraped page");

        let capture = RawCapture::new(
            SourceType::Scraping,
            url.as_str(),
            ctx.now(),
            fetched.content_type.clone(),
            fetched.body,
        );
        Ok(RawBatch { capture, items })
    }
}

/// The declared content type decides; with none declared, the body is sniffed.
fn is_html(content_type: Option<&str>, body: &[u8]) -> bool {
    match content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("html")
        }
        None => sniff(body) == Signature::Html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use std::time::Duration;
    use trustgrid_core::{FieldValue, FixedClock, RunBudget};

    fn adapter() -> ScrapeAdapter {
        let fetch = FetchConfig {
            max_retries: 0,
            backoff_secs: 0,
            ..FetchConfig::default()
        };
        ScrapeAdapter::new(fetch, &ScrapeConfig::default())
    }

    fn ingest(req: &TriggerRequest) -> Result<RawBatch, IngestError> {
        let clock = FixedClock(chrono::Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        let ctx = RunContext::new(&clock, RunBudget::new(Duration::from_secs(30)));
        adapter().ingest(req, &ctx)
    }

    #[test]
    fn test_table_rows_become_records() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/records");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(
                    "<html><body><table>\
                     <tr><th>Address</th><th>Price</th></tr>\
                     <tr><td>12 Oak St</td><td>250000</td></tr>\
                     <tr><td>9 Elm Ave</td></tr>\
                     </table></body></html>",
                );
        });

        let req = TriggerRequest::new(SourceType::Scraping).with_url(server.url("/records"));
        let batch = ingest(&req).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.items[0].fields["Address"], FieldValue::text("12 Oak St"));
        // Partial row: the missing cell is null, the record survives
        assert_eq!(batch.items[1].fields["Price"], FieldValue::Null);
        assert_eq!(batch.capture.source_type(), SourceType::Scraping);
    }

    #[test]
    fn test_non_html_fails_batch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/feed");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"a\": 1}");
        });

        let req = TriggerRequest::new(SourceType::Scraping).with_url(server.url("/feed"));
        let err = ingest(&req).unwrap_err();
        assert_eq!(err.category(), "unsupported_format");
    }

    #[test]
    fn test_unreachable_host() {
        let req = TriggerRequest::new(SourceType::Scraping).with_url("http://127.0.0.1:9/");
        let err = ingest(&req).unwrap_err();
        assert_eq!(err.category(), "source_unreachable");
    }

    #[test]
    fn test_html_sniffed_without_content_type() {
        assert!(is_html(None, b"<!DOCTYPE html><html></html>"));
        assert!(!is_html(None, b"plain words"));
        assert!(is_html(Some("application/xhtml+xml"), b""));
    }
}
