// Universal upload adapter: route by content, then sense structure in text

use std::collections::BTreeMap;

use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::csv::{decode_text, parse_delimited};
use crate::html::{records_from_html, HtmlLimits};
use crate::sniff::{sniff, zip_kind, Signature, ZipKind};
use crate::text::key_value;
use crate::{docx, json, media, parquet, pdf, upload, xlsx, xml};

/// Text head inspected by the delimiter and key/value heuristics.
const SENSE_WINDOW: usize = 2048;
/// A delimiter must occur more often than this in the head to count.
const DELIMITER_MIN_COUNT: usize = 10;
const KV_MIN_PAIRS: usize = 3;

pub struct UniversalAdapter {
    pub html: HtmlLimits,
}

impl Default for UniversalAdapter {
    fn default() -> Self {
        Self {
            html: HtmlLimits::default(),
        }
    }
}

impl SourceAdapter for UniversalAdapter {
    fn name(&self) -> &'static str {
        "universal"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        let (format, items) = sense(&file.bytes, &file.name, self.html)?;
        tracing::info!(file = %file.name, format, records = items.len(), "sensed upload");

        let items = items
            .into_iter()
            .map(|item| item.with("sensed_format", FieldValue::text(format)))
            .collect();
        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "application/octet-stream"),
            items,
        })
    }
}

/// Pick a reader from the content signature. Returns the label of the
/// detected format with the records.
pub fn sense(
    bytes: &[u8],
    filename: &str,
    html: HtmlLimits,
) -> Result<(&'static str, Vec<RawItem>), IngestError> {
    let signature = sniff(bytes);
    tracing::debug!(file = filename, signature = ?signature, "universal sniff");

    match signature {
        Signature::Empty => Err(IngestError::ParseFailure(format!("'{}' is empty", filename))),
        Signature::Binary => Err(IngestError::UnsupportedFormat(format!(
            "'{}': unrecognized binary content",
            filename
        ))),
        Signature::Zip => match zip_kind(bytes) {
            Some(ZipKind::Docx) => Ok(("Word Document", docx::read_docx(bytes)?)),
            Some(ZipKind::Xlsx) => Ok(("Spreadsheet", xlsx::read_first_sheet(bytes)?)),
            Some(ZipKind::Archive) => Ok(("Multimedia Archive", media::scan_archive(bytes)?)),
            None => Err(IngestError::ParseFailure(format!("'{}': unreadable ZIP archive", filename))),
        },
        Signature::Ole => Ok(("Spreadsheet", xlsx::read_first_sheet(bytes)?)),
        Signature::Pdf => Ok(("PDF Document", pdf::read_pdf(bytes)?)),
        Signature::Parquet => Ok(("Parquet", parquet::read_rows(bytes)?)),
        Signature::Json => {
            let text = decode_text(bytes);
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(doc) => Ok(("JSON", json::items_from_json(&doc))),
                Err(e) => {
                    tracing::debug!(error = %e, "JSON-looking upload did not parse; sensing as text");
                    Ok(sense_text(&text, filename))
                }
            }
        }
        Signature::Html => Ok(("HTML", records_from_html(&decode_text(bytes), html))),
        Signature::Xml => {
            let text = decode_text(bytes);
            match xml::parse_records(&text) {
                Ok(items) => Ok(("XML", items)),
                Err(e) => {
                    tracing::debug!(error = %e, "XML-looking upload did not parse; sensing as text");
                    Ok(sense_text(&text, filename))
                }
            }
        }
        Signature::Text => Ok(sense_text(&decode_text(bytes), filename)),
    }
}

/// Delimited table, then `key: value` pairs (one record), then text blocks.
pub fn sense_text(text: &str, filename: &str) -> (&'static str, Vec<RawItem>) {
    let head: String = text.chars().take(SENSE_WINDOW).collect();

    if let Some(delim) = frequent_delimiter(&head) {
        match parse_delimited(text, delim) {
            Ok(items) if !items.is_empty() => return ("Delimited Table", items),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "delimited sensing rejected"),
        }
    }

    let pairs: BTreeMap<String, FieldValue> = head
        .lines()
        .filter_map(key_value)
        .map(|(k, v)| (k.to_lowercase(), FieldValue::from_cell(&v)))
        .collect();
    if pairs.len() >= KV_MIN_PAIRS {
        let item = RawItem::new(pairs).with("filename", FieldValue::text(filename));
        return ("Key-Value Pairs", vec![item]);
    }

    let body = text.trim();
    let blocks: Vec<String> = if body.contains("\n\n") || body.contains("\r\n\r\n") {
        body.replace("\r\n", "\n")
            .split("\n\n")
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect()
    } else {
        body.lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    };
    let items = blocks
        .into_iter()
        .map(|block| {
            RawItem::from_pairs([
                ("raw_content", FieldValue::Text(block)),
                ("filename", FieldValue::text(filename)),
            ])
        })
        .collect();
    ("Unstructured Text Blocks", items)
}

fn frequent_delimiter(head: &str) -> Option<u8> {
    [b',', b';', b'|', b'\t']
        .into_iter()
        .find(|&d| head.bytes().filter(|&b| b == d).count() > DELIMITER_MIN_COUNT)
}
