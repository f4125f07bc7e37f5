// PDF upload adapter (text layer via poppler's pdftotext)

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::sniff::Signature;
use crate::text::{find_tables, key_value};
use crate::upload;

pub struct PdfAdapter;

impl SourceAdapter for PdfAdapter {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["pdf"], &[Signature::Pdf])?;
        let items = read_pdf(&file.bytes)?;
        tracing::info!(file = %file.name, records = items.len(), "parsed PDF text layer");

        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "application/pdf"),
            items,
        })
    }
}

/// Stage the bytes in a temp file and read its text layer.
pub fn read_pdf(bytes: &[u8]) -> Result<Vec<RawItem>, IngestError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| IngestError::ParseFailure(format!("cannot stage PDF: {}", e)))?;
    tmp.write_all(bytes)
        .map_err(|e| IngestError::ParseFailure(format!("cannot stage PDF: {}", e)))?;

    let text = run_pdftotext(tmp.path())?;
    Ok(records_from_pdf_text(&text))
}

/// Run `pdftotext -layout <file> -` and capture stdout.
fn run_pdftotext(file: &Path) -> Result<String, IngestError> {
    which::which("pdftotext").map_err(|_| {
        IngestError::ParseFailure(
            "pdftotext not installed (poppler-utils); cannot read PDF text".to_string(),
        )
    })?;

    let file_str = file
        .to_str()
        .ok_or_else(|| IngestError::ParseFailure(format!("invalid file path: {}", file.display())))?;

    let output = Command::new("pdftotext")
        .args(["-layout", file_str, "-"])
        .output()
        .map_err(|e| IngestError::ParseFailure(format!("failed to run pdftotext: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(IngestError::ParseFailure(format!(
            "pdftotext failed (exit {}): {}",
            output.status.code().unwrap_or(-1),
            stderr.trim(),
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).to_string();

    if text.trim().is_empty() {
        return Err(IngestError::ParseFailure(
            "PDF appears scanned/image-only, text extraction failed".into(),
        ));
    }

    Ok(text)
}

/// Records from `pdftotext -layout` output. Pages are separated by form
/// feeds. Per page: aligned tables give one record per row, `Label: Value`
/// lines give one record for the page, and a page with neither falls back
/// to one record per text line.
pub fn records_from_pdf_text(text: &str) -> Vec<RawItem> {
    let mut items = Vec::new();

    for (page_idx, page) in text.split('\x0c').enumerate() {
        let page_no = FieldValue::Int(page_idx as i64 + 1);
        let lines: Vec<&str> = page.lines().collect();
        let tables = find_tables(&lines);

        for table in &tables {
            for fields in table.records() {
                if fields.values().all(FieldValue::is_missing) {
                    continue;
                }
                items.push(RawItem::new(fields).with("page", page_no.clone()));
            }
        }

        let in_table: Vec<usize> = tables.iter().flat_map(|t| t.lines.iter().copied()).collect();
        let pairs: BTreeMap<String, FieldValue> = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| !in_table.contains(i))
            .filter_map(|(_, line)| key_value(line))
            .map(|(k, v)| (k, FieldValue::from_cell(&v)))
            .collect();
        let has_pairs = !pairs.is_empty();
        if has_pairs {
            items.push(RawItem::new(pairs).with("page", page_no.clone()));
        }

        if tables.is_empty() && !has_pairs {
            let content = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
            for (line_idx, line) in content.enumerate() {
                items.push(RawItem::from_pairs([
                    ("content", FieldValue::text(line)),
                    ("page_number", page_no.clone()),
                    ("line_number", FieldValue::Int(line_idx as i64 + 1)),
                ]));
            }
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_and_pairs_per_page() {
        let text = "Listing Report\n\
                    Address        Price      Listed\n\
                    12 Oak St      250000     2026-01-04\n\
                    9 Elm Ave      199000     2026-01-09\n\
                    \n\
                    Agent: J. Smith\n\
                    Office: Downtown\n\
                    \x0cNotes page\nnothing structured here\n";
        let items = records_from_pdf_text(text);
        // 2 table rows + 1 KV record on page 1, 2 line records on page 2
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].fields["Address"], FieldValue::text("12 Oak St"));
        assert_eq!(items[0].fields["page"], FieldValue::Int(1));
        assert_eq!(items[2].fields["Agent"], FieldValue::text("J. Smith"));
        assert_eq!(items[2].fields["Office"], FieldValue::text("Downtown"));
        assert_eq!(items[3].fields["content"], FieldValue::text("Notes page"));
        assert_eq!(items[4].fields["page_number"], FieldValue::Int(2));
        assert_eq!(items[4].fields["line_number"], FieldValue::Int(2));
    }

    #[test]
    fn blank_trailing_page_adds_nothing() {
        let items = records_from_pdf_text("Only line\n\x0c\n");
        assert_eq!(items.len(), 1);
    }
}
