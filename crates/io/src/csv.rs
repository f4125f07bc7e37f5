// CSV/TSV upload adapter

use std::collections::BTreeMap;

use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::sniff::Signature;
use crate::upload;

pub struct CsvAdapter;

impl SourceAdapter for CsvAdapter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["csv", "tsv", "txt"], &[Signature::Text])?;

        let content = decode_text(&file.bytes);
        let delimiter = if file.extension() == "tsv" {
            b'\t'
        } else {
            sniff_delimiter(&content)
        };
        let items = parse_delimited(&content, delimiter)?;
        tracing::info!(file = %file.name, rows = items.len(), delimiter = %(delimiter as char).escape_default(), "parsed delimited file");

        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "text/csv"),
            items,
        })
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub(crate) fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Consistent lines times field count; wider wins ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Decode bytes to UTF-8, falling back to Windows-1252 (common for
/// Excel-exported CSVs). A UTF-8 BOM is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Header-first delimited text into raw items.
///
/// Short rows are padded with nulls. A row carrying more non-empty cells
/// than the header has columns is structural damage and fails the file.
pub fn parse_delimited(content: &str, delimiter: u8) -> Result<Vec<RawItem>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = loop {
        match records.next() {
            Some(Ok(rec)) if rec.iter().all(|c| c.trim().is_empty()) => continue,
            Some(Ok(rec)) => break header_names(rec.iter()),
            Some(Err(e)) => return Err(IngestError::ParseFailure(format!("header row: {}", e))),
            None => return Err(IngestError::ParseFailure("no header row".into())),
        }
    };

    let mut items = Vec::new();
    for result in records {
        let rec = result.map_err(|e| IngestError::ParseFailure(e.to_string()))?;
        if rec.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if rec.len() > header.len() && rec.iter().skip(header.len()).any(|c| !c.trim().is_empty()) {
            let line = rec.position().map(|p| p.line()).unwrap_or(0);
            return Err(IngestError::ParseFailure(format!(
                "line {}: {} fields but header has {}",
                line,
                rec.len(),
                header.len()
            )));
        }
        let fields: BTreeMap<String, FieldValue> = header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let cell = rec.get(i).map(|c| FieldValue::from_cell(c.trim())).unwrap_or(FieldValue::Null);
                (name.clone(), cell)
            })
            .collect();
        items.push(RawItem::new(fields));
    }
    Ok(items)
}

/// Trimmed header names; blanks become `col_<n>`, repeats get `_2`, `_3`, ...
pub(crate) fn header_names<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (i, cell) in cells.enumerate() {
        let base = match cell.trim() {
            "" => format!("col_{}", i + 1),
            s => s.to_string(),
        };
        let mut name = base.clone();
        let mut n = 2;
        while out.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        out.push(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use trustgrid_core::{FixedClock, RunBudget, SourceType, UploadedFile};

    fn run(name: &str, bytes: &[u8]) -> Result<RawBatch, IngestError> {
        let clock = FixedClock(chrono::Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        let ctx = RunContext::new(&clock, RunBudget::new(std::time::Duration::from_secs(5)));
        let req = TriggerRequest::new(SourceType::CsvUpload)
            .with_file(UploadedFile::new(name, bytes.to_vec()));
        CsvAdapter.ingest(&req, &ctx)
    }

    #[test]
    fn sniff_semicolon_and_tab() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(sniff_delimiter("a,b\n1,2\n"), b',');
        assert_eq!(sniff_delimiter("single\n"), b',');
    }

    #[test]
    fn windows_1252_fallback() {
        // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte
        assert_eq!(decode_text(b"caf\xE9"), "café");
        assert_eq!(decode_text(b"\xEF\xBB\xBFid"), "id");
    }

    #[test]
    fn short_rows_pad_with_null() {
        let items = parse_delimited("address,price,date\n1 Main St,100\n", b',').unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields["date"], FieldValue::Null);
        assert_eq!(items[0].fields["price"], FieldValue::text("100"));
    }

    #[test]
    fn long_rows_fail_the_file() {
        let err = parse_delimited("a,b\n1,2,3\n", b',').unwrap_err();
        assert_eq!(err.category(), "parse_failure");
    }

    #[test]
    fn trailing_empty_cells_are_tolerated() {
        let items = parse_delimited("a,b\n1,2,,\n", b',').unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn duplicate_and_blank_headers() {
        let names = header_names(["id", "", "id", " name "].into_iter());
        assert_eq!(names, vec!["id", "col_2", "id_2", "name"]);
    }

    #[test]
    fn header_only_is_zero_items() {
        let batch = run("empty.csv", b"address,price\n").unwrap();
        assert!(batch.items.is_empty());
    }

    #[test]
    fn adapter_rejects_binary_and_wrong_extension() {
        assert_eq!(run("a.csv", b"PK\x03\x04zzz").unwrap_err().category(), "unsupported_format");
        assert_eq!(run("a.png", b"a,b\n1,2\n").unwrap_err().category(), "unsupported_format");
        assert_eq!(run("a.csv", b"").unwrap_err().category(), "parse_failure");
    }

    #[test]
    fn adapter_captures_bytes() {
        let batch = run("listings.csv", b"address,price\n1 Main St,100\n").unwrap();
        assert_eq!(batch.capture.origin(), "listings.csv");
        assert_eq!(batch.capture.content(), b"address,price\n1 Main St,100\n");
        assert_eq!(batch.items.len(), 1);
    }
}
