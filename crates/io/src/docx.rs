// DOCX upload adapter

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::csv::header_names;
use crate::sniff::Signature;
use crate::text::key_value;
use crate::upload;

pub struct DocxAdapter;

impl SourceAdapter for DocxAdapter {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["docx"], &[Signature::Zip])?;
        let items = read_docx(&file.bytes)?;
        tracing::info!(file = %file.name, records = items.len(), "parsed DOCX document");

        Ok(RawBatch {
            capture: upload::capture(
                req,
                ctx,
                file,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
            items,
        })
    }
}

pub fn read_docx(bytes: &[u8]) -> Result<Vec<RawItem>, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::ParseFailure(format!("not a readable DOCX container: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| IngestError::ParseFailure("DOCX has no word/document.xml".into()))?
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::ParseFailure(format!("word/document.xml: {}", e)))?;

    let body = parse_body(&xml)?;
    Ok(records_from_body(&body))
}

/// Paragraph text outside tables, plus each table as rows of cell text.
#[derive(Debug, Default, PartialEq)]
struct DocBody {
    paragraphs: Vec<String>,
    tables: Vec<Vec<Vec<String>>>,
}

fn parse_body(xml: &str) -> Result<DocBody, IngestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut body = DocBody::default();
    let mut table_depth = 0usize;
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut para = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table.clear();
                    }
                }
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                b"p" => para.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => para.push('\t'),
                b"br" => para.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                para.push_str(&e.decode().unwrap_or_default());
            }
            Ok(Event::GeneralRef(ref e)) if in_text => {
                let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                para.push_str(match name.as_str() {
                    "amp" => "&",
                    "lt" => "<",
                    "gt" => ">",
                    "quot" => "\"",
                    "apos" => "'",
                    _ => "",
                });
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = para.trim().to_string();
                    if table_depth > 0 {
                        if !text.is_empty() {
                            if !cell.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(&text);
                        }
                    } else if !text.is_empty() {
                        body.paragraphs.push(text);
                    }
                    para.clear();
                }
                b"tc" if table_depth == 1 => row.push(std::mem::take(&mut cell)),
                b"tr" if table_depth == 1 => table.push(std::mem::take(&mut row)),
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        body.tables.push(std::mem::take(&mut table));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::ParseFailure(format!(
                    "word/document.xml at byte {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(body)
}

/// Tables first (first row is the header), then all `Label: Value`
/// paragraphs as one record. A document with neither becomes one full-text
/// record.
fn records_from_body(body: &DocBody) -> Vec<RawItem> {
    let mut items = Vec::new();

    for table in &body.tables {
        if table.len() < 2 {
            continue;
        }
        let header = header_names(table[0].iter().map(|s| s.as_str()));
        for row in &table[1..] {
            if row.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let fields: BTreeMap<String, FieldValue> = header
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let v = row.get(i).map(|c| FieldValue::from_cell(c)).unwrap_or(FieldValue::Null);
                    (h.clone(), v)
                })
                .collect();
            items.push(RawItem::new(fields));
        }
    }

    let pairs: BTreeMap<String, FieldValue> = body
        .paragraphs
        .iter()
        .filter_map(|p| key_value(p))
        .map(|(k, v)| (k, FieldValue::from_cell(&v)))
        .collect();
    if !pairs.is_empty() {
        items.push(RawItem::new(pairs));
    }

    if items.is_empty() && !body.paragraphs.is_empty() {
        items.push(RawItem::from_pairs([(
            "content",
            FieldValue::text(body.paragraphs.join("\n")),
        )]));
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn docx(body: &str) -> Vec<u8> {
        let xml = format!(r#"<?xml version="1.0"?><w:document {NS}><w:body>{body}</w:body></w:document>"#);
        let mut buf = Cursor::new(Vec::new());
        let mut zw = zip::ZipWriter::new(&mut buf);
        zw.start_file("word/document.xml", SimpleFileOptions::default()).unwrap();
        zw.write_all(xml.as_bytes()).unwrap();
        zw.finish().unwrap();
        buf.into_inner()
    }

    fn p(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    fn tc(text: &str) -> String {
        format!("<w:tc>{}</w:tc>", p(text))
    }

    #[test]
    fn table_rows_and_pairs() {
        let table = format!(
            "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
            tc("Address"),
            tc("Price"),
            tc("12 Oak St"),
            tc("250000"),
            tc(""),
            tc(""),
        );
        let body = format!("{}{}{}", p("Agent: J. Smith"), table, p("Office: Downtown"));
        let items = read_docx(&docx(&body)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].fields["Address"], FieldValue::text("12 Oak St"));
        assert_eq!(items[1].fields["Agent"], FieldValue::text("J. Smith"));
        assert_eq!(items[1].fields["Office"], FieldValue::text("Downtown"));
    }

    #[test]
    fn plain_text_fallback() {
        let body = format!("{}{}", p("First paragraph."), p("Smith &amp; Sons"));
        let items = read_docx(&docx(&body)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].fields["content"],
            FieldValue::text("First paragraph.\nSmith & Sons")
        );
    }

    #[test]
    fn empty_document_has_no_records() {
        assert!(read_docx(&docx("")).unwrap().is_empty());
    }

    #[test]
    fn missing_document_part_fails() {
        let mut buf = Cursor::new(Vec::new());
        let mut zw = zip::ZipWriter::new(&mut buf);
        zw.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zw.write_all(b"hi").unwrap();
        zw.finish().unwrap();
        let err = read_docx(&buf.into_inner()).unwrap_err();
        assert_eq!(err.category(), "parse_failure");
    }
}
