// XML upload adapter
//
// Children of the document root are records. Nested elements flatten into
// `parent_child` keys; attributes become fields named after the attribute.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::csv::decode_text;
use crate::sniff::Signature;
use crate::upload;

pub struct XmlAdapter;

impl SourceAdapter for XmlAdapter {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["xml"], &[Signature::Xml])?;
        let items = parse_records(&decode_text(&file.bytes))?;
        tracing::info!(file = %file.name, records = items.len(), "parsed XML upload");

        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "application/xml"),
            items,
        })
    }
}

pub fn parse_records(text: &str) -> Result<Vec<RawItem>, IngestError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    // Element names from the root down
    let mut path: Vec<String> = Vec::new();
    // Parallel to `path`: whether the element has child elements
    let mut has_children: Vec<bool> = Vec::new();
    let mut record: BTreeMap<String, FieldValue> = BTreeMap::new();
    let mut text_acc = String::new();
    let mut saw_root = false;
    let mut items = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                if path.is_empty() {
                    saw_root = true;
                } else if path.len() == 1 {
                    record.clear();
                    add_attributes(&mut record, None, e);
                } else {
                    let key = field_key(&path[2..], &name);
                    add_attributes(&mut record, Some(&key), e);
                }
                if let Some(parent) = has_children.last_mut() {
                    *parent = true;
                }
                path.push(name);
                has_children.push(false);
                text_acc.clear();
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                if let Some(parent) = has_children.last_mut() {
                    *parent = true;
                }
                match path.len() {
                    0 => saw_root = true,
                    1 => {
                        let mut fields = BTreeMap::new();
                        add_attributes(&mut fields, None, e);
                        items.push(RawItem::new(fields));
                    }
                    _ => {
                        let key = field_key(&path[2..], &name);
                        add_attributes(&mut record, Some(&key), e);
                        record.entry(key).or_insert(FieldValue::Null);
                    }
                }
            }
            Ok(Event::Text(ref e)) if path.len() >= 2 => {
                text_acc.push_str(&e.decode().unwrap_or_default());
            }
            Ok(Event::CData(ref e)) if path.len() >= 2 => {
                text_acc.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(ref e)) if path.len() >= 2 => {
                let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                match resolve_entity(&name) {
                    Some(c) => text_acc.push(c),
                    None => {
                        text_acc.push('&');
                        text_acc.push_str(&name);
                        text_acc.push(';');
                    }
                }
            }
            Ok(Event::End(_)) => {
                match path.len() {
                    0 | 1 => {}
                    2 => {
                        let leftover = text_acc.trim();
                        if record.is_empty() && !leftover.is_empty() {
                            record.insert("value".to_string(), FieldValue::text(leftover));
                        }
                        items.push(RawItem::new(std::mem::take(&mut record)));
                    }
                    _ => {
                        let key = path[2..].join("_");
                        let value = text_acc.trim();
                        if !value.is_empty() {
                            insert_unique(&mut record, key, FieldValue::text(value));
                        } else if has_children.last() == Some(&false) {
                            record.entry(key).or_insert(FieldValue::Null);
                        }
                    }
                }
                text_acc.clear();
                path.pop();
                has_children.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::ParseFailure(format!(
                    "XML error at byte {}: {}",
                    reader.error_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(IngestError::ParseFailure("XML document has no root element".into()));
    }
    if !path.is_empty() {
        return Err(IngestError::ParseFailure(format!(
            "XML document ends inside <{}>",
            path.join("/")
        )));
    }
    Ok(items)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn field_key(parents: &[String], name: &str) -> String {
    if parents.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", parents.join("_"), name)
    }
}

fn add_attributes(fields: &mut BTreeMap<String, FieldValue>, prefix: Option<&str>, e: &BytesStart<'_>) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let key = match prefix {
            Some(p) => format!("{}_{}", p, name),
            None => name,
        };
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        insert_unique(fields, key, FieldValue::from_cell(value.trim()));
    }
}

/// Repeated keys inside one record get `_2`, `_3`, ...
fn insert_unique(fields: &mut BTreeMap<String, FieldValue>, key: String, value: FieldValue) {
    if !fields.contains_key(&key) || fields.get(&key) == Some(&FieldValue::Null) {
        fields.insert(key, value);
        return;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", key, n);
        if !fields.contains_key(&candidate) {
            fields.insert(candidate, value);
            return;
        }
        n += 1;
    }
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        n if n.starts_with("#x") || n.starts_with("#X") => {
            u32::from_str_radix(&n[2..], 16).ok().and_then(char::from_u32)
        }
        n if n.starts_with('#') => n[1..].parse().ok().and_then(char::from_u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTINGS: &str = r#"<?xml version="1.0"?>
<listings>
  <listing id="L1">
    <address>12 Oak St</address>
    <price currency="USD">250000</price>
    <agent><name>Smith &amp; Co</name></agent>
  </listing>
  <listing id="L2">
    <address>9 Elm Ave</address>
    <price/>
  </listing>
  <listing id="L3"/>
</listings>"#;

    #[test]
    fn children_of_root_are_records() {
        let items = parse_records(LISTINGS).unwrap();
        assert_eq!(items.len(), 3);
        let first = &items[0].fields;
        assert_eq!(first["id"], FieldValue::text("L1"));
        assert_eq!(first["address"], FieldValue::text("12 Oak St"));
        assert_eq!(first["price"], FieldValue::text("250000"));
        assert_eq!(first["price_currency"], FieldValue::text("USD"));
        assert_eq!(first["agent_name"], FieldValue::text("Smith & Co"));
        assert_eq!(items[1].fields["price"], FieldValue::Null);
        assert!(!first.contains_key("agent"));
        assert_eq!(items[2].fields["id"], FieldValue::text("L3"));
    }

    #[test]
    fn repeated_children_get_suffixes() {
        let items = parse_records("<r><x><tag>a</tag><tag>b</tag></x></r>").unwrap();
        assert_eq!(items[0].fields["tag"], FieldValue::text("a"));
        assert_eq!(items[0].fields["tag_2"], FieldValue::text("b"));
    }

    #[test]
    fn mismatched_tags_fail() {
        let err = parse_records("<r><x><a>1</b></x></r>").unwrap_err();
        assert_eq!(err.category(), "parse_failure");
    }

    #[test]
    fn truncated_document_fails() {
        assert!(parse_records("<r><x><a>1</a>").is_err());
    }

    #[test]
    fn root_only_is_zero_records() {
        assert!(parse_records("<r/>").unwrap().is_empty());
        assert!(parse_records("<r>text only</r>").unwrap().is_empty());
    }
}
