// JSON upload adapter + record discovery shared with the API adapter

use serde_json::Value;
use trustgrid_core::value::flatten_json;
use trustgrid_core::{IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest};

use crate::csv::decode_text;
use crate::sniff::Signature;
use crate::upload;

/// Keys under which APIs commonly nest their record list, in lookup order.
pub const RECORD_KEYS: [&str; 7] = [
    "data", "properties", "results", "items", "records", "features", "works",
];

pub struct JsonAdapter;

impl SourceAdapter for JsonAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["json"], &[Signature::Json])?;

        let text = decode_text(&file.bytes);
        let doc: Value = serde_json::from_str(&text)
            .map_err(|e| IngestError::ParseFailure(format!("'{}': {}", file.name, e)))?;
        let items = items_from_json(&doc);
        tracing::info!(file = %file.name, records = items.len(), "parsed JSON upload");

        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "application/json"),
            items,
        })
    }
}

/// Locate the record list inside a JSON document.
///
/// A top-level array is the list. Otherwise the first array found under one
/// of [`RECORD_KEYS`] (one level of nesting is followed, e.g.
/// `{"data": {"items": [...]}}`). Failing that, the object itself is one
/// record.
pub fn discover_records(doc: &Value) -> Vec<&Value> {
    match doc {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            for key in RECORD_KEYS {
                match map.get(key) {
                    Some(Value::Array(items)) => return items.iter().collect(),
                    Some(inner @ Value::Object(_)) => {
                        if let Some(found) = nested_list(inner) {
                            return found;
                        }
                    }
                    _ => {}
                }
            }
            vec![doc]
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn nested_list(inner: &Value) -> Option<Vec<&Value>> {
    let map = inner.as_object()?;
    RECORD_KEYS.iter().find_map(|k| match map.get(*k) {
        Some(Value::Array(items)) => Some(items.iter().collect()),
        _ => None,
    })
}

/// Discovered records, flattened.
pub fn items_from_json(doc: &Value) -> Vec<RawItem> {
    discover_records(doc)
        .into_iter()
        .map(|rec| RawItem::new(flatten_json(rec)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trustgrid_core::FieldValue;

    #[test]
    fn top_level_array() {
        let doc = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(discover_records(&doc).len(), 2);
    }

    #[test]
    fn wrapped_under_known_key() {
        let doc = json!({"meta": {"page": 1}, "results": [{"id": 1}, {"id": 2}, {"id": 3}]});
        assert_eq!(discover_records(&doc).len(), 3);
    }

    #[test]
    fn key_priority_is_fixed() {
        let doc = json!({"items": [{"a": 1}], "data": [{"b": 1}, {"b": 2}]});
        let recs = discover_records(&doc);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].get("b").is_some());
    }

    #[test]
    fn one_level_nesting() {
        let doc = json!({"data": {"items": [{"a": 1}, {"a": 2}]}});
        assert_eq!(discover_records(&doc).len(), 2);
    }

    #[test]
    fn bare_object_is_one_record() {
        let doc = json!({"address": "1 Main St", "price": {"amount": 5}});
        let items = items_from_json(&doc);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields["price_amount"], FieldValue::Int(5));
    }

    #[test]
    fn scalar_elements_wrap_as_value() {
        let items = items_from_json(&json!(["a", "b"]));
        assert_eq!(items[1].fields["value"], FieldValue::text("b"));
    }

    #[test]
    fn empty_list_is_zero_items() {
        assert!(items_from_json(&json!({"data": []})).is_empty());
    }
}
