//! Schema Unifier: raw items into canonical records.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use trustgrid_config::{normalize_key, CoreField, SourceSchema};
use trustgrid_core::record::is_reserved_key;
use trustgrid_core::{CanonicalRecord, FieldValue, Provenance, RawBatch, RawItem};

/// Map every parsed item of `batch` onto the canonical schema.
///
/// Output order follows input order. Items with no fields at all are
/// dropped unless they carry a decode defect.
pub fn unify(batch: &RawBatch, schema: &SourceSchema, now: DateTime<Utc>) -> Vec<CanonicalRecord> {
    let capture = &batch.capture;
    let source_id = format!("{}:{}", capture.source_type(), capture.origin());
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut records = Vec::with_capacity(batch.items.len());
    let mut dropped = 0usize;
    for item in &batch.items {
        if item.is_unparsed() && item.defect.is_none() {
            dropped += 1;
            continue;
        }
        let mapped = map_fields(item, schema);
        records.push(CanonicalRecord {
            index: records.len(),
            fields: mapped.fields,
            identity_source: mapped.identity_source,
            provenance: Provenance {
                source_id: source_id.clone(),
                lineage_id: capture.lineage_id().to_string(),
                ingestion_timestamp: timestamp.clone(),
            },
            defect: item.defect.clone(),
            flags: Vec::new(),
        });
    }

    if dropped > 0 {
        tracing::warn!(dropped, "dropped items with no parsable fields");
    }
    tracing::info!(records = records.len(), source = %source_id, "unified batch");
    records
}

/// Fields of one item after alias resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedFields {
    pub fields: BTreeMap<String, FieldValue>,
    /// Raw key that became `identity`, if any.
    pub identity_source: Option<String>,
}

/// Resolve core fields through the alias table, pass everything else
/// through under its own name.
pub fn map_fields(item: &RawItem, schema: &SourceSchema) -> MappedFields {
    // normalized key -> raw key, first spelling wins
    let mut by_norm: HashMap<String, &str> = HashMap::new();
    for key in item.fields.keys() {
        by_norm.entry(normalize_key(key)).or_insert(key.as_str());
    }

    let mut claimed: Vec<&str> = Vec::new();
    let mut identity_source = None;
    let mut out = BTreeMap::new();
    for field in CoreField::ALL {
        let hit = schema
            .candidates(field)
            .into_iter()
            .filter_map(|alias| by_norm.get(&normalize_key(alias)).copied())
            .find(|raw| !claimed.contains(raw));
        if let Some(raw) = hit {
            if field == CoreField::Identity {
                identity_source = Some(raw.to_string());
            }
            claimed.push(raw);
            out.insert(field.as_str().to_string(), item.fields[raw].clone());
        }
    }

    for (key, value) in &item.fields {
        if claimed.contains(&key.as_str()) {
            continue;
        }
        let mut name = if is_reserved_key(key) {
            format!("{}_raw", key)
        } else {
            key.clone()
        };
        // a pass-through key may still spell a core name in another case
        while out.contains_key(&name) {
            name.push_str("_raw");
        }
        out.insert(name, value.clone());
    }
    MappedFields {
        fields: out,
        identity_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use trustgrid_config::AliasTable;
    use trustgrid_core::{RawCapture, SourceType};

    fn batch(items: Vec<RawItem>) -> RawBatch {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        RawBatch {
            capture: RawCapture::new(SourceType::CsvUpload, "listings.csv", at, None, b"x".to_vec()),
            items,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn aliases_map_to_core_names() {
        let item = RawItem::from_pairs([
            ("Address", FieldValue::text("12 oak st")),
            ("Price", FieldValue::text("250000")),
            ("Listed Date", FieldValue::text("2026-01-04")),
            ("agent", FieldValue::text("J. Smith")),
        ]);
        let schema = SourceSchema::Tabular(AliasTable::default());
        let mapped = map_fields(&item, &schema);
        assert_eq!(mapped.identity_source.as_deref(), Some("Address"));
        let fields = mapped.fields;
        assert_eq!(fields["identity"], FieldValue::text("12 oak st"));
        assert_eq!(fields["value"], FieldValue::text("250000"));
        assert_eq!(fields["date"], FieldValue::text("2026-01-04"));
        assert_eq!(fields["agent"], FieldValue::text("J. Smith"));
        assert!(!fields.contains_key("Address"));
    }

    #[test]
    fn alias_priority_and_passthrough() {
        let item = RawItem::from_pairs([
            ("name", FieldValue::text("Acme")),
            ("address", FieldValue::text("1 Main St")),
        ]);
        let fields = map_fields(&item, &SourceSchema::Tabular(AliasTable::default())).fields;
        // address is listed before name
        assert_eq!(fields["identity"], FieldValue::text("1 Main St"));
        assert_eq!(fields["name"], FieldValue::text("Acme"));
    }

    #[test]
    fn provenance_collisions_renamed() {
        let item = RawItem::from_pairs([
            ("source_id", FieldValue::text("upstream-7")),
            ("id", FieldValue::Int(7)),
        ]);
        let records = unify(&batch(vec![item]), &SourceSchema::Tabular(AliasTable::default()), now());
        let r = &records[0];
        assert_eq!(r.fields["source_id_raw"], FieldValue::text("upstream-7"));
        assert_eq!(r.provenance.source_id, "csv_upload:listings.csv");
        assert_eq!(r.provenance.ingestion_timestamp, "2026-03-01T12:00:00Z");
    }

    #[test]
    fn flag_key_collision_renamed() {
        let item = RawItem::from_pairs([
            ("remediation_flags", FieldValue::text("none")),
            ("id", FieldValue::Int(7)),
        ]);
        let records = unify(&batch(vec![item]), &SourceSchema::Tabular(AliasTable::default()), now());
        let r = &records[0];
        assert_eq!(r.fields["remediation_flags_raw"], FieldValue::text("none"));
        assert!(!r.fields.contains_key("remediation_flags"));

        let mut r = r.clone();
        r.flags.push(trustgrid_core::RemediationFlag::new(
            "value",
            trustgrid_core::IssueKind::Missing,
            "required field is empty",
        ));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json.matches("\"remediation_flags\"").count(), 1);
    }

    #[test]
    fn empty_items_dropped_order_kept() {
        let items = vec![
            RawItem::from_pairs([("id", FieldValue::Int(1))]),
            RawItem::default(),
            RawItem::from_pairs([("id", FieldValue::Int(2))]),
        ];
        let records = unify(&batch(items), &SourceSchema::Tabular(AliasTable::default()), now());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].fields["identity"], FieldValue::Int(2));
    }

    #[test]
    fn multimedia_identity_is_filename() {
        let item = RawItem::corrupted(
            BTreeMap::from([("filename".to_string(), FieldValue::text("a.png"))]),
            "truncated",
        );
        let records = unify(&batch(vec![item]), &SourceSchema::Multimedia, now());
        assert_eq!(records[0].fields["identity"], FieldValue::text("a.png"));
        assert!(records[0].is_corrupted());
    }
}
