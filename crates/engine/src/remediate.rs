//! Remediation Engine: normalization, coercion and flagging, in place.
//!
//! Record count never changes. Flags are recomputed from scratch on every
//! pass, so running [`remediate`] twice yields the same fields and the same
//! flag set.

use std::collections::HashMap;

use chrono::NaiveDate;
use trustgrid_config::{CoreField, PlausibilityConfig, SchemaConfig, SourceSchema};
use trustgrid_core::{CanonicalRecord, FieldValue, IssueKind, RemediationFlag};

use crate::coerce::{to_date, to_number, Coerced};
use crate::normalize::normalize_text;

/// Field name used for flags that concern the whole record.
pub const RECORD_FIELD: &str = "record";

/// Everything remediation and scoring need to know about the active schema.
#[derive(Debug, Clone, Copy)]
pub struct Rules<'a> {
    pub schema: &'a SchemaConfig,
    pub source: &'a SourceSchema,
    pub plausibility: &'a PlausibilityConfig,
    /// The run clock's date; later dates are "in the future".
    pub today: NaiveDate,
}

impl Rules<'_> {
    /// Required core fields that at least one record carries. A source that
    /// never produces a field (a ZIP of images has no price) is not
    /// penalized for it.
    pub fn active_required(&self, records: &[CanonicalRecord]) -> Vec<CoreField> {
        self.schema
            .required
            .iter()
            .copied()
            .filter(|f| records.iter().any(|r| r.fields.contains_key(f.as_str())))
            .collect()
    }

    /// Fields holding dates: the core date plus both sides of every related pair.
    pub fn date_fields(&self) -> Vec<&str> {
        let mut out = vec![CoreField::Date.as_str()];
        for pair in &self.schema.related_dates {
            for f in [pair.earlier.as_str(), pair.later.as_str()] {
                if !out.contains(&f) {
                    out.push(f);
                }
            }
        }
        out
    }

    /// Duplicate-detection key of one record. `None` when every component
    /// is missing.
    pub fn identity_of(&self, record: &CanonicalRecord) -> Option<String> {
        let parts: Vec<String> = self
            .schema
            .identity_key
            .iter()
            .map(|k| match record.get(k) {
                Some(v) if !v.is_missing() => v.to_string().trim().to_lowercase(),
                _ => String::new(),
            })
            .collect();
        if parts.iter().all(|p| p.is_empty()) {
            None
        } else {
            Some(parts.join("\u{1f}"))
        }
    }

    fn identity_active(&self, records: &[CanonicalRecord]) -> bool {
        records
            .iter()
            .any(|r| self.schema.identity_key.iter().any(|k| r.fields.contains_key(k)))
    }
}

pub fn remediate(records: &mut [CanonicalRecord], rules: &Rules<'_>) {
    let active = rules.active_required(records);
    let date_fields = rules.date_fields();

    for record in records.iter_mut() {
        record.flags.clear();
        clean_record(record, rules, &active, &date_fields);
    }
    flag_repeats(records, rules);

    for record in records.iter_mut() {
        record.flags.sort();
        record.flags.dedup();
    }

    let flagged = records.iter().filter(|r| !r.flags.is_empty()).count();
    tracing::info!(records = records.len(), flagged, "remediation complete");
}

fn clean_record(
    record: &mut CanonicalRecord,
    rules: &Rules<'_>,
    active: &[CoreField],
    date_fields: &[&str],
) {
    let identity = CoreField::Identity.as_str();
    let value = CoreField::Value.as_str();
    let date = CoreField::Date.as_str();

    if let Some(reason) = &record.defect {
        record.flags.push(
            RemediationFlag::new(RECORD_FIELD, IssueKind::Corrupted, reason.clone())
                .with_action("kept readable metadata"),
        );
    }

    let from_address = record
        .identity_source
        .as_deref()
        .is_some_and(|key| rules.source.is_address_key(key));
    if from_address {
        if let Some(FieldValue::Text(s)) = record.fields.get(identity) {
            let normalized = normalize_text(s);
            let replacement = if normalized.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(normalized)
            };
            record.fields.insert(identity.to_string(), replacement);
        }
    }

    if let Some(raw) = record.fields.get(value).cloned() {
        match to_number(&raw) {
            Coerced::Value(v) => {
                let min = rules.plausibility.value_min;
                if v.as_f64().is_some_and(|x| x <= min) {
                    record.flags.push(RemediationFlag::new(
                        value,
                        IssueKind::Invalid,
                        format!("must be greater than {}", min),
                    ));
                }
                record.fields.insert(value.to_string(), v);
            }
            Coerced::Failed => record.flags.push(
                RemediationFlag::new(value, IssueKind::Invalid, format!("not a number: {:?}", raw.to_string()))
                    .with_action("kept raw value"),
            ),
            Coerced::Missing => {}
        }
    }

    for &field in date_fields {
        let Some(raw) = record.fields.get(field).cloned() else {
            continue;
        };
        match to_date(&raw) {
            Coerced::Value(v) => {
                record.fields.insert(field.to_string(), v);
            }
            Coerced::Failed => record.flags.push(
                RemediationFlag::new(field, IssueKind::Invalid, format!("unparsable date: {:?}", raw.to_string()))
                    .with_action("kept raw value"),
            ),
            Coerced::Missing => {}
        }
    }

    for field in active {
        let missing = record.get(field.as_str()).map_or(true, FieldValue::is_missing);
        if missing {
            record.flags.push(RemediationFlag::new(
                field.as_str(),
                IssueKind::Missing,
                "required field is empty",
            ));
        }
    }

    if let Some(d) = record.get(date).and_then(FieldValue::as_date) {
        if d > rules.today {
            record.flags.push(RemediationFlag::new(
                date,
                IssueKind::Inconsistent,
                format!("{} is in the future", d),
            ));
        }
    }

    for pair in &rules.schema.related_dates {
        let earlier = record.get(&pair.earlier).and_then(FieldValue::as_date);
        let later = record.get(&pair.later).and_then(FieldValue::as_date);
        if let (Some(a), Some(b)) = (earlier, later) {
            if a > b {
                record.flags.push(RemediationFlag::new(
                    pair.later.as_str(),
                    IssueKind::Inconsistent,
                    format!("{} ({}) is after {} ({})", pair.earlier, a, pair.later, b),
                ));
            }
        }
    }
}

/// Later occurrences of an identity are duplicates. Two observations of the
/// same identity on the same date must agree on the value.
fn flag_repeats(records: &mut [CanonicalRecord], rules: &Rules<'_>) {
    let by_identity = rules.identity_active(records);
    let flag_field = if by_identity {
        rules
            .schema
            .identity_key
            .first()
            .map(|s| s.as_str())
            .unwrap_or(CoreField::Identity.as_str())
    } else {
        RECORD_FIELD
    };

    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut observed: HashMap<(String, NaiveDate), (usize, FieldValue)> = HashMap::new();

    for record in records.iter_mut() {
        let key = if by_identity {
            rules.identity_of(record)
        } else {
            Some(fingerprint(record))
        };
        let Some(key) = key else {
            continue;
        };

        match first_seen.get(&key) {
            Some(&first) => record.flags.push(RemediationFlag::new(
                flag_field,
                IssueKind::Duplicate,
                format!("duplicate of record {}", first),
            )),
            None => {
                first_seen.insert(key.clone(), record.index);
            }
        }

        let date = record.get(CoreField::Date.as_str()).and_then(FieldValue::as_date);
        let value = record
            .get(CoreField::Value.as_str())
            .filter(|v| !v.is_missing())
            .cloned();
        if let (Some(date), Some(value)) = (date, value) {
            match observed.get(&(key.clone(), date)) {
                Some((first, seen)) if !same_value(seen, &value) => {
                    record.flags.push(RemediationFlag::new(
                        CoreField::Value.as_str(),
                        IssueKind::Inconsistent,
                        format!("record {} reports {} for the same identity and date", first, seen),
                    ));
                }
                Some(_) => {}
                None => {
                    observed.insert((key, date), (record.index, value));
                }
            }
        }
    }
}

fn same_value(a: &FieldValue, b: &FieldValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Whole-row key used when the batch has no identity columns at all.
fn fingerprint(record: &CanonicalRecord) -> String {
    record
        .fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}
