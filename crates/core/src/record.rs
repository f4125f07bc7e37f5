use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::value::FieldValue;

/// Provenance keys every canonical record carries.
pub const PROVENANCE_KEYS: [&str; 3] = ["source_id", "lineage_id", "ingestion_timestamp"];

/// Key the flag list serializes under.
pub const FLAGS_KEY: &str = "remediation_flags";

/// Keys the serialized record writes itself; data fields must not use them.
pub fn is_reserved_key(key: &str) -> bool {
    key == FLAGS_KEY || PROVENANCE_KEYS.contains(&key)
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    Invalid,
    Duplicate,
    Inconsistent,
    /// Container member that could not be decoded.
    Corrupted,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Invalid => write!(f, "invalid"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Inconsistent => write!(f, "inconsistent"),
            Self::Corrupted => write!(f, "corrupted"),
        }
    }
}

/// A non-fatal data-quality issue on one (record, field) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RemediationFlag {
    pub field: String,
    pub issue_kind: IssueKind,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl RemediationFlag {
    pub fn new(field: impl Into<String>, issue_kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            issue_kind,
            detail: detail.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provenance {
    pub source_id: String,
    pub lineage_id: String,
    /// RFC 3339.
    pub ingestion_timestamp: String,
}

/// The unified row representation every source is mapped into.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Position in the adapter's output.
    pub index: usize,
    pub fields: BTreeMap<String, FieldValue>,
    /// Raw key the `identity` field was read from.
    pub identity_source: Option<String>,
    pub provenance: Provenance,
    pub defect: Option<String>,
    pub flags: Vec<RemediationFlag>,
}

impl CanonicalRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn has_flag(&self, kind: IssueKind) -> bool {
        self.flags.iter().any(|f| f.issue_kind == kind)
    }

    pub fn has_flag_on(&self, field: &str, kind: IssueKind) -> bool {
        self.flags
            .iter()
            .any(|f| f.issue_kind == kind && f.field == field)
    }

    pub fn is_corrupted(&self) -> bool {
        self.defect.is_some()
    }
}

// Flat shape: data fields, then provenance, then flags (only when present).
impl Serialize for CanonicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = if self.flags.is_empty() { 3 } else { 4 };
        let mut map = serializer.serialize_map(Some(self.fields.len() + extra))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry("source_id", &self.provenance.source_id)?;
        map.serialize_entry("lineage_id", &self.provenance.lineage_id)?;
        map.serialize_entry("ingestion_timestamp", &self.provenance.ingestion_timestamp)?;
        if !self.flags.is_empty() {
            map.serialize_entry(FLAGS_KEY, &self.flags)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CanonicalRecord {
        let mut fields = BTreeMap::new();
        fields.insert("identity".to_string(), FieldValue::text("12 Oak Street"));
        fields.insert("value".to_string(), FieldValue::Int(250000));
        CanonicalRecord {
            index: 0,
            fields,
            identity_source: Some("Address".into()),
            provenance: Provenance {
                source_id: "csv_upload:a.csv".into(),
                lineage_id: "lin-0123456789abcdef".into(),
                ingestion_timestamp: "2026-03-01T12:00:00+00:00".into(),
            },
            defect: None,
            flags: vec![],
        }
    }

    #[test]
    fn serializes_flat_with_provenance() {
        let v = serde_json::to_value(record()).unwrap();
        assert_eq!(v["identity"], "12 Oak Street");
        assert_eq!(v["value"], 250000);
        assert_eq!(v["source_id"], "csv_upload:a.csv");
        assert_eq!(v["lineage_id"], "lin-0123456789abcdef");
        assert!(v.get("remediation_flags").is_none());
    }

    #[test]
    fn flags_serialize_when_present() {
        let mut r = record();
        r.flags.push(RemediationFlag::new("value", IssueKind::Missing, "required field is empty"));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["remediation_flags"][0]["issue_kind"], "missing");
        assert!(r.has_flag_on("value", IssueKind::Missing));
        assert!(!r.has_flag(IssueKind::Duplicate));
    }

    #[test]
    fn reserved_keys() {
        assert!(is_reserved_key("remediation_flags"));
        assert!(is_reserved_key("lineage_id"));
        assert!(!is_reserved_key("remediation_flags_raw"));
        assert!(!is_reserved_key("identity"));
    }
}
