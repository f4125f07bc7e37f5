use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::source::SourceType;
use crate::value::FieldValue;

// ---------------------------------------------------------------------------
// Raw capture
// ---------------------------------------------------------------------------

/// The as-received payload of one ingestion run.
///
/// Write-once: all fields are private and there are no setters. The content
/// is shared behind an `Arc` so audit copies are cheap.
#[derive(Debug, Clone)]
pub struct RawCapture {
    source_type: SourceType,
    origin: String,
    fetched_at: DateTime<Utc>,
    media_type: Option<String>,
    content: Arc<[u8]>,
    lineage_id: String,
    content_blake3: String,
}

impl RawCapture {
    /// `lineage_id` is content-addressed: the same source kind, origin and
    /// bytes always produce the same id.
    pub fn new(
        source_type: SourceType,
        origin: impl Into<String>,
        fetched_at: DateTime<Utc>,
        media_type: Option<String>,
        content: Vec<u8>,
    ) -> Self {
        let origin = origin.into();
        let content_blake3 = blake3::hash(&content).to_hex().to_string();

        let mut hasher = blake3::Hasher::new();
        hasher.update(source_type.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(origin.as_bytes());
        hasher.update(&[0]);
        hasher.update(&content);
        let digest = hasher.finalize().to_hex();
        let lineage_id = format!("lin-{}", &digest.as_str()[..16]);

        Self {
            source_type,
            origin,
            fetched_at,
            media_type,
            content: Arc::from(content),
            lineage_id,
            content_blake3,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn lineage_id(&self) -> &str {
        &self.lineage_id
    }

    pub fn content_blake3(&self) -> &str {
        &self.content_blake3
    }

    /// Serializable audit view (everything except the payload itself).
    pub fn meta(&self) -> CaptureMeta {
        CaptureMeta {
            source_type: self.source_type,
            origin: self.origin.clone(),
            fetched_at: self.fetched_at.to_rfc3339(),
            media_type: self.media_type.clone(),
            byte_len: self.content.len(),
            lineage_id: self.lineage_id.clone(),
            content_blake3: self.content_blake3.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureMeta {
    pub source_type: SourceType,
    pub origin: String,
    pub fetched_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub byte_len: usize,
    pub lineage_id: String,
    pub content_blake3: String,
}

// ---------------------------------------------------------------------------
// Raw items
// ---------------------------------------------------------------------------

/// One item extracted by an adapter, before unification.
///
/// `defect` is set for container members that could not be decoded; the item
/// still carries whatever metadata was readable (file name, size, …).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub fields: BTreeMap<String, FieldValue>,
    pub defect: Option<String>,
}

impl RawItem {
    pub fn new(fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            fields,
            defect: None,
        }
    }

    pub fn corrupted(fields: BTreeMap<String, FieldValue>, reason: impl Into<String>) -> Self {
        Self {
            fields,
            defect: Some(reason.into()),
        }
    }

    /// Build from `(key, value)` pairs; later duplicates overwrite earlier ones.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, FieldValue)>) -> Self {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn with(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// An item with no mapping at all. The Unifier drops these.
    pub fn is_unparsed(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Adapter output: the capture plus the items parsed out of it.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub capture: RawCapture,
    pub items: Vec<RawItem>,
}
