use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// A single cell of a canonical record.
///
/// Floats are always finite: constructors that could see NaN/inf go through
/// [`FieldValue::float`], which maps them to `Null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

/// Coarse type of a value, used for dominant-type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Bool,
    Numeric,
    Date,
    Text,
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn float(f: f64) -> Self {
        if f.is_finite() {
            Self::Float(f)
        } else {
            Self::Null
        }
    }

    /// Text cell from a raw string: empty or whitespace-only becomes `Null`.
    pub fn from_cell(s: &str) -> Self {
        if s.trim().is_empty() {
            Self::Null
        } else {
            Self::Text(s.to_string())
        }
    }

    /// Null, or text that is empty after trimming.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) | Self::Float(_) => ValueKind::Numeric,
            Self::Date(_) => ValueKind::Date,
            Self::Text(s) if s.trim().is_empty() => ValueKind::Null,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Convert a JSON scalar. Arrays are kept as compact JSON text; objects
    /// should be flattened with [`flatten_json`] before reaching here.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::float).unwrap_or(Self::Null),
            },
            Value::String(s) => Self::from_cell(s),
            Value::Array(items) if items.is_empty() => Self::Null,
            Value::Array(_) => Self::Text(value.to_string()),
            Value::Object(map) if map.is_empty() => Self::Null,
            Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON flattening
// ---------------------------------------------------------------------------

/// Flatten one JSON record into a field map.
///
/// Nested objects become `parent_child` keys. A non-object value is wrapped
/// as `{"value": …}` so scalar arrays still produce one record per element.
pub fn flatten_json(value: &serde_json::Value) -> BTreeMap<String, FieldValue> {
    let mut out = BTreeMap::new();
    match value {
        serde_json::Value::Object(map) => flatten_into(&mut out, "", map),
        other => {
            out.insert("value".to_string(), FieldValue::from_json(other));
        }
    }
    out
}

fn flatten_into(
    out: &mut BTreeMap<String, FieldValue>,
    prefix: &str,
    map: &serde_json::Map<String, serde_json::Value>,
) {
    for (k, v) in map {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{}_{}", prefix, k)
        };
        match v {
            serde_json::Value::Object(inner) if !inner.is_empty() => {
                flatten_into(out, &key, inner)
            }
            _ => {
                out.insert(key, FieldValue::from_json(v));
            }
        }
    }
}
