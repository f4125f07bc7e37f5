use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use trustgrid_core::SourceType;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Core fields
// ---------------------------------------------------------------------------

/// The recognized "core" columns of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreField {
    /// Identity key (address, name, id, file name, ...).
    Identity,
    /// Primary numeric value.
    Value,
    /// Primary date.
    Date,
}

impl CoreField {
    pub const ALL: [CoreField; 3] = [CoreField::Identity, CoreField::Value, CoreField::Date];

    /// Canonical column name in unified records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Value => "value",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for CoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive key form used for alias matching: trimmed, lowercased,
/// spaces and hyphens folded to `_`.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Alias tables
// ---------------------------------------------------------------------------

/// Which raw keys map onto each core field, in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasTable {
    #[serde(default)]
    pub identity: Vec<String>,
    /// Identity aliases holding street addresses. Only identities mapped
    /// from one of these get address cleanup; ids and names keep their
    /// raw text.
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub value: Vec<String>,
    #[serde(default)]
    pub date: Vec<String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let list = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            identity: list(&[
                "address", "add", "id", "identifier", "key", "name", "title", "filename",
            ]),
            address: list(&["address", "add"]),
            value: list(&["price", "amount", "value", "cost", "total"]),
            date: list(&["listed_date", "date", "created", "created_at", "timestamp", "published"]),
        }
    }
}

impl AliasTable {
    pub fn aliases(&self, field: CoreField) -> &[String] {
        match field {
            CoreField::Identity => &self.identity,
            CoreField::Value => &self.value,
            CoreField::Date => &self.date,
        }
    }

    fn check(&self, source: &str) -> Result<(), ConfigError> {
        let mut owner: HashMap<String, CoreField> = HashMap::new();
        for field in CoreField::ALL {
            for alias in self.aliases(field) {
                let key = normalize_key(alias);
                if key.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "sources.{source}: empty alias for '{field}'"
                    )));
                }
                match owner.get(&key) {
                    Some(prev) if *prev != field => {
                        return Err(ConfigError::Validation(format!(
                            "sources.{source}: alias '{alias}' is claimed by both '{prev}' and '{field}'"
                        )));
                    }
                    _ => {
                        owner.insert(key, field);
                    }
                }
            }
        }
        for alias in &self.address {
            if owner.get(&normalize_key(alias)) != Some(&CoreField::Identity) {
                return Err(ConfigError::Validation(format!(
                    "sources.{source}: address alias '{alias}' is not an identity alias"
                )));
            }
        }
        Ok(())
    }

    /// Whether `raw_key` names one of the address columns.
    pub fn is_address(&self, raw_key: &str) -> bool {
        let key = normalize_key(raw_key);
        self.address.iter().any(|a| normalize_key(a) == key)
    }
}

/// Per-source mapping strategy. Tagged in TOML by `schema = "..."`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum SourceSchema {
    /// Rows with named columns; core fields resolved through aliases.
    Tabular(AliasTable),
    /// Extracted archive members; identity is the member file name.
    Multimedia,
}

impl SourceSchema {
    /// Built-in schema for a source kind.
    pub fn default_for(source_type: SourceType) -> Self {
        match source_type {
            SourceType::ZipUpload => Self::Multimedia,
            _ => Self::Tabular(AliasTable::default()),
        }
    }

    /// Raw keys that may supply `field`, highest priority first. The
    /// canonical name itself always comes first.
    pub fn candidates(&self, field: CoreField) -> Vec<&str> {
        let mut out = vec![field.as_str()];
        match self {
            Self::Tabular(table) => {
                out.extend(table.aliases(field).iter().map(|s| s.as_str()));
            }
            Self::Multimedia => {
                if field == CoreField::Identity {
                    out.push("filename");
                }
            }
        }
        out
    }

    /// Whether an identity read from `raw_key` gets street-address cleanup.
    pub fn is_address_key(&self, raw_key: &str) -> bool {
        match self {
            Self::Tabular(table) => table.is_address(raw_key),
            Self::Multimedia => false,
        }
    }

    pub fn is_multimedia(&self) -> bool {
        matches!(self, Self::Multimedia)
    }

    pub(crate) fn check(&self, source: &str) -> Result<(), ConfigError> {
        match self {
            Self::Tabular(table) => table.check(source),
            Self::Multimedia => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Record-level schema rules
// ---------------------------------------------------------------------------

/// Two date fields where `earlier` must not be after `later`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatePair {
    pub earlier: String,
    pub later: String,
}

/// `field` must hold a value that some record carries in `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub field: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Core fields that must be non-empty.
    #[serde(default = "default_required")]
    pub required: Vec<CoreField>,
    /// Fields composing the duplicate-detection key.
    #[serde(default = "default_identity_key")]
    pub identity_key: Vec<String>,
    #[serde(default)]
    pub related_dates: Vec<DatePair>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

fn default_required() -> Vec<CoreField> {
    CoreField::ALL.to_vec()
}

fn default_identity_key() -> Vec<String> {
    vec![CoreField::Identity.as_str().to_string()]
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            required: default_required(),
            identity_key: default_identity_key(),
            related_dates: Vec::new(),
            references: Vec::new(),
        }
    }
}

impl SchemaConfig {
    pub(crate) fn check(&self) -> Result<(), ConfigError> {
        if self.identity_key.is_empty() {
            return Err(ConfigError::Validation(
                "schema.identity_key must name at least one field".into(),
            ));
        }
        if self.identity_key.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "schema.identity_key contains an empty field name".into(),
            ));
        }
        for pair in &self.related_dates {
            if pair.earlier == pair.later {
                return Err(ConfigError::Validation(format!(
                    "schema.related_dates: '{}' is compared with itself",
                    pair.earlier
                )));
            }
        }
        for r in &self.references {
            if r.field.trim().is_empty() || r.target.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "schema.references: field and target must be non-empty".into(),
                ));
            }
        }
        Ok(())
    }
}
