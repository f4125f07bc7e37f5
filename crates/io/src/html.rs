//! HTML table and list extraction.
//!
//! Tolerant block scanning rather than a DOM: case-insensitive tag blocks,
//! tag stripping, entity and whitespace normalization. Used by the web
//! scraper and by universal sniffing when an upload turns out to be HTML.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use trustgrid_core::{FieldValue, RawItem};

use crate::csv::header_names;

/// Caps applied when turning a page into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlLimits {
    pub max_records: usize,
    pub min_list_items: usize,
}

impl Default for HtmlLimits {
    fn default() -> Self {
        Self {
            max_records: 100,
            min_list_items: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HtmlTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

macro_rules! cached_regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).unwrap())
        }
    };
}

cached_regex!(noise_re, r"(?is)<!--.*?-->|<(script|style|noscript)\b[^>]*>.*?</(?:script|style|noscript)\s*>");
cached_regex!(table_re, r"(?is)<table\b[^>]*>(.*?)</table\s*>");
cached_regex!(thead_re, r"(?is)<thead\b[^>]*>(.*?)</thead\s*>");
cached_regex!(tr_re, r"(?is)<tr\b[^>]*>(.*?)</tr\s*>");
cached_regex!(cell_re, r"(?is)<(?:td|th)\b[^>]*>(.*?)(?:</(?:td|th)\s*>|$)");
cached_regex!(list_re, r"(?is)<(?:ul|ol)\b[^>]*>(.*?)</(?:ul|ol)\s*>");
cached_regex!(li_open_re, r"(?i)<li\b[^>]*>");
cached_regex!(tag_re, r"(?s)<[^>]*>");
cached_regex!(entity_re, r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);");

/// Visible text of a fragment: tags removed, entities decoded, whitespace
/// collapsed.
pub fn strip_tags(fragment: &str) -> String {
    let no_tags = tag_re().replace_all(fragment, " ");
    let decoded = entity_re().replace_all(&no_tags, |caps: &regex::Captures| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(name: &str) -> Option<String> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some(c.to_string())
}

fn cells(row_html: &str) -> Vec<String> {
    cell_re()
        .captures_iter(row_html)
        .map(|c| strip_tags(&c[1]))
        .collect()
}

/// Every `<table>` on the page. The header comes from `<thead>` when present,
/// otherwise from the first row. Tables without any data row are skipped.
pub fn tables(html: &str) -> Vec<HtmlTable> {
    let clean = noise_re().replace_all(html, "");
    let mut out = Vec::new();

    for table in table_re().captures_iter(&clean) {
        let inner = &table[1];
        let (header_cells, body) = match thead_re().captures(inner) {
            Some(head) => {
                let head_cells = cells(&head[1]);
                let rest = thead_re().replace(inner, "").into_owned();
                (head_cells, rest)
            }
            None => (Vec::new(), inner.to_string()),
        };

        let mut rows: Vec<Vec<String>> = tr_re()
            .captures_iter(&body)
            .map(|tr| cells(&tr[1]))
            .filter(|r| !r.is_empty())
            .collect();

        let header_cells = if header_cells.is_empty() {
            if rows.is_empty() {
                continue;
            }
            rows.remove(0)
        } else {
            header_cells
        };

        rows.retain(|r| r.iter().any(|c| !c.is_empty()));
        if rows.is_empty() {
            continue;
        }
        let header = header_names(header_cells.iter().map(|s| s.as_str()));
        out.push(HtmlTable { header, rows });
    }
    out
}

/// Items of every `<ul>`/`<ol>` that has at least `min_items` non-blank
/// entries, in page order.
pub fn list_items(html: &str, min_items: usize) -> Vec<String> {
    let clean = noise_re().replace_all(html, "");
    let mut out = Vec::new();
    for list in list_re().captures_iter(&clean) {
        let items: Vec<String> = li_open_re()
            .split(&list[1])
            .skip(1)
            .map(strip_tags)
            .filter(|s| !s.is_empty())
            .collect();
        if items.len() >= min_items {
            out.extend(items);
        }
    }
    out
}

/// Table rows become records keyed by header; with no usable table, list
/// items become `{item_content}` records. At most `limits.max_records`.
pub fn records_from_html(html: &str, limits: HtmlLimits) -> Vec<RawItem> {
    let mut items = Vec::new();

    for table in tables(html) {
        for row in &table.rows {
            if items.len() >= limits.max_records {
                return items;
            }
            let fields: BTreeMap<String, FieldValue> = table
                .header
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

    if items.is_empty() {
        items = list_items(html, limits.min_list_items)
            .into_iter()
            .take(limits.max_records)
            .map(|text| RawItem::from_pairs([("item_content", FieldValue::Text(text))]))
            .collect();
    }

    tracing::debug!(records = items.len(), "extracted records from HTML");
    items
}
