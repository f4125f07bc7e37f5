// Structure sensing over plain text (PDF pages, DOCX paragraphs, unknown text files)

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use trustgrid_core::FieldValue;

use crate::csv::header_names;

fn column_gap() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\t+| {2,}").unwrap())
}

fn label_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][\w \-]{0,60}?)\s*[:=]\s*(\S.*?)\s*$").unwrap()
    })
}

/// `Label: Value` (or `Label = Value`) on one line. The label becomes a
/// snake_case key.
pub fn key_value(line: &str) -> Option<(String, String)> {
    let caps = label_value().captures(line)?;
    let key = label_key(caps.get(1)?.as_str());
    let value = caps.get(2)?.as_str().to_string();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

pub fn label_key(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Cells of a whitespace-aligned line (split on tabs or runs of 2+ spaces).
pub fn aligned_cells(line: &str) -> Vec<&str> {
    column_gap()
        .split(line.trim())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

/// A run of aligned lines with a stable column count.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Indices (into the input lines) covered by the table.
    pub lines: Vec<usize>,
}

impl TextTable {
    pub fn records(&self) -> Vec<BTreeMap<String, FieldValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.header
                    .iter()
                    .enumerate()
                    .map(|(i, h)| {
                        let v = row.get(i).map(|c| FieldValue::from_cell(c)).unwrap_or(FieldValue::Null);
                        (h.clone(), v)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Find whitespace-aligned tables: at least two consecutive lines (header
/// plus one row) splitting into the same number (>= 2) of cells. Lines that
/// read as `Label: Value` never start or extend a table.
pub fn find_tables(lines: &[&str]) -> Vec<TextTable> {
    let mut tables = Vec::new();
    let mut run: Vec<(usize, Vec<&str>)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let cells = aligned_cells(line);
        let tabular = cells.len() >= 2 && key_value(line).is_none();
        if !tabular {
            flush_run(&mut run, &mut tables);
            continue;
        }
        if let Some((_, prev)) = run.last() {
            if prev.len() != cells.len() {
                flush_run(&mut run, &mut tables);
            }
        }
        run.push((i, cells));
    }
    flush_run(&mut run, &mut tables);
    tables
}

fn flush_run(run: &mut Vec<(usize, Vec<&str>)>, tables: &mut Vec<TextTable>) {
    if run.len() >= 2 {
        let header = header_names(run[0].1.iter().copied());
        let rows = run[1..]
            .iter()
            .map(|(_, cells)| cells.iter().map(|c| c.to_string()).collect())
            .collect();
        let lines = run.iter().map(|(i, _)| *i).collect();
        tables.push(TextTable { header, rows, lines });
    }
    run.clear();
}
