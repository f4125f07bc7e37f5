// Excel upload adapter (xlsx, xlsm, xls, ods)

use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};
use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::csv::header_names;
use crate::sniff::Signature;
use crate::upload;

pub struct XlsxAdapter;

impl SourceAdapter for XlsxAdapter {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(
            file,
            &["xlsx", "xlsm", "xls", "ods"],
            &[Signature::Zip, Signature::Ole],
        )?;
        let items = read_first_sheet(&file.bytes)?;
        tracing::info!(file = %file.name, rows = items.len(), "parsed workbook");

        Ok(RawBatch {
            capture: upload::capture(
                req,
                ctx,
                file,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            items,
        })
    }
}

/// First worksheet, first non-empty row as header.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<RawItem>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::ParseFailure(format!("failed to open workbook: {}", e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| IngestError::ParseFailure("workbook contains no sheets".into()))?;
    let range = workbook
        .worksheet_range(first)
        .map_err(|e| IngestError::ParseFailure(format!("failed to read sheet '{}': {}", first, e)))?;

    let mut rows = range.rows().skip_while(|row| row.iter().all(is_blank));
    let header = match rows.next() {
        Some(row) => {
            let labels: Vec<String> = row.iter().map(header_label).collect();
            header_names(labels.iter().map(|s| s.as_str()))
        }
        None => return Ok(Vec::new()),
    };

    let mut items = Vec::new();
    for row in rows {
        if row.iter().all(is_blank) {
            continue;
        }
        let fields: BTreeMap<String, FieldValue> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), row.get(i).map(cell_value).unwrap_or(FieldValue::Null)))
            .collect();
        items.push(RawItem::new(fields));
    }
    Ok(items)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn header_label(cell: &Data) -> String {
    match cell_value(cell) {
        FieldValue::Null => String::new(),
        v => v.to_string(),
    }
}

fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty => FieldValue::Null,
        Data::String(s) => FieldValue::from_cell(s.trim()),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                FieldValue::Int(*n as i64)
            } else {
                FieldValue::float(*n)
            }
        }
        Data::Int(n) => FieldValue::Int(*n),
        Data::Bool(b) => FieldValue::Bool(*b),
        Data::Error(e) => FieldValue::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => {
            // 1900 date system assumed
            let serial = dt.as_f64();
            match serial_to_date(serial) {
                Some(d) => FieldValue::Date(d),
                None => FieldValue::float(serial),
            }
        }
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(FieldValue::Date)
            .unwrap_or_else(|| FieldValue::from_cell(s)),
        Data::DurationIso(s) => FieldValue::from_cell(s),
    }
}

/// Excel serial day to calendar date. Serials below 1 are pure times.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}
