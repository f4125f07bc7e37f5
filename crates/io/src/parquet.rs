// Parquet upload adapter

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use trustgrid_core::{
    FieldValue, IngestError, RawBatch, RawItem, RunContext, SourceAdapter, TriggerRequest,
};

use crate::sniff::Signature;
use crate::upload;

pub struct ParquetAdapter;

impl SourceAdapter for ParquetAdapter {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn ingest(&self, req: &TriggerRequest, ctx: &RunContext<'_>) -> Result<RawBatch, IngestError> {
        let file = upload::uploaded(req)?;
        upload::check_format(file, &["parquet", "pq"], &[Signature::Parquet])?;
        let items = read_rows(&file.bytes)?;
        tracing::info!(file = %file.name, rows = items.len(), "parsed parquet file");

        Ok(RawBatch {
            capture: upload::capture(req, ctx, file, "application/vnd.apache.parquet"),
            items,
        })
    }
}

pub fn read_rows(bytes: &[u8]) -> Result<Vec<RawItem>, IngestError> {
    let reader = SerializedFileReader::new(Bytes::copy_from_slice(bytes))
        .map_err(|e| IngestError::ParseFailure(format!("invalid parquet file: {}", e)))?;
    let rows = reader
        .get_row_iter(None)
        .map_err(|e| IngestError::ParseFailure(format!("cannot read rows: {}", e)))?;

    let mut items = Vec::new();
    for row in rows {
        let row = row.map_err(|e| IngestError::ParseFailure(format!("row {}: {}", items.len(), e)))?;
        let fields: BTreeMap<String, FieldValue> = row
            .get_column_iter()
            .map(|(name, field)| (name.clone(), field_value(field)))
            .collect();
        items.push(RawItem::new(fields));
    }
    Ok(items)
}

fn field_value(field: &Field) -> FieldValue {
    match field {
        Field::Null => FieldValue::Null,
        Field::Bool(b) => FieldValue::Bool(*b),
        Field::Byte(n) => FieldValue::Int(i64::from(*n)),
        Field::Short(n) => FieldValue::Int(i64::from(*n)),
        Field::Int(n) => FieldValue::Int(i64::from(*n)),
        Field::Long(n) => FieldValue::Int(*n),
        Field::UByte(n) => FieldValue::Int(i64::from(*n)),
        Field::UShort(n) => FieldValue::Int(i64::from(*n)),
        Field::UInt(n) => FieldValue::Int(i64::from(*n)),
        Field::Float(x) => FieldValue::float(f64::from(*x)),
        Field::Double(x) => FieldValue::float(*x),
        Field::Str(s) => FieldValue::from_cell(s),
        Field::Date(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(Duration::days(i64::from(*days))))
            .map(FieldValue::Date)
            .unwrap_or(FieldValue::Null),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|dt| FieldValue::Text(dt.to_rfc3339()))
            .unwrap_or(FieldValue::Null),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(|dt| FieldValue::Text(dt.to_rfc3339()))
            .unwrap_or(FieldValue::Null),
        // Decimals, binary, nested groups/lists/maps keep their display form
        other => FieldValue::from_cell(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::data_type::{ByteArray, ByteArrayType, Int64Type};
    use parquet::file::properties::WriterProperties;
    use parquet::file::writer::SerializedFileWriter;
    use parquet::schema::parser::parse_message_type;
    use std::sync::Arc;

    fn listing_file() -> Vec<u8> {
        let schema = Arc::new(
            parse_message_type(
                "message listing { required binary address (UTF8); optional int64 price; }",
            )
            .unwrap(),
        );
        let props = Arc::new(WriterProperties::builder().build());
        let mut buf = Vec::new();
        let mut writer = SerializedFileWriter::new(&mut buf, schema, props).unwrap();
        let mut rg = writer.next_row_group().unwrap();

        let mut col = rg.next_column().unwrap().unwrap();
        col.typed::<ByteArrayType>()
            .write_batch(&[ByteArray::from("12 Oak St"), ByteArray::from("9 Elm Ave")], None, None)
            .unwrap();
        col.close().unwrap();

        let mut col = rg.next_column().unwrap().unwrap();
        col.typed::<Int64Type>()
            .write_batch(&[250000], Some(&[1, 0]), None)
            .unwrap();
        col.close().unwrap();

        rg.close().unwrap();
        writer.close().unwrap();
        buf
    }

    #[test]
    fn reads_rows_with_nulls() {
        let items = read_rows(&listing_file()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].fields["address"], FieldValue::text("12 Oak St"));
        assert_eq!(items[0].fields["price"], FieldValue::Int(250000));
        assert_eq!(items[1].fields["price"], FieldValue::Null);
    }

    #[test]
    fn truncated_file_is_parse_failure() {
        let mut bytes = listing_file();
        let keep = bytes.len() - 12;
        bytes.truncate(keep);
        let err = read_rows(&bytes).unwrap_err();
        assert_eq!(err.category(), "parse_failure");
    }
}
