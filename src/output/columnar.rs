//! Parquet tables
//!
//! Records are flattened through `serde_json::Value`, so any struct whose
//! fields are strings, booleans or numbers (optionally wrapped in `Option`)
//! can be written. Column types come from `T::default()`: `None` and strings
//! become nullable UTF-8, `bool` becomes boolean, integers become Int64 and
//! floats Float64. Columns are ordered by field name. Rows are buffered
//! into record batches of [`BATCH_ROWS`] before being handed to the writer.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int64Array,
    Int64Builder, LargeStringArray, StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::errors::{OutputError, OutputResult};

/// Rows per record batch (and so the most rows held in memory at once)
pub const BATCH_ROWS: usize = 8192;

fn schema_error(message: impl Into<String>) -> OutputError {
    OutputError::Schema {
        message: message.into(),
    }
}

/// Flatten one record into its named column values
fn to_row<T: Serialize>(record: &T) -> OutputResult<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(schema_error(format!(
            "records must serialize as structs, got {}",
            other
        ))),
    }
}

enum ColumnBuilder {
    Utf8(StringBuilder),
    Boolean(BooleanBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
}

impl ColumnBuilder {
    fn for_template(name: &str, value: &Value) -> OutputResult<(Field, Self)> {
        let (data_type, builder) = match value {
            Value::Null | Value::String(_) => (DataType::Utf8, Self::Utf8(StringBuilder::new())),
            Value::Bool(_) => (DataType::Boolean, Self::Boolean(BooleanBuilder::new())),
            Value::Number(n) if n.is_f64() => {
                (DataType::Float64, Self::Float64(Float64Builder::new()))
            }
            Value::Number(_) => (DataType::Int64, Self::Int64(Int64Builder::new())),
            Value::Array(_) | Value::Object(_) => {
                return Err(schema_error(format!("column {} is not a scalar", name)))
            }
        };
        Ok((Field::new(name, data_type, true), builder))
    }

    fn append(&mut self, name: &str, value: &Value) -> OutputResult<()> {
        match (self, value) {
            (Self::Utf8(b), Value::Null) => b.append_null(),
            (Self::Boolean(b), Value::Null) => b.append_null(),
            (Self::Int64(b), Value::Null) => b.append_null(),
            (Self::Float64(b), Value::Null) => b.append_null(),
            (Self::Utf8(b), Value::String(s)) => b.append_value(s),
            (Self::Boolean(b), Value::Bool(v)) => b.append_value(*v),
            (Self::Int64(b), Value::Number(n)) => match n.as_i64() {
                Some(v) => b.append_value(v),
                None => return Err(schema_error(format!("column {} expects Int64, got {}", name, n))),
            },
            (Self::Float64(b), Value::Number(n)) => match n.as_f64() {
                Some(v) => b.append_value(v),
                None => return Err(schema_error(format!("column {} expects Float64, got {}", name, n))),
            },
            (_, other) => {
                return Err(schema_error(format!(
                    "column {} cannot hold value {}",
                    name, other
                )))
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Utf8(b) => Arc::new(b.finish()),
            Self::Boolean(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
        }
    }
}

/// Streams records into a Parquet file one batch at a time
pub struct ParquetRecordWriter<W: Write + Send> {
    writer: ArrowWriter<W>,
    schema: SchemaRef,
    columns: Vec<(String, ColumnBuilder)>,
    buffered: usize,
}

impl<W: Write + Send> ParquetRecordWriter<W> {
    pub fn new<T: Serialize + Default>(out: W) -> OutputResult<Self> {
        let template = to_row(&T::default())?;
        let mut fields = Vec::with_capacity(template.len());
        let mut columns = Vec::with_capacity(template.len());
        for (name, value) in &template {
            let (field, builder) = ColumnBuilder::for_template(name, value)?;
            fields.push(field);
            columns.push((name.clone(), builder));
        }

        let schema: SchemaRef = Arc::new(Schema::new(fields));
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(out, Arc::clone(&schema), Some(props))?;

        Ok(Self {
            writer,
            schema,
            columns,
            buffered: 0,
        })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> OutputResult<()> {
        let row = to_row(record)?;
        for (name, builder) in &mut self.columns {
            builder.append(name, row.get(name.as_str()).unwrap_or(&Value::Null))?;
        }
        self.buffered += 1;
        if self.buffered >= BATCH_ROWS {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> OutputResult<()> {
        if self.buffered == 0 {
            return Ok(());
        }
        let arrays = self
            .columns
            .iter_mut()
            .map(|(_, builder)| builder.finish())
            .collect();
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), arrays)?;
        self.writer.write(&batch)?;
        self.buffered = 0;
        Ok(())
    }

    /// Write the footer and hand back the underlying writer
    pub fn finish(mut self) -> OutputResult<W> {
        self.flush_batch()?;
        Ok(self.writer.into_inner()?)
    }
}

fn cell(column: &ArrayRef, row: usize) -> OutputResult<Value> {
    if column.is_null(row) {
        return Ok(Value::Null);
    }

    let any = column.as_any();
    let value = match column.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| Value::String(a.value(row).to_string())),
        DataType::LargeUtf8 => any
            .downcast_ref::<LargeStringArray>()
            .map(|a| Value::String(a.value(row).to_string())),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| Value::Bool(a.value(row))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| Value::Number(a.value(row).into())),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| Number::from_f64(a.value(row)).map_or(Value::Null, Value::Number)),
        other => {
            return Err(schema_error(format!("unsupported column type {}", other)));
        }
    };

    value.ok_or_else(|| schema_error("column data does not match its declared type"))
}

/// Load every row of a Parquet table
pub fn read_parquet<T: DeserializeOwned>(path: &Path) -> OutputResult<Vec<T>> {
    let file = File::open(path).map_err(|e| OutputError::io(path.display().to_string(), e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(BATCH_ROWS)
        .build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        for row in 0..batch.num_rows() {
            let mut fields = Map::with_capacity(batch.num_columns());
            for (field, column) in schema.fields().iter().zip(batch.columns()) {
                fields.insert(field.name().clone(), cell(column, row)?);
            }
            records.push(serde_json::from_value(Value::Object(fields))?);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: Option<String>,
        flag: bool,
        count: i64,
        ratio: f64,
    }

    #[test]
    fn test_schema_from_default() {
        let writer = ParquetRecordWriter::new::<Row>(Vec::new()).unwrap();
        let types: Vec<(String, DataType)> = writer
            .schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect();
        assert_eq!(
            types,
            vec![
                ("count".to_string(), DataType::Int64),
                ("flag".to_string(), DataType::Boolean),
                ("name".to_string(), DataType::Utf8),
                ("ratio".to_string(), DataType::Float64),
            ]
        );
    }

    #[test]
    fn test_rows_span_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.parquet");
        let rows: Vec<Row> = (0..BATCH_ROWS as i64 + 5)
            .map(|i| Row {
                name: (i % 3 != 0).then(|| format!("row {}", i)),
                flag: i % 2 == 0,
                count: i,
                ratio: i as f64 / 2.0,
            })
            .collect();

        let file = File::create(&path).unwrap();
        let mut writer = ParquetRecordWriter::new::<Row>(file).unwrap();
        for row in &rows {
            writer.write(row).unwrap();
        }
        writer.finish().unwrap();

        let loaded: Vec<Row> = read_parquet(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_nested_values_are_rejected() {
        #[derive(Default, Serialize)]
        struct Nested {
            tags: Vec<String>,
        }
        assert!(matches!(
            ParquetRecordWriter::new::<Nested>(Vec::new()),
            Err(OutputError::Schema { .. })
        ));
    }
}
