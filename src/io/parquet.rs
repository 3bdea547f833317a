//! Parquet artifacts: the columnar writer and reader.
//!
//! This module provides:
//! - [`ParquetSink`], a streaming writer that fixes its Arrow schema from the
//!   first batch and appends every batch as its own row group
//! - [`read_parquet_into`] / [`read_parquet_batches`] to stream a file back as
//!   [`RowBatch`]es
//! - [`parquet_summary`] and [`read_parquet_head`] for inspection
//!
//! # Type mapping
//! | column type | Arrow type                         |
//! |-------------|------------------------------------|
//! | int         | `Int64`                            |
//! | float       | `Float64`                          |
//! | bool        | `Boolean`                          |
//! | timestamp   | `Timestamp(Microsecond, None)`     |
//! | text        | `Utf8`                             |
//!
//! All fields are nullable. Once the schema is fixed, a later batch carrying
//! a value of another type fails with [`BackupError::SchemaMismatch`].

use crate::batch::{Column, ColumnType, RowBatch, Value};
use crate::error::{BackupError, Result};
use crate::io::{ArtifactWriter, WriteStats};
use crate::source::{BatchSink, ScanStats};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rows per Arrow batch when reading a file back.
const READ_BATCH_SIZE: usize = 64 * 1024;

/// Streaming Parquet writer for one artifact.
///
/// The file is created on the first batch. [`ArtifactWriter::finish`] must be
/// called to write the footer; a sink dropped early releases its file handle
/// but leaves an unreadable file, which callers are expected to remove.
pub struct ParquetSink {
    path: PathBuf,
    fallback_columns: Vec<String>,
    writer: Option<ArrowWriter<File>>,
    schema: Option<SchemaRef>,
    stats: WriteStats,
}

impl ParquetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_columns: Vec::new(),
            writer: None,
            schema: None,
            stats: WriteStats::default(),
        }
    }

    /// Column names used for the schema if no batch ever arrives.
    #[must_use]
    pub fn with_fallback_columns(mut self, columns: Vec<String>) -> Self {
        self.fallback_columns = columns;
        self
    }

    /// The fixed schema, once the first batch has been written.
    #[must_use]
    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    fn open(&mut self, schema: SchemaRef) -> Result<()> {
        let file = File::create(&self.path)?;
        let props = WriterProperties::builder()
            .set_dictionary_enabled(true)
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(props))?;
        tracing::debug!(path = %self.path.display(), fields = schema.fields().len(), "parquet artifact opened");
        self.writer = Some(writer);
        self.schema = Some(schema);
        Ok(())
    }
}

impl BatchSink for ParquetSink {
    fn write_batch(&mut self, batch: RowBatch) -> Result<()> {
        let schema = match &self.schema {
            Some(schema) => Arc::clone(schema),
            None => {
                let schema = arrow_schema(&batch);
                self.open(Arc::clone(&schema))?;
                schema
            }
        };
        let record = to_record_batch(&schema, &batch)?;
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&record)?;
            // one row group per incoming batch
            writer.flush()?;
        }
        self.stats.rows += batch.len() as u64;
        self.stats.batches += 1;
        Ok(())
    }
}

impl ArtifactWriter for ParquetSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn finish(mut self) -> Result<WriteStats> {
        if self.writer.is_none() {
            let fields: Vec<Field> = self
                .fallback_columns
                .iter()
                .map(|name| Field::new(name, DataType::Utf8, true))
                .collect();
            self.open(Arc::new(Schema::new(fields)))?;
        }
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(self.stats)
    }
}

fn arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        ColumnType::Text | ColumnType::Unknown => DataType::Utf8,
    }
}

/// Arrow schema implied by a batch's own column typing.
#[must_use]
pub fn arrow_schema(batch: &RowBatch) -> SchemaRef {
    let fields: Vec<Field> = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| Field::new(&c.name, arrow_type(batch.resolved_type(i)), true))
        .collect();
    Arc::new(Schema::new(fields))
}

fn mismatch(field: &Field, found: &Value) -> BackupError {
    BackupError::SchemaMismatch {
        column: field.name().clone(),
        expected: field.data_type().to_string(),
        found: found
            .column_type()
            .map_or_else(|| "null".to_string(), |t| t.to_string()),
    }
}

/// Convert a batch into an Arrow `RecordBatch` under a fixed schema.
///
/// # Errors
/// Returns [`BackupError::SchemaMismatch`] if the column layout differs from
/// `schema` or a value does not fit its field's type.
pub fn to_record_batch(schema: &SchemaRef, batch: &RowBatch) -> Result<RecordBatch> {
    let names: Vec<&str> = batch.column_names().collect();
    let expected: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    if names != expected {
        return Err(BackupError::SchemaMismatch {
            column: "<layout>".into(),
            expected: expected.join(","),
            found: names.join(","),
        });
    }

    let n = batch.len();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (idx, field) in schema.fields().iter().enumerate() {
        let values = batch.column_values(idx);
        let array: ArrayRef = match field.data_type() {
            DataType::Int64 => {
                let mut b = Int64Builder::with_capacity(n);
                for v in values {
                    match v {
                        Value::Null => b.append_null(),
                        Value::Int(i) => b.append_value(*i),
                        other => return Err(mismatch(field, other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Float64 => {
                let mut b = Float64Builder::with_capacity(n);
                for v in values {
                    match v {
                        Value::Null => b.append_null(),
                        Value::Float(f) => b.append_value(*f),
                        Value::Int(i) => b.append_value(*i as f64),
                        other => return Err(mismatch(field, other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Boolean => {
                let mut b = BooleanBuilder::with_capacity(n);
                for v in values {
                    match v {
                        Value::Null => b.append_null(),
                        Value::Bool(x) => b.append_value(*x),
                        other => return Err(mismatch(field, other)),
                    }
                }
                Arc::new(b.finish())
            }
            DataType::Timestamp(TimeUnit::Microsecond, None) => {
                let mut b = TimestampMicrosecondBuilder::with_capacity(n);
                for v in values {
                    match v {
                        Value::Null => b.append_null(),
                        Value::Timestamp(ts) => b.append_value(ts.and_utc().timestamp_micros()),
                        other => return Err(mismatch(field, other)),
                    }
                }
                Arc::new(b.finish())
            }
            _ => {
                let mut b = StringBuilder::with_capacity(n, n * 16);
                for v in values {
                    match v {
                        Value::Null => b.append_null(),
                        Value::Text(s) => b.append_value(s),
                        other => return Err(mismatch(field, other)),
                    }
                }
                Arc::new(b.finish())
            }
        };
        arrays.push(array);
    }
    Ok(RecordBatch::try_new(Arc::clone(schema), arrays)?)
}

/// Convert an Arrow `RecordBatch` back into a [`RowBatch`].
///
/// Integer widths widen to `Int64`, floats to `Float64`, any timestamp unit to
/// microseconds; other types are rendered as text.
///
/// # Errors
/// Returns an Arrow error if a column cannot be cast.
pub fn from_record_batch(record: &RecordBatch) -> Result<RowBatch> {
    let schema = record.schema();
    let mut columns = Vec::with_capacity(schema.fields().len());
    let mut cells: Vec<Vec<Value>> = Vec::with_capacity(schema.fields().len());

    for (field, array) in schema.fields().iter().zip(record.columns()) {
        let (ty, values) = column_values(array)?;
        columns.push(Column::new(field.name(), ty));
        cells.push(values);
    }

    let mut rows: Vec<Vec<Value>> = (0..record.num_rows())
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for col in cells {
        for (row, v) in rows.iter_mut().zip(col) {
            row.push(v);
        }
    }
    Ok(RowBatch::from_rows(columns, rows))
}

fn column_values(array: &ArrayRef) -> Result<(ColumnType, Vec<Value>)> {
    let n = array.len();
    let dt = array.data_type();
    let out = if dt.is_integer() {
        let a = cast(array, &DataType::Int64)?;
        let a = a.as_primitive::<Int64Type>();
        let v = (0..n)
            .map(|i| if a.is_null(i) { Value::Null } else { Value::Int(a.value(i)) })
            .collect();
        (ColumnType::Int, v)
    } else if dt.is_floating() {
        let a = cast(array, &DataType::Float64)?;
        let a = a.as_primitive::<Float64Type>();
        let v = (0..n)
            .map(|i| if a.is_null(i) { Value::Null } else { Value::Float(a.value(i)) })
            .collect();
        (ColumnType::Float, v)
    } else if *dt == DataType::Boolean {
        let a = array.as_boolean();
        let v = (0..n)
            .map(|i| if a.is_null(i) { Value::Null } else { Value::Bool(a.value(i)) })
            .collect();
        (ColumnType::Bool, v)
    } else if matches!(dt, DataType::Timestamp(_, _)) {
        let a = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
        let a = a.as_primitive::<arrow::datatypes::TimestampMicrosecondType>();
        let v = (0..n)
            .map(|i| {
                if a.is_null(i) {
                    Value::Null
                } else {
                    a.value_as_datetime(i).map_or(Value::Null, Value::Timestamp)
                }
            })
            .collect();
        (ColumnType::Timestamp, v)
    } else {
        let a = cast(array, &DataType::Utf8)?;
        let a = a.as_string::<i32>();
        let v = (0..n)
            .map(|i| if a.is_null(i) { Value::Null } else { Value::from(a.value(i)) })
            .collect();
        (ColumnType::Text, v)
    };
    Ok(out)
}

/// Stream a Parquet file into `sink`, one [`RowBatch`] per Arrow batch.
///
/// A file with no rows still delivers one empty batch carrying the columns.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded, or if `sink`
/// fails.
pub fn read_parquet_into(path: impl AsRef<Path>, sink: &mut dyn BatchSink) -> Result<ScanStats> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.with_batch_size(READ_BATCH_SIZE).build()?;

    let mut stats = ScanStats::default();
    for record in reader {
        let batch = from_record_batch(&record?)?;
        stats.rows += batch.len() as u64;
        stats.batches += 1;
        sink.write_batch(batch)?;
    }
    if stats.batches == 0 {
        let empty = from_record_batch(&RecordBatch::new_empty(schema))?;
        stats.batches = 1;
        sink.write_batch(empty)?;
    }
    Ok(stats)
}

/// Read a whole Parquet file into memory.
///
/// # Errors
/// See [`read_parquet_into`].
pub fn read_parquet_batches(path: impl AsRef<Path>) -> Result<Vec<RowBatch>> {
    let mut out: Vec<RowBatch> = Vec::new();
    read_parquet_into(path, &mut out)?;
    Ok(out)
}

/// The first `n` rows of a Parquet file as one batch, decoding no more than needed.
///
/// # Errors
/// See [`read_parquet_into`].
pub fn read_parquet_head(path: impl AsRef<Path>, n: usize) -> Result<RowBatch> {
    let file = File::open(path.as_ref())?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let mut reader = builder
        .with_batch_size(n.max(1))
        .with_limit(n)
        .build()?;
    match reader.next() {
        Some(record) => from_record_batch(&record?),
        None => from_record_batch(&RecordBatch::new_empty(schema)),
    }
}

/// Footer-level facts about a Parquet artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParquetSummary {
    pub rows: u64,
    pub row_groups: usize,
    pub columns: Vec<String>,
}

/// Inspect a Parquet file's metadata without decoding any data pages.
///
/// # Errors
/// Returns an error if the file cannot be opened or its footer is invalid.
pub fn parquet_summary(path: impl AsRef<Path>) -> Result<ParquetSummary> {
    let f = File::open(path.as_ref())?;
    let reader = SerializedFileReader::new(f)?;
    let meta = reader.metadata();
    let row_groups = meta.num_row_groups();
    let rows = (0..row_groups)
        .map(|i| meta.row_group(i).num_rows().max(0).cast_unsigned())
        .sum();
    let columns = meta
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    Ok(ParquetSummary {
        rows,
        row_groups,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> RowBatch {
        let ts = NaiveDate::from_ymd_opt(2021, 7, 27)
            .and_then(|d| d.and_hms_opt(16, 2, 8))
            .unwrap();
        RowBatch::from_rows(
            vec![
                Column::new("id", ColumnType::Int),
                Column::new("score", ColumnType::Float),
                Column::new("active", ColumnType::Bool),
                Column::new("hired", ColumnType::Timestamp),
                Column::new("name", ColumnType::Text),
            ],
            vec![
                vec![
                    Value::Int(1),
                    Value::Float(0.5),
                    Value::Bool(true),
                    Value::Timestamp(ts),
                    "Ana".into(),
                ],
                vec![Value::Int(2), Value::Null, Value::Null, Value::Null, Value::Null],
            ],
        )
    }

    #[test]
    fn record_batch_conversion_preserves_values() {
        let batch = sample();
        let schema = arrow_schema(&batch);
        let record = to_record_batch(&schema, &batch).unwrap();
        assert_eq!(record.num_rows(), 2);
        let back = from_record_batch(&record).unwrap();
        assert_eq!(back, batch);
    }

    #[test]
    fn incompatible_value_is_reported() {
        let batch = sample();
        let schema = arrow_schema(&batch);
        let bad = RowBatch::from_rows(
            batch.columns().to_vec(),
            vec![vec![
                "not a number".into(),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ]],
        );
        let err = to_record_batch(&schema, &bad).unwrap_err();
        assert!(
            matches!(err, BackupError::SchemaMismatch { ref column, ref found, .. } if column == "id" && found == "text")
        );
    }

    #[test]
    fn layout_change_is_reported() {
        let schema = arrow_schema(&sample());
        let other = RowBatch::new(vec![Column::new("id", ColumnType::Int)]);
        assert!(matches!(
            to_record_batch(&schema, &other),
            Err(BackupError::SchemaMismatch { .. })
        ));
    }
}
