//! Avro object-container artifacts: the row-oriented writer.
//!
//! The file starts with a header embedding the record schema inferred by
//! [`infer_schema`] from the first non-empty batch, followed by the record
//! stream. Each incoming batch is encoded as one data block and flushed to disk
//! before the next batch is requested, so memory stays bounded by the chunk size.
//!
//! Timestamps are written as ISO-8601 strings ([`TIMESTAMP_FORMAT`]); nulls use
//! the null branch of each field's `["null", T]` union.

use crate::batch::{RowBatch, TIMESTAMP_FORMAT, Value};
use crate::error::{BackupError, Result};
use crate::io::{ArtifactWriter, WriteStats};
use crate::schema::{FieldSchema, FieldType, RecordSchema, infer_schema};
use crate::source::BatchSink;
use apache_avro::types::Value as AvroValue;
use apache_avro::{Schema, Writer};
use std::collections::hash_map::RandomState;
use std::fs::File;
use std::hash::{BuildHasher, Hasher};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

struct OpenFile {
    schema: RecordSchema,
    avro: Schema,
    out: BufWriter<File>,
    header_written: bool,
}

/// Streaming Avro writer for one artifact.
pub struct AvroSink {
    path: PathBuf,
    table: String,
    columns: Vec<String>,
    marker: [u8; 16],
    open: Option<OpenFile>,
    stats: WriteStats,
}

impl AvroSink {
    pub fn new(table: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            marker: sync_marker(&path),
            path,
            table: table.into(),
            columns: Vec::new(),
            open: None,
            stats: WriteStats::default(),
        }
    }

    /// Column names used for a header-only file if no rows ever arrive.
    #[must_use]
    pub fn with_fallback_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// The fixed record schema, once the file is open.
    #[must_use]
    pub fn schema(&self) -> Option<&RecordSchema> {
        self.open.as_ref().map(|o| &o.schema)
    }

    fn open(&mut self, schema: RecordSchema) -> Result<()> {
        let avro = Schema::parse(&schema.to_json())?;
        let out = BufWriter::new(File::create(&self.path)?);
        tracing::debug!(path = %self.path.display(), fields = schema.fields.len(), "avro artifact opened");
        self.open = Some(OpenFile {
            schema,
            avro,
            out,
            header_written: false,
        });
        Ok(())
    }

    /// Encode `records` as one block, writing the header first if needed.
    fn write_block(&mut self, records: Vec<AvroValue>) -> Result<()> {
        let marker = self.marker;
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let OpenFile {
            schema,
            avro,
            out,
            header_written,
        } = open;

        let mut writer = if header_written {
            Writer::append_to(&avro, out, marker)
        } else {
            Writer::builder().schema(&avro).writer(out).marker(marker).build()
        };
        for record in records {
            writer.append(record)?;
        }
        let out = writer.into_inner()?;

        self.open = Some(OpenFile {
            schema,
            avro,
            out,
            header_written: true,
        });
        Ok(())
    }
}

impl BatchSink for AvroSink {
    fn write_batch(&mut self, batch: RowBatch) -> Result<()> {
        if batch.is_empty() {
            if self.open.is_none() {
                self.columns = batch.column_names().map(str::to_string).collect();
            }
            return Ok(());
        }
        if self.open.is_none() {
            self.open(infer_schema(&self.table, &batch))?;
        }
        let Some(open) = self.open.as_ref() else {
            return Ok(());
        };
        if batch.columns().len() != open.schema.fields.len()
            || batch
                .column_names()
                .zip(&open.schema.fields)
                .any(|(name, f)| name != f.name)
        {
            return Err(BackupError::SchemaMismatch {
                column: "<layout>".into(),
                expected: open
                    .schema
                    .fields
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                found: batch.column_names().collect::<Vec<_>>().join(","),
            });
        }

        let mut records = Vec::with_capacity(batch.len());
        for row in batch.rows() {
            records.push(to_record(&open.schema.fields, row)?);
        }
        self.write_block(records)?;
        self.stats.rows += batch.len() as u64;
        self.stats.batches += 1;
        Ok(())
    }
}

impl ArtifactWriter for AvroSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn finish(mut self) -> Result<WriteStats> {
        if self.open.is_none() {
            let schema =
                RecordSchema::from_column_names(&self.table, self.columns.iter().map(String::as_str));
            self.open(schema)?;
        }
        let header_only = self.open.as_ref().is_some_and(|o| !o.header_written);
        if header_only {
            self.write_block(Vec::new())?;
        }
        Ok(self.stats)
    }
}

fn to_record(fields: &[FieldSchema], row: &[Value]) -> Result<AvroValue> {
    let mut out = Vec::with_capacity(fields.len());
    for (field, value) in fields.iter().zip(row) {
        out.push((field.ident.clone(), to_union(field, value)?));
    }
    Ok(AvroValue::Record(out))
}

fn to_union(field: &FieldSchema, value: &Value) -> Result<AvroValue> {
    let inner = match (field.ty, value) {
        (_, Value::Null) => return Ok(AvroValue::Union(0, Box::new(AvroValue::Null))),
        (FieldType::Long, Value::Int(i)) => AvroValue::Long(*i),
        (FieldType::Double, Value::Float(f)) => AvroValue::Double(*f),
        (FieldType::Double, Value::Int(i)) => AvroValue::Double(*i as f64),
        (FieldType::Boolean, Value::Bool(b)) => AvroValue::Boolean(*b),
        (FieldType::String, Value::Text(s)) => AvroValue::String(s.clone()),
        (FieldType::String, Value::Timestamp(ts)) => {
            AvroValue::String(ts.format(TIMESTAMP_FORMAT).to_string())
        }
        (ty, other) => {
            return Err(BackupError::SchemaMismatch {
                column: field.name.clone(),
                expected: ty.avro_name().to_string(),
                found: other
                    .column_type()
                    .map_or_else(|| "null".to_string(), |t| t.to_string()),
            });
        }
    };
    Ok(AvroValue::Union(1, Box::new(inner)))
}

/// Per-file sync marker separating data blocks.
fn sync_marker(path: &Path) -> [u8; 16] {
    let state = RandomState::new();
    let mut marker = [0u8; 16];
    for (i, chunk) in marker.chunks_mut(8).enumerate() {
        let mut h = state.build_hasher();
        h.write(path.as_os_str().as_encoded_bytes());
        h.write_usize(i);
        chunk.copy_from_slice(&h.finish().to_le_bytes());
    }
    marker
}
