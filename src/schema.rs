//! Schema inference for the row-oriented format.
//!
//! [`infer_schema`] derives a [`RecordSchema`] from one sample batch. Every field
//! is nullable:
//!
//! | column holds          | field type              |
//! |-----------------------|-------------------------|
//! | integers              | `["null", "long"]`      |
//! | floating point        | `["null", "double"]`    |
//! | booleans              | `["null", "boolean"]`   |
//! | timestamps            | `["null", "string"]` (ISO-8601 text) |
//! | anything else         | `["null", "string"]`    |
//!
//! Inference never fails: columns whose type cannot be determined (all null,
//! undeclared, or an empty batch) fall back to nullable string.

use crate::batch::{ColumnType, RowBatch};
use serde_json::{Value as Json, json};
use std::collections::HashSet;

/// Non-null branch of a nullable field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Long,
    Double,
    Boolean,
    String,
}

impl FieldType {
    #[must_use]
    pub fn avro_name(self) -> &'static str {
        match self {
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
        }
    }

    fn of(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Int => FieldType::Long,
            ColumnType::Float => FieldType::Double,
            ColumnType::Bool => FieldType::Boolean,
            ColumnType::Timestamp | ColumnType::Text | ColumnType::Unknown => FieldType::String,
        }
    }
}

/// One field of the record: the source column name, the Avro name it is
/// written under, and its non-null type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub ident: String,
    pub ty: FieldType,
}

/// Ordered field list of one artifact; fixed once the first batch is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    fn build<'a>(table: &str, columns: impl IntoIterator<Item = (&'a str, FieldType)>) -> Self {
        let (names, types): (Vec<&str>, Vec<FieldType>) = columns.into_iter().unzip();
        let fields = avro_field_names(names.iter().copied())
            .into_iter()
            .zip(names)
            .zip(types)
            .map(|((ident, name), ty)| FieldSchema {
                name: name.to_string(),
                ident,
                ty,
            })
            .collect();
        Self {
            name: record_name(table),
            fields,
        }
    }

    /// All-string schema for a known column list.
    pub fn from_column_names<'a>(table: &str, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::build(table, names.into_iter().map(|n| (n, FieldType::String)))
    }

    /// Avro JSON form: a record whose fields are `["null", T]` unions defaulting
    /// to null. A field renamed to satisfy Avro naming rules carries its source
    /// column name in a `column` attribute.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let fields: Vec<Json> = self
            .fields
            .iter()
            .map(|f| {
                let mut field = json!({
                    "name": f.ident,
                    "type": ["null", f.ty.avro_name()],
                    "default": null,
                });
                if f.ident != f.name {
                    field["column"] = json!(f.name);
                }
                field
            })
            .collect();
        json!({
            "type": "record",
            "name": self.name,
            "fields": fields,
        })
    }
}

/// Derive a schema from a sample batch.
#[must_use]
pub fn infer_schema(table: &str, batch: &RowBatch) -> RecordSchema {
    if batch.is_empty() {
        return RecordSchema::from_column_names(table, batch.column_names());
    }
    RecordSchema::build(
        table,
        batch
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), FieldType::of(batch.resolved_type(i)))),
    )
}

fn record_name(table: &str) -> String {
    avro_ident(&format!("{table}_record"))
}

/// Coerce an arbitrary column or table name into a valid Avro name
/// (`[A-Za-z_][A-Za-z0-9_]*`).
#[must_use]
pub fn avro_ident(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Distinct Avro field names for a column list, in column order.
///
/// Names that are already valid keep their spelling. Sanitized names that
/// collide with a taken one get a `_2`, `_3`, ... suffix.
#[must_use]
pub fn avro_field_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.into_iter().collect();
    let mut taken = HashSet::new();
    let mut out: Vec<Option<String>> = names
        .iter()
        .map(|n| (avro_ident(n) == *n && taken.insert(n.to_string())).then(|| n.to_string()))
        .collect();
    for (slot, name) in out.iter_mut().zip(&names) {
        if slot.is_some() {
            continue;
        }
        let base = avro_ident(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        *slot = Some(candidate);
    }
    out.into_iter().flatten().collect()
}
