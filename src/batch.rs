//! Row batches: the unit of streaming transfer between sources and writers.
//!
//! A [`RowBatch`] is a bounded group of rows that share one ordered column
//! layout. Rows are stored positionally (`Vec<Value>` aligned with
//! [`RowBatch::columns`]); [`RowBatch::get`] gives name-based access.
//!
//! Every batch of one table carries the same column names in the same order.
//! That layout comes from the scan query, not from the values, so an empty
//! batch still knows its columns.

use chrono::NaiveDateTime;
use std::fmt;

/// Textual timestamp encoding used wherever a timestamp leaves the typed world
/// (Avro records, restored CSV).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A typed scalar cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    /// The column type this value belongs to, or `None` for null.
    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Int),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Timestamp(_) => Some(ColumnType::Timestamp),
            Value::Text(_) => Some(ColumnType::Text),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Text rendering used for CSV cells; null renders as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Column typing as reported by the data source.
///
/// `Unknown` means the source declared nothing (e.g. an expression column);
/// consumers then look at the values themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Timestamp,
    Text,
    Unknown,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Text => "text",
            ColumnType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A named, typed column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A bounded, ordered group of rows sharing one column layout.
#[derive(Clone, Debug, PartialEq)]
pub struct RowBatch {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl RowBatch {
    /// An empty batch with the given column layout.
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a batch from positional rows.
    ///
    /// # Panics
    /// Panics if a row's width differs from the column count. Use
    /// [`RowBatch::push_row`] for fallible construction.
    #[must_use]
    pub fn from_rows(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(
                row.len(),
                columns.len(),
                "row {i} has {} values for {} columns",
                row.len(),
                columns.len()
            );
        }
        Self { columns, rows }
    }

    /// Append one row, rejecting rows whose width does not match the layout.
    ///
    /// # Errors
    /// Returns the rejected row when its width differs from the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), Vec<Value>> {
        if row.len() != self.columns.len() {
            return Err(row);
        }
        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a cell by row index and column name.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c.name == column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// The effective type of a column: the declared type when the source
    /// provided one, otherwise the type of the first non-null value, otherwise
    /// text.
    #[must_use]
    pub fn resolved_type(&self, idx: usize) -> ColumnType {
        match self.columns[idx].ty {
            ColumnType::Unknown => self
                .column_values(idx)
                .find_map(Value::column_type)
                .unwrap_or(ColumnType::Text),
            ty => ty,
        }
    }

    /// True when `other` has the same column names in the same order.
    #[must_use]
    pub fn same_layout(&self, other: &RowBatch) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.name == b.name)
    }
}
