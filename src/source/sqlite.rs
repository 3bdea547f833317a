//! SQLite data source (feature `sqlite`).
//!
//! Column typing starts from SQLite's declared-type affinity rules, so a column
//! declared `DATETIME` arrives as [`Value::Timestamp`] and `BOOLEAN` as
//! [`Value::Bool`] even though SQLite stores them as text and integers.
//!
//! SQLite does not enforce declared types, so the declaration is only a hint.
//! Before reading, one pass over the table records the storage classes each
//! column actually holds and settles its type:
//!
//! | declared            | stored values                         | column type |
//! |---------------------|---------------------------------------|-------------|
//! | any                 | only nulls                            | as declared |
//! | integer, untyped    | integers                              | int         |
//! | integer, float, untyped | integers and reals                | float       |
//! | boolean             | integers                              | bool        |
//! | date/time           | parseable text or epoch integers      | timestamp   |
//! | anything            | anything else                         | text        |
//!
//! A text column renders numbers with their usual formatting and blobs as hex,
//! so no stored value can fail a table on type grounds.

use crate::batch::{Column, ColumnType, Value};
use crate::error::{BackupError, Result};
use crate::source::{BatchSink, Chunker, DataSource, ReadMode, ScanStats};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

const TIMESTAMP_PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A read-only SQLite database.
pub struct SqliteSource {
    location: PathBuf,
    conn: Connection,
}

impl SqliteSource {
    /// Open an existing database file read-only.
    ///
    /// # Errors
    /// Returns [`BackupError::Connection`] if the file is missing or is not a
    /// database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let connection_error = |reason: String| BackupError::Connection {
            target: path.display().to_string(),
            reason,
        };
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| connection_error(e.to_string()))?;
        let source = Self {
            location: path.to_path_buf(),
            conn,
        };
        // Opening is lazy in SQLite; read the schema so a non-database file fails here.
        source
            .conn
            .query_row("SELECT count(*) FROM sqlite_master", [], |r| r.get::<_, i64>(0))
            .map_err(|e| connection_error(e.to_string()))?;
        Ok(source)
    }

    /// Wrap an already-open connection (e.g. an in-memory database).
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        let location = conn
            .path()
            .filter(|p| !p.is_empty())
            .map_or_else(|| PathBuf::from(":memory:"), PathBuf::from);
        Self { location, conn }
    }
}

impl DataSource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.location.display())
    }

    fn probe(&self) -> Result<String> {
        self.conn
            .query_row("SELECT sqlite_version()", [], |r| r.get::<_, String>(0))
            .map(|v| format!("SQLite {v}"))
            .map_err(|e| BackupError::Connection {
                target: self.describe(),
                reason: e.to_string(),
            })
    }

    fn scan(&self, table: &str, mode: ReadMode, sink: &mut dyn BatchSink) -> Result<ScanStats> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let columns = self.columns(table, &sql)?;
        let types: Vec<ColumnType> = columns.iter().map(|c| c.ty).collect();
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| BackupError::on_table(table, e))?;

        let mut chunker = Chunker::new(table, columns, mode, sink);
        let mut rows = stmt.query([]).map_err(|e| BackupError::on_table(table, e))?;
        while let Some(row) = rows.next().map_err(|e| BackupError::on_table(table, e))? {
            let mut values = Vec::with_capacity(types.len());
            for (i, ty) in types.iter().enumerate() {
                let cell = row.get_ref(i).map_err(|e| BackupError::on_table(table, e))?;
                values.push(convert(cell, *ty).map_err(|e| BackupError::on_table(table, e))?);
            }
            chunker.push_row(values)?;
        }
        chunker.finish()
    }
}

impl SqliteSource {
    /// Column layout of `sql`, each type settled from its declaration and the
    /// values the table holds.
    fn columns(&self, table: &str, sql: &str) -> Result<Vec<Column>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| BackupError::on_table(table, e))?;
        let declared: Vec<(String, ColumnType)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), affinity(c.decl_type())))
            .collect();

        let mut seen = vec![Seen::default(); declared.len()];
        let mut rows = stmt.query([]).map_err(|e| BackupError::on_table(table, e))?;
        while let Some(row) = rows.next().map_err(|e| BackupError::on_table(table, e))? {
            for (i, (s, (_, hint))) in seen.iter_mut().zip(&declared).enumerate() {
                let cell = row.get_ref(i).map_err(|e| BackupError::on_table(table, e))?;
                s.record(cell, *hint);
            }
        }

        Ok(declared
            .into_iter()
            .zip(seen)
            .map(|((name, hint), s)| {
                let ty = s.resolve(hint);
                if ty != hint && hint != ColumnType::Unknown {
                    tracing::warn!(
                        table,
                        column = %name,
                        declared = %hint,
                        stored = %ty,
                        "stored values do not match declared type"
                    );
                }
                Column::new(name, ty)
            })
            .collect())
    }
}

/// Storage classes observed in one column.
#[derive(Clone, Copy, Debug, Default)]
struct Seen {
    int: bool,
    real: bool,
    text: bool,
    blob: bool,
    not_timestamp: bool,
}

impl Seen {
    fn record(&mut self, cell: ValueRef<'_>, hint: ColumnType) {
        let as_timestamp = hint == ColumnType::Timestamp;
        match cell {
            ValueRef::Null => {}
            ValueRef::Integer(i) => {
                self.int = true;
                self.not_timestamp |= as_timestamp && DateTime::from_timestamp(i, 0).is_none();
            }
            ValueRef::Real(_) => self.real = true,
            ValueRef::Text(bytes) => {
                self.text = true;
                self.not_timestamp |=
                    as_timestamp && parse_timestamp(&String::from_utf8_lossy(bytes)).is_none();
            }
            ValueRef::Blob(_) => self.blob = true,
        }
    }

    fn resolve(self, hint: ColumnType) -> ColumnType {
        let numeric = !self.text && !self.blob;
        match hint {
            _ if !(self.int || self.real || self.text || self.blob) => hint,
            ColumnType::Timestamp if !self.real && !self.blob && !self.not_timestamp => {
                ColumnType::Timestamp
            }
            ColumnType::Bool if numeric && !self.real => ColumnType::Bool,
            ColumnType::Float if numeric => ColumnType::Float,
            ColumnType::Int | ColumnType::Unknown if numeric && self.real => ColumnType::Float,
            ColumnType::Int | ColumnType::Unknown if numeric => ColumnType::Int,
            _ => ColumnType::Text,
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map a declared column type to a [`ColumnType`] using SQLite's affinity rules.
fn affinity(decl: Option<&str>) -> ColumnType {
    let Some(decl) = decl else {
        return ColumnType::Unknown;
    };
    let d = decl.to_ascii_uppercase();
    if d.contains("BOOL") {
        ColumnType::Bool
    } else if d.contains("INT") {
        ColumnType::Int
    } else if d.contains("DATE") || d.contains("TIME") {
        ColumnType::Timestamp
    } else if d.contains("CHAR") || d.contains("CLOB") || d.contains("TEXT") {
        ColumnType::Text
    } else if d.contains("REAL")
        || d.contains("FLOA")
        || d.contains("DOUB")
        || d.contains("NUMERIC")
        || d.contains("DECIMAL")
    {
        ColumnType::Float
    } else if d.is_empty() {
        ColumnType::Unknown
    } else {
        ColumnType::Text
    }
}

fn convert(cell: ValueRef<'_>, ty: ColumnType) -> std::result::Result<Value, String> {
    let value = match (cell, ty) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), ColumnType::Bool) => Value::Bool(i != 0),
        (ValueRef::Integer(i), ColumnType::Float) => Value::Float(i as f64),
        (ValueRef::Integer(i), ColumnType::Int | ColumnType::Unknown) => Value::Int(i),
        (ValueRef::Integer(i), ColumnType::Timestamp) => DateTime::from_timestamp(i, 0)
            .map(|d| Value::Timestamp(d.naive_utc()))
            .ok_or_else(|| format!("{i} is out of range for a timestamp"))?,
        (ValueRef::Integer(i), ColumnType::Text) => Value::Text(i.to_string()),
        (ValueRef::Real(f), ColumnType::Float | ColumnType::Unknown) => Value::Float(f),
        (ValueRef::Real(f), ColumnType::Text) => Value::Text(f.to_string()),
        (ValueRef::Text(bytes), ColumnType::Timestamp) => {
            let s = String::from_utf8_lossy(bytes);
            parse_timestamp(&s)
                .map(Value::Timestamp)
                .ok_or_else(|| format!("'{s}' is not a timestamp"))?
        }
        (ValueRef::Text(bytes), ColumnType::Text | ColumnType::Unknown) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        (ValueRef::Blob(bytes), ColumnType::Text | ColumnType::Unknown) => {
            Value::Text(hex::encode(bytes))
        }
        (other, ty) => return Err(format!("{} value in a {ty} column", other.data_type())),
    };
    Ok(value)
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
