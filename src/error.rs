//! Error taxonomy for backup, restore, and manifest operations.
//!
//! Errors are grouped by how far they propagate:
//!
//! - [`BackupError::Connection`] aborts a whole run before anything is written.
//! - Source, schema, and write errors abort a single table's job; the
//!   [`Pipeline`](crate::pipeline::Pipeline) records them and moves on.
//! - [`BackupError::UnsupportedRestoreFormat`] is a clean, reportable result of a
//!   restore request for a row-format artifact.
//! - Manifest failures are logged; already-written artifacts stay on disk.

use thiserror::Error;

/// Library error type.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("cannot connect to data source {target}: {reason}")]
    Connection { target: String, reason: String },

    #[error("data source error on table {table}: {reason}")]
    Source { table: String, reason: String },

    #[error("schema mismatch in column {column}: expected {expected}, found {found}")]
    SchemaMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "io-parquet")]
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "io-parquet")]
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[cfg(feature = "io-avro")]
    #[error("avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[cfg(feature = "io-csv")]
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("format {format} is not supported for restore")]
    UnsupportedRestoreFormat { format: String },

    #[error("no {format} artifact found for table {table}")]
    ArtifactNotFound { table: String, format: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BackupError {
    pub(crate) fn on_table(table: impl Into<String>, reason: impl ToString) -> Self {
        BackupError::Source {
            table: table.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must abort a whole run rather than a single table.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackupError::Connection { .. })
    }
}

/// Result type alias for library results.
pub type Result<T> = std::result::Result<T, BackupError>;
