//! Backup artifact formats.

use crate::error::BackupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format of a backup run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackupFormat {
    /// Parquet files, one row group per batch.
    #[value(alias = "parquet")]
    Columnar,
    /// Avro object-container files with an embedded schema.
    #[value(alias = "avro")]
    Row,
}

impl BackupFormat {
    /// Label used on the command line, in the manifest, and as the
    /// per-format directory name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackupFormat::Columnar => "columnar",
            BackupFormat::Row => "row",
        }
    }

    /// File extension of this format's artifacts.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            BackupFormat::Columnar => "parquet",
            BackupFormat::Row => "avro",
        }
    }

    /// Format implied by a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "parquet" => Some(BackupFormat::Columnar),
            "avro" => Some(BackupFormat::Row),
            _ => None,
        }
    }
}

impl fmt::Display for BackupFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupFormat {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "columnar" | "parquet" => Ok(BackupFormat::Columnar),
            "row" | "avro" => Ok(BackupFormat::Row),
            other => Err(BackupError::Config(format!(
                "unknown backup format {other:?}; use columnar or row"
            ))),
        }
    }
}
