//! Run manifest: one JSON summary per day.
//!
//! Written to `{backup_root}/manifest/manifest_{YYYYMMDD}.json` at the end of
//! every run that got past the connection probe. A second run on the same day
//! replaces the file.

use crate::artifact::DAY_FORMAT;
use crate::error::Result;
use crate::format::BackupFormat;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Timestamp rendering in the manifest (ISO-8601 with microseconds).
pub const MANIFEST_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreCheck {
    pub table: String,
    pub backup_file: PathBuf,
    pub restored_files: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Run day, `YYYYMMDD`.
    pub date: String,
    pub format: BackupFormat,
    /// Tables attempted, in run order, whether or not they succeeded.
    pub tables: Vec<String>,
    pub backup_dir: PathBuf,
    pub restore_check: Option<RestoreCheck>,
    pub timestamp: String,
}

impl Manifest {
    pub fn new(
        at: NaiveDateTime,
        format: BackupFormat,
        tables: Vec<String>,
        backup_dir: PathBuf,
        restore_check: Option<RestoreCheck>,
    ) -> Self {
        Self {
            date: at.format(DAY_FORMAT).to_string(),
            format,
            tables,
            backup_dir,
            restore_check,
            timestamp: at.format(MANIFEST_TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// File name for this manifest's day.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("manifest_{}.json", self.date)
    }
}

/// Write `manifest` under `manifest_dir`, replacing any manifest for the same day.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn write_manifest(manifest_dir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    fs::create_dir_all(manifest_dir)?;
    let path = manifest_dir.join(manifest.file_name());
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(&path, json)?;
    tracing::info!(path = %path.display(), "manifest written");
    Ok(path)
}

/// Load a manifest written by [`write_manifest`].
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .and_then(|d| d.and_hms_micro_opt(9, 3, 1, 250))
            .unwrap()
    }

    #[test]
    fn json_shape() {
        let m = Manifest::new(
            at(),
            BackupFormat::Columnar,
            vec!["departments".into(), "jobs".into()],
            PathBuf::from("backups/columnar"),
            None,
        );
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["date"], "20240517");
        assert_eq!(v["format"], "columnar");
        assert_eq!(v["tables"], serde_json::json!(["departments", "jobs"]));
        assert!(v["restore_check"].is_null());
        assert_eq!(v["timestamp"], "2024-05-17T09:03:01.000250");
    }

    #[test]
    fn same_day_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = Manifest::new(
            at(),
            BackupFormat::Row,
            vec!["jobs".into()],
            tmp.path().join("row"),
            None,
        );
        let first = write_manifest(tmp.path(), &m).unwrap();
        m.tables.push("departments".into());
        let second = write_manifest(tmp.path(), &m).unwrap();
        assert_eq!(first, second);
        assert_eq!(read_manifest(&second).unwrap().tables.len(), 2);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
