//! Backup inventory: recent artifacts and columnar artifact inspection.

use crate::error::Result;
use crate::format::BackupFormat;
use crate::io::glob::{expand_glob, newest_first};
use chrono::{DateTime, Local, NaiveDateTime};
use glob::Pattern;
use std::path::{Path, PathBuf};

pub const DEFAULT_LIST_LIMIT: usize = 10;
/// Rows shown per inspected artifact.
pub const PREVIEW_ROWS: usize = 3;

/// One artifact on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct BackupEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: NaiveDateTime,
    pub size_kb: f64,
    pub format: BackupFormat,
}

fn all_artifacts(root: &Path, format: Option<BackupFormat>) -> Result<Vec<PathBuf>> {
    let root = Pattern::escape(&root.display().to_string());
    let mut files = Vec::new();
    for f in [BackupFormat::Columnar, BackupFormat::Row] {
        if format.is_none_or(|want| want == f) {
            files.extend(expand_glob(&format!("{root}/**/*.{}", f.extension()))?);
        }
    }
    Ok(files)
}

/// The `limit` most recently modified artifacts under `root`, newest first.
///
/// A missing `root` is an empty listing.
///
/// # Errors
/// Returns an error if the tree cannot be walked.
pub fn list_backups(root: &Path, limit: usize) -> Result<Vec<BackupEntry>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for path in newest_first(all_artifacts(root, None)?).into_iter().take(limit) {
        let meta = path.metadata()?;
        let modified: DateTime<Local> = meta.modified()?.into();
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(BackupFormat::from_extension)
            .unwrap_or(BackupFormat::Columnar);
        entries.push(BackupEntry {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            modified: modified.naive_local(),
            size_kb: meta.len() as f64 / 1024.0,
            format,
            path,
        });
    }
    Ok(entries)
}

/// Contents of a readable columnar artifact.
#[cfg(feature = "io-parquet")]
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactSummary {
    pub rows: u64,
    pub row_groups: usize,
    pub columns: Vec<String>,
    pub preview: crate::batch::RowBatch,
}

/// Inspection result for one file; unreadable files carry the error text.
#[cfg(feature = "io-parquet")]
#[derive(Clone, Debug, PartialEq)]
pub struct Inspection {
    pub path: PathBuf,
    pub result: std::result::Result<ArtifactSummary, String>,
}

#[cfg(feature = "io-parquet")]
impl Inspection {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }
}

/// Inspect one columnar artifact.
#[cfg(feature = "io-parquet")]
#[must_use]
pub fn inspect_artifact(path: &Path) -> Inspection {
    use crate::io::parquet::{parquet_summary, read_parquet_head};

    let result = parquet_summary(path).and_then(|s| {
        Ok(ArtifactSummary {
            preview: read_parquet_head(path, PREVIEW_ROWS)?,
            rows: s.rows,
            row_groups: s.row_groups,
            columns: s.columns,
        })
    });
    if let Err(e) = &result {
        tracing::warn!(path = %path.display(), error = %e, "unreadable artifact");
    }
    Inspection {
        path: path.to_path_buf(),
        result: result.map_err(|e| e.to_string()),
    }
}

/// Inspect every columnar artifact under `root`, sorted by path.
///
/// # Errors
/// Returns an error only if the tree cannot be walked; unreadable files are
/// reported inside their [`Inspection`].
#[cfg(feature = "io-parquet")]
pub fn inspect_all(root: &Path) -> Result<Vec<Inspection>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    Ok(all_artifacts(root, Some(BackupFormat::Columnar))?
        .iter()
        .map(|p| inspect_artifact(p))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_root_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_backups(&tmp.path().join("nope"), 10).unwrap().is_empty());
    }

    #[test]
    fn lists_both_formats_and_honours_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let day = tmp.path().join("row").join("20240101");
        fs::create_dir_all(&day).unwrap();
        fs::write(day.join("jobs_20240101120000.avro"), vec![0u8; 2048]).unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::write(tmp.path().join("jobs_20240101120001.parquet"), b"x").unwrap();

        let all = list_backups(tmp.path(), 10).unwrap();
        assert_eq!(all.len(), 2);
        let avro = all.iter().find(|e| e.format == BackupFormat::Row).unwrap();
        assert!((avro.size_kb - 2.0).abs() < f64::EPSILON);
        assert_eq!(avro.name, "jobs_20240101120000.avro");

        assert_eq!(list_backups(tmp.path(), 1).unwrap().len(), 1);
    }

    #[cfg(feature = "io-parquet")]
    #[test]
    fn corrupt_parquet_is_reported_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("bad_20240101120000.parquet"), b"not parquet").unwrap();
        let found = inspect_all(tmp.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(!found[0].is_valid());
    }
}
